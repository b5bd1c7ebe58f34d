//! PDF to XML normalization.
//!
//! Reads PDF attachment rows from the ingest store, converts each file with
//! an [`XmlConverter`] and stores the XML with the message metadata in the
//! normalization store.

mod converter;
mod runner;

pub use converter::{
    converter_for, render_pages, LopdfXmlConverter, PdftohtmlConverter, XmlConverter,
};
pub use runner::{NormalizeReport, PdfNormalizer};
