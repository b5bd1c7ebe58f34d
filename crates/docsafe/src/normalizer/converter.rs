//! PDF to XML conversion backends.

use std::path::Path;
use std::process::Command;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::ConverterBackend;
use crate::error::ConvertError;
use crate::sanitize::redact_path;

/// Converts the document at `source` into an XML file at `target`.
///
/// A backend returning `Ok(())` promises that `target` now exists.
pub trait XmlConverter: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError>;
}

pub fn converter_for(backend: ConverterBackend) -> Box<dyn XmlConverter> {
    match backend {
        ConverterBackend::Lopdf => Box::new(LopdfXmlConverter),
        ConverterBackend::Pdftohtml => Box::new(PdftohtmlConverter::default()),
    }
}

/// In-process converter: extracts the text of every page with `lopdf` and
/// writes one `<page>` element per page.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfXmlConverter;

impl XmlConverter for LopdfXmlConverter {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let _span = tracing::info_span!("converter.lopdf", file = %redact_path(source)).entered();

        let pdf_bytes = std::fs::read(source).map_err(|e| ConvertError::ReadDocument {
            path: source.to_path_buf(),
            source: e,
        })?;
        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ConvertError::PdfParse(e.to_string()))?;

        let mut pages = Vec::new();
        for page_num in doc.get_pages().keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => pages.push((*page_num, text)),
                Err(e) => {
                    tracing::debug!("No text on page {}: {}", page_num, e);
                    pages.push((*page_num, String::new()));
                }
            }
        }

        let source_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf");
        let xml = render_pages(source_name, &pages)?;

        std::fs::write(target, xml).map_err(|e| ConvertError::WriteOutput {
            path: target.to_path_buf(),
            source: e,
        })
    }
}

/// Builds `<document source=.. pages=..><page number=..>text</page>..</document>`.
pub fn render_pages(source_name: &str, pages: &[(u32, String)]) -> Result<Vec<u8>, ConvertError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let page_count = pages.len().to_string();
    let mut root = BytesStart::new("document");
    root.push_attribute(("source", source_name));
    root.push_attribute(("pages", page_count.as_str()));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    for (number, text) in pages {
        let number = number.to_string();
        let mut page = BytesStart::new("page");
        page.push_attribute(("number", number.as_str()));
        writer.write_event(Event::Start(page)).map_err(xml_err)?;

        let cleaned = strip_invalid_xml_chars(text.trim());
        if !cleaned.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&cleaned)))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("page")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("document")))
        .map_err(xml_err)?;
    Ok(writer.into_inner())
}

fn xml_err(e: impl std::fmt::Display) -> ConvertError {
    ConvertError::Xml(e.to_string())
}

/// Drops characters XML 1.0 cannot represent, which PDF text extraction
/// occasionally yields.
fn strip_invalid_xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || ('\u{20}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || c >= '\u{10000}'
        })
        .collect()
}

/// Shells out to poppler's `pdftohtml -xml`.
#[derive(Debug, Clone)]
pub struct PdftohtmlConverter {
    program: String,
}

impl Default for PdftohtmlConverter {
    fn default() -> Self {
        Self {
            program: "pdftohtml".to_string(),
        }
    }
}

impl PdftohtmlConverter {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl XmlConverter for PdftohtmlConverter {
    fn name(&self) -> &'static str {
        "pdftohtml"
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let _span =
            tracing::info_span!("converter.pdftohtml", file = %redact_path(source)).entered();

        let output = Command::new(&self.program)
            .args(["-xml", "-i", "-q", "-nodrm"])
            .arg(source)
            .arg(target)
            .output()
            .map_err(|e| ConvertError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(ConvertError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
