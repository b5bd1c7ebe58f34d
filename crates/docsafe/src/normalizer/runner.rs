//! PDF-to-XML pass from the ingest store into the normalization store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::converter::{converter_for, XmlConverter};
use crate::config::Config;
use crate::db::attachment_repo::{self, PdfCandidateRow};
use crate::db::document_repo::{self, DocumentMetadata};
use crate::db::{Database, Schema};
use crate::error::NormalizeError;
use crate::progress::{NoopProgress, ProgressEvent, ProgressReporter};

/// Counts for one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub candidates: usize,
    pub skipped: usize,
    pub converted: usize,
    /// Documents stored with the converter's error text as content.
    pub failed: usize,
}

enum Conversion {
    Converted(String),
    Failed(String),
}

/// Converts every PDF attachment recorded in the ingest store into XML and
/// stores it, with the owning message's metadata, in the normalization
/// store.
pub struct PdfNormalizer {
    input: Database,
    output: Database,
    input_dir: PathBuf,
    temp_dir: PathBuf,
    converter: Box<dyn XmlConverter>,
    progress: Arc<dyn ProgressReporter>,
}

impl PdfNormalizer {
    pub fn new(
        input: Database,
        output: Database,
        input_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        converter: Box<dyn XmlConverter>,
    ) -> Self {
        Self {
            input,
            output,
            input_dir: input_dir.into(),
            temp_dir: temp_dir.into(),
            converter,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Opens both stores and picks the converter named in the config.
    pub fn from_config(config: &Config) -> Result<Self, NormalizeError> {
        let input = Database::open(&config.normalize_input_database_path(), Schema::Ingest)?;
        let output = Database::open(&config.normalize_output_database_path(), Schema::Normalize)?;
        Ok(Self::new(
            input,
            output,
            config.normalize_input_dir(),
            config.temp_dir(),
            converter_for(config.normalize.converter),
        ))
    }

    /// Normalizes every PDF not yet stored for the input directory.
    ///
    /// A converter error is stored as the document content. A converter
    /// that reports success without leaving output behind aborts the run.
    pub fn run(&self) -> Result<NormalizeReport, NormalizeError> {
        let _span = tracing::info_span!("normalize", converter = self.converter.name()).entered();

        std::fs::create_dir_all(&self.temp_dir).map_err(|e| NormalizeError::CreateDirectory {
            path: self.temp_dir.clone(),
            source: e,
        })?;

        let candidates = attachment_repo::find_pdf_attachments(&self.input)?;
        let src_path = self.input_dir.to_string_lossy().into_owned();
        let mut report = NormalizeReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            if document_repo::exists(&self.output, &candidate.filename, &src_path)? {
                self.progress.report(ProgressEvent::DocumentSkipped {
                    filename: candidate.filename.clone(),
                });
                report.skipped += 1;
                continue;
            }

            let source = self.input_dir.join(&candidate.filename);
            let content = match self.convert(&candidate.filename, &source)? {
                Conversion::Converted(xml) => {
                    report.converted += 1;
                    self.progress.report(ProgressEvent::DocumentConverted {
                        filename: candidate.filename.clone(),
                    });
                    xml
                }
                Conversion::Failed(message) => {
                    report.failed += 1;
                    self.progress.report(ProgressEvent::ConversionFailed {
                        filename: candidate.filename.clone(),
                        error: message.clone(),
                    });
                    message
                }
            };

            self.store(candidate, &src_path, &content)?;
        }

        info!(
            candidates = report.candidates,
            skipped = report.skipped,
            converted = report.converted,
            failed = report.failed,
            "Normalization finished"
        );
        Ok(report)
    }

    fn convert(&self, filename: &str, source: &Path) -> Result<Conversion, NormalizeError> {
        let target = self.temp_dir.join(format!("{}.xml", Uuid::new_v4()));

        if let Err(e) = self.converter.convert(source, &target) {
            warn!(filename = %filename, error = %e, "Conversion failed");
            let _ = std::fs::remove_file(&target);
            return Ok(Conversion::Failed(e.to_string()));
        }

        let bytes = match std::fs::read(&target) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(NormalizeError::NoConversionOutput {
                    filename: filename.to_string(),
                    path: target,
                });
            }
            Err(e) => {
                return Err(NormalizeError::ReadOutput {
                    path: target,
                    source: e,
                });
            }
        };

        if let Err(e) = std::fs::remove_file(&target) {
            warn!("Failed to remove {}: {}", target.display(), e);
        }
        Ok(Conversion::Converted(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }

    /// Writes the XML row and its metadata row together.
    fn store(
        &self,
        candidate: &PdfCandidateRow,
        src_path: &str,
        content: &str,
    ) -> Result<i64, NormalizeError> {
        let tx = self.output.begin()?;
        let xml_id = document_repo::insert_xml(&self.output, src_path, &candidate.filename, content)?;
        document_repo::insert_metadata(
            &self.output,
            &DocumentMetadata {
                subject: candidate.subject.as_deref(),
                date: candidate.date.as_deref(),
                body: candidate.body.as_deref(),
                sender: candidate.sender.as_deref(),
                external_id: candidate.external_id.as_deref(),
            },
            xml_id,
        )?;
        tx.commit()?;
        Ok(xml_id)
    }
}
