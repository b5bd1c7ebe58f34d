use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocsafeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Mail error: {0}")]
    Mail(#[from] crate::email::MailError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] crate::email::IngestError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("No config file given and no home directory to look for one")]
    NoDefaultLocation,
}

/// Failures raised by an XML conversion backend.
///
/// These are recoverable from the normalizer's point of view: the rendered
/// message is stored in place of the document content.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PDF: {0}")]
    PdfParse(String),

    #[error("Failed to render XML: {0}")]
    Xml(String),

    #[error("Failed to write '{path}': {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run '{program}': {source}. Make sure poppler-utils is installed.")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Conversion of '{filename}' produced no output at '{path}'")]
    NoConversionOutput { filename: String, path: PathBuf },

    #[error("Failed to read conversion output '{path}': {source}")]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DocsafeError>;
