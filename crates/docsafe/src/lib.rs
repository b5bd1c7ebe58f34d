pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod normalizer;
pub mod progress;
pub mod sanitize;
pub mod secrets;

pub use config::{load_config, CommitMode, Config, ConverterBackend};
pub use db::{Database, DatabaseError, Schema};
pub use email::{
    AttachmentIngestor, CredentialProvider, GmailConnector, IngestError, MailConnector,
    MailError, MailService, SyncReport, SyncRequest,
};
pub use error::{ConfigError, ConvertError, DocsafeError, NormalizeError, Result};
pub use normalizer::{NormalizeReport, PdfNormalizer, XmlConverter};
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter, TracingProgress};
pub use secrets::{resolve_secret, SecretError};
