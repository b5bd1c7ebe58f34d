//! Gmail attachment ingestion.
//!
//! Authenticates per account with OAuth2 (loopback authorization-code flow),
//! searches for messages with allow-listed attachments, and stores messages
//! and attachment files in the ingest store.

pub mod callback;
pub mod credentials;
pub mod date;
pub mod error;
pub mod gmail;
pub mod ingestor;
pub mod oauth;
pub mod parser;
pub mod query;

pub use credentials::{CredentialProvider, StoredToken, TokenStore};
pub use date::{parse_header_date, HeaderDateFormat};
pub use error::{IngestError, MailError};
pub use gmail::{
    GmailClient, GmailConnector, GmailMessage, MailConnector, MailService, MessagePart, MessageRef,
};
pub use ingestor::{AttachmentIngestor, IngestSettings, SyncReport, SyncRequest};
pub use oauth::{OAuthClient, TokenResponse, GMAIL_READONLY_SCOPE};
pub use parser::{IncomingMessage, IncomingPart};
pub use query::{build_query, ExtensionFilter};
