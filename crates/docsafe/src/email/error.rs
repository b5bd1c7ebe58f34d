//! Mail source and ingestion error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while authenticating against or talking to the mail API.
#[derive(Error, Debug)]
pub enum MailError {
    /// The OAuth2 token endpoint rejected a request or could not be reached.
    #[error("OAuth2 error: {0}")]
    OAuth2Error(String),

    /// The interactive authorization was denied or returned garbage.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Client id or secret could not be resolved.
    #[error("Credentials not found: {0}")]
    CredentialsNotFound(#[from] crate::secrets::SecretError),

    /// Reading or writing a persisted token file failed.
    #[error("Token file '{path}': {source}")]
    TokenStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The mail API answered with a non-success status.
    #[error("Mail API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A response body did not match the expected shape.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Base64 payload could not be decoded.
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// None of the supported date layouts matched the `Date` header.
    #[error("Unrecognized date header '{0}'")]
    DateParse(String),

    /// A message lacks the fields needed to store it.
    #[error("Invalid message '{id}': {reason}")]
    InvalidMessage { id: String, reason: String },

    /// IO error on the loopback callback listener.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Errors that abort (part of) a sync pass.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    /// A message row written moments ago could not be read back.
    #[error("Message '{external_id}' was inserted but cannot be found")]
    ConsistencyFault { external_id: String },

    /// `now - lookbackDays` falls outside the representable date range.
    #[error("Lookback of {days} days is out of range")]
    LookbackOutOfRange { days: u32 },

    #[error("Failed to write attachment '{path}': {source}")]
    WriteAttachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MailError>;
