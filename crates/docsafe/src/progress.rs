//! Progress events emitted by the ingestor, the normalizer and the
//! credential flow.
//!
//! Components receive an `Arc<dyn ProgressReporter>` at construction and
//! report what they do through it instead of writing to a global logger.

use std::fmt;

/// Why an attachment part was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The filename does not end in an allow-listed extension.
    InvalidExtension,
    /// The part has neither an attachment id nor inline data.
    MissingPayload,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidExtension => f.write_str("invalid extension"),
            SkipReason::MissingPayload => f.write_str("no attachment payload"),
        }
    }
}

/// Events emitted during a sync or normalization pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    AccountStarted {
        account: String,
        query: String,
    },
    NoMessages {
        account: String,
    },
    MessageSkipped {
        external_id: String,
    },
    MessageStored {
        external_id: String,
        attachments: usize,
    },
    MessageFailed {
        external_id: String,
        error: String,
    },
    AttachmentSkipped {
        external_id: String,
        filename: String,
        reason: SkipReason,
    },
    AttachmentSaved {
        external_id: String,
        filename: String,
    },
    /// The user must open `url` in a browser to grant access.
    AuthorizationRequired {
        account: String,
        url: String,
    },
    TokenRefreshed {
        account: String,
    },
    DocumentSkipped {
        filename: String,
    },
    DocumentConverted {
        filename: String,
    },
    ConversionFailed {
        filename: String,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to `tracing`.
///
/// The authorization URL is additionally printed to stderr so the user sees
/// it regardless of the log filter.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::AccountStarted { account, query } => {
                tracing::info!(account = %account, query = %query, "Syncing account");
            }
            ProgressEvent::NoMessages { account } => {
                tracing::info!(account = %account, "No messages found");
            }
            ProgressEvent::MessageSkipped { external_id } => {
                tracing::debug!(message_id = %external_id, "Message already stored");
            }
            ProgressEvent::MessageStored {
                external_id,
                attachments,
            } => {
                tracing::info!(message_id = %external_id, attachments, "Message stored");
            }
            ProgressEvent::MessageFailed { external_id, error } => {
                tracing::error!(message_id = %external_id, error = %error, "Message failed");
            }
            ProgressEvent::AttachmentSkipped {
                external_id,
                filename,
                reason,
            } => {
                tracing::info!(
                    message_id = %external_id,
                    filename = %filename,
                    reason = %reason,
                    "Attachment skipped"
                );
            }
            ProgressEvent::AttachmentSaved {
                external_id,
                filename,
            } => {
                tracing::debug!(message_id = %external_id, filename = %filename, "Attachment saved");
            }
            ProgressEvent::AuthorizationRequired { account, url } => {
                tracing::info!(account = %account, "Authorization required");
                eprintln!("Open this URL in your browser to authorize {}:\n\n  {}\n", account, url);
            }
            ProgressEvent::TokenRefreshed { account } => {
                tracing::info!(account = %account, "Access token refreshed");
            }
            ProgressEvent::DocumentSkipped { filename } => {
                tracing::debug!(filename = %filename, "Already normalized");
            }
            ProgressEvent::DocumentConverted { filename } => {
                tracing::info!(filename = %filename, "Converted to XML");
            }
            ProgressEvent::ConversionFailed { filename, error } => {
                tracing::warn!(filename = %filename, error = %error, "Conversion failed, storing error text");
            }
        }
    }
}
