//! Validation of Gmail API messages into the shape ingestion works with.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};

use super::date::{parse_header_date, parse_internal_date};
use super::error::{MailError, Result};
use super::gmail::{GmailMessage, MessagePart};

/// URL-safe base64 that accepts input with or without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One leaf part of a message that ingestion cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingPart {
    /// A `text/plain` or `text/html` body with inline data.
    TextBody { mime_type: String, data: String },
    /// Any part carrying a filename.
    Attachment {
        filename: String,
        mime_type: Option<String>,
        attachment_id: Option<String>,
        inline_data: Option<String>,
    },
}

/// A fetched message with its metadata resolved.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: String,
    pub subject: String,
    pub sender: Option<String>,
    pub date: DateTime<Utc>,
    pub parts: Vec<IncomingPart>,
}

/// Stored when a message has no `Subject` header.
pub const NO_SUBJECT: &str = "No Subject";

impl IncomingMessage {
    pub fn from_gmail(message: GmailMessage) -> Result<Self> {
        let payload = message.payload.ok_or_else(|| MailError::InvalidMessage {
            id: message.id.clone(),
            reason: "message has no payload".to_string(),
        })?;

        let subject = header(&payload, "Subject")
            .unwrap_or(NO_SUBJECT)
            .to_string();
        let sender = header(&payload, "From").map(str::to_string);
        let date = match header(&payload, "Date") {
            Some(raw) => parse_header_date(raw)?.0,
            None => match message.internal_date.as_deref() {
                Some(internal) => parse_internal_date(internal)?,
                None => return Err(MailError::DateParse("missing Date header".to_string())),
            },
        };

        let parts = flatten_parts(&payload)
            .into_iter()
            .filter_map(classify)
            .collect();

        Ok(Self {
            id: message.id,
            subject,
            sender,
            date,
            parts,
        })
    }

    pub fn attachments(&self) -> impl Iterator<Item = &IncomingPart> {
        self.parts
            .iter()
            .filter(|p| matches!(p, IncomingPart::Attachment { .. }))
    }
}

/// Case-insensitive header lookup on the top-level part.
fn header<'a>(part: &'a MessagePart, name: &str) -> Option<&'a str> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Leaf parts in depth-first order. A payload without children is its own
/// single leaf.
pub fn flatten_parts(payload: &MessagePart) -> Vec<&MessagePart> {
    fn walk<'a>(part: &'a MessagePart, out: &mut Vec<&'a MessagePart>) {
        if part.parts.is_empty() {
            out.push(part);
        } else {
            for child in &part.parts {
                walk(child, out);
            }
        }
    }

    let mut leaves = Vec::new();
    walk(payload, &mut leaves);
    leaves
}

fn classify(part: &MessagePart) -> Option<IncomingPart> {
    let body = part.body.as_ref();
    let data = body.and_then(|b| b.data.clone()).filter(|d| !d.is_empty());

    if let Some(filename) = part.filename.as_deref().filter(|f| !f.is_empty()) {
        return Some(IncomingPart::Attachment {
            filename: filename.to_string(),
            mime_type: part.mime_type.clone(),
            attachment_id: body
                .and_then(|b| b.attachment_id.clone())
                .filter(|id| !id.is_empty()),
            inline_data: data,
        });
    }

    let mime_type = part.mime_type.as_deref()?.to_ascii_lowercase();
    if mime_type == "text/plain" || mime_type == "text/html" {
        return data.map(|data| IncomingPart::TextBody { mime_type, data });
    }
    None
}

/// Decodes URL-safe base64, padded or not.
pub fn decode_base64url(data: &str, what: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    URL_SAFE_LENIENT
        .decode(cleaned.as_bytes())
        .map_err(|e| MailError::Decode {
            what: what.to_string(),
            reason: e.to_string(),
        })
}

/// Decodes a base64url text body; invalid UTF-8 is replaced, not rejected.
pub fn decode_text(data: &str) -> Result<String> {
    let bytes = decode_base64url(data, "message body")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
