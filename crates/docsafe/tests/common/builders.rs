//! Builders for Gmail API messages and test documents.

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use lopdf::{dictionary, Document, Object, Stream};

use docsafe::email::gmail::{GmailMessage, Header, MessagePart, PartBody};

/// Valid `Date` header used unless a test overrides it.
pub const DEFAULT_DATE: &str = "Mon, 02 Mar 2026 10:00:00 +0000";

/// An attachment body the fake mailbox serves by id.
#[derive(Debug, Clone)]
pub struct ServedAttachment {
    pub message_id: String,
    pub attachment_id: String,
    pub data: String,
}

/// Builds a `format=full` Gmail message.
pub struct MessageBuilder {
    id: String,
    subject: String,
    from: Option<String>,
    date: Option<String>,
    internal_date: Option<String>,
    parts: Vec<MessagePart>,
    served: Vec<ServedAttachment>,
}

impl MessageBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            subject: format!("Subject {}", id),
            from: Some("Sender <sender@example.com>".to_string()),
            date: Some(DEFAULT_DATE.to_string()),
            internal_date: None,
            parts: Vec::new(),
            served: Vec::new(),
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn text_body(mut self, text: &str) -> Self {
        self.parts.push(MessagePart {
            mime_type: Some("text/plain".to_string()),
            filename: Some(String::new()),
            body: Some(PartBody {
                size: Some(text.len() as u64),
                data: Some(URL_SAFE_NO_PAD.encode(text)),
                attachment_id: None,
            }),
            ..Default::default()
        });
        self
    }

    /// An attachment fetched through the attachments endpoint.
    pub fn attachment(mut self, filename: &str, bytes: &[u8]) -> Self {
        let attachment_id = format!("att-{}-{}", self.id, self.parts.len());
        self.parts.push(MessagePart {
            mime_type: Some("application/octet-stream".to_string()),
            filename: Some(filename.to_string()),
            body: Some(PartBody {
                size: Some(bytes.len() as u64),
                data: None,
                attachment_id: Some(attachment_id.clone()),
            }),
            ..Default::default()
        });
        self.served.push(ServedAttachment {
            message_id: self.id.clone(),
            attachment_id,
            data: URL_SAFE_NO_PAD.encode(bytes),
        });
        self
    }

    /// An attachment whose data is embedded in the message.
    pub fn inline_attachment(mut self, filename: &str, bytes: &[u8]) -> Self {
        self.parts.push(MessagePart {
            mime_type: Some("application/octet-stream".to_string()),
            filename: Some(filename.to_string()),
            body: Some(PartBody {
                size: Some(bytes.len() as u64),
                data: Some(URL_SAFE_NO_PAD.encode(bytes)),
                attachment_id: None,
            }),
            ..Default::default()
        });
        self
    }

    /// A part with a filename but neither data nor an attachment id.
    pub fn empty_attachment(mut self, filename: &str) -> Self {
        self.parts.push(MessagePart {
            mime_type: Some("application/pdf".to_string()),
            filename: Some(filename.to_string()),
            body: Some(PartBody::default()),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> (GmailMessage, Vec<ServedAttachment>) {
        let mut headers = vec![Header {
            name: "Subject".to_string(),
            value: self.subject,
        }];
        if let Some(from) = self.from {
            headers.push(Header {
                name: "From".to_string(),
                value: from,
            });
        }
        if let Some(date) = self.date {
            headers.push(Header {
                name: "Date".to_string(),
                value: date,
            });
        }

        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            headers,
            parts: self.parts,
            ..Default::default()
        };
        let message = GmailMessage {
            id: self.id.clone(),
            thread_id: Some(format!("thread-{}", self.id)),
            internal_date: self.internal_date,
            snippet: None,
            payload: Some(payload),
        };
        (message, self.served)
    }
}

/// A one-page PDF containing `text`.
pub fn sample_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.new_object_id();
    let resources_id = doc.new_object_id();
    let content_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    doc.objects.insert(
        font_id,
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        }),
    );
    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        }),
    );
    let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
    doc.objects.insert(
        content_id,
        Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
    );
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF");
    bytes
}
