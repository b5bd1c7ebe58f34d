//! In-memory stand-ins for the mail service, converters and progress sink.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docsafe::email::gmail::{GmailMessage, MessageRef};
use docsafe::email::MailError;
use docsafe::normalizer::XmlConverter;
use docsafe::{ConvertError, MailConnector, MailService, ProgressEvent, ProgressReporter};

use super::builders::MessageBuilder;

#[derive(Default)]
struct MailboxState {
    messages: Vec<GmailMessage>,
    attachments: HashMap<(String, String), String>,
    queries: Vec<String>,
    connected: Vec<String>,
    fetched: Vec<String>,
}

/// A mailbox shared by every account that connects to it.
#[derive(Clone, Default)]
pub struct FakeMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, builder: MessageBuilder) {
        let (message, served) = builder.build();
        let mut state = self.state.lock().unwrap();
        for attachment in served {
            state.attachments.insert(
                (attachment.message_id, attachment.attachment_id),
                attachment.data,
            );
        }
        state.messages.push(message);
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn connected_accounts(&self) -> Vec<String> {
        self.state.lock().unwrap().connected.clone()
    }

    /// Ids passed to `get_message`, in call order.
    pub fn fetched_messages(&self) -> Vec<String> {
        self.state.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl MailService for FakeMailbox {
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>, MailError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());
        Ok(state
            .messages
            .iter()
            .take(max_results as usize)
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<GmailMessage, MailError> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(id.to_string());
        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| MailError::Api {
                status: 404,
                body: format!("message {} not found", id),
            })
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Option<String>, MailError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .attachments
            .get(&(message_id.to_string(), attachment_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl MailConnector for FakeMailbox {
    async fn connect(&self, account: &str) -> Result<Box<dyn MailService>, MailError> {
        self.state.lock().unwrap().connected.push(account.to_string());
        Ok(Box::new(self.clone()))
    }
}

/// Collects every progress event.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Writes a fixed XML document naming the source file.
pub struct FakeConverter;

impl XmlConverter for FakeConverter {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let name = source.file_name().and_then(|n| n.to_str()).unwrap_or("");
        std::fs::write(target, format!("<document source=\"{}\"/>", name)).map_err(|e| {
            ConvertError::WriteOutput {
                path: target.to_path_buf(),
                source: e,
            }
        })
    }
}

/// Reports success without writing anything.
pub struct NullOutputConverter;

impl XmlConverter for NullOutputConverter {
    fn name(&self) -> &'static str {
        "null"
    }

    fn convert(&self, _source: &Path, _target: &Path) -> Result<(), ConvertError> {
        Ok(())
    }
}
