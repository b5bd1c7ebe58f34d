//! Gmail REST API client.
//!
//! Only the three calls ingestion needs: list message ids for a search
//! query, fetch a full message, fetch one attachment body.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::credentials::CredentialProvider;
use super::error::{MailError, Result};
use super::oauth::create_http_client;
use crate::sanitize::excerpt;

/// Largest page the list endpoint accepts.
const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Epoch milliseconds, sent as a string.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentBody {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub data: Option<String>,
}

/// A mailbox opened for one account.
#[async_trait]
pub trait MailService: Send + Sync {
    /// Ids of messages matching `query`, at most `max_results` of them.
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>>;

    async fn get_message(&self, id: &str) -> Result<GmailMessage>;

    /// Base64url attachment data, `None` if the API returned no data.
    async fn get_attachment(&self, message_id: &str, attachment_id: &str)
        -> Result<Option<String>>;
}

/// Opens a [`MailService`] for an account.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, account: &str) -> Result<Box<dyn MailService>>;
}

/// Gmail API client bound to one access token.
pub struct GmailClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl GmailClient {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MailError::Api {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| MailError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        let url = format!("{}/users/me/messages", self.base_url);
        let limit = max_results as usize;
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        while refs.len() < limit {
            let remaining = (limit - refs.len()) as u32;
            let mut params = vec![
                ("q", query.to_string()),
                ("maxResults", remaining.min(MAX_PAGE_SIZE).to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: MessageList = self.get_json(&url, &params).await?;
            refs.extend(page.messages);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        refs.truncate(limit);
        Ok(refs)
    }

    async fn get_message(&self, id: &str) -> Result<GmailMessage> {
        let url = format!("{}/users/me/messages/{}", self.base_url, id);
        self.get_json(&url, &[("format", "full".to_string())]).await
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/users/me/messages/{}/attachments/{}",
            self.base_url, message_id, attachment_id
        );
        let body: AttachmentBody = self.get_json(&url, &[]).await?;
        Ok(body.data)
    }
}

/// Connects to Gmail using tokens from a [`CredentialProvider`].
pub struct GmailConnector {
    credentials: CredentialProvider,
    api_base_url: String,
}

impl GmailConnector {
    pub fn new(credentials: CredentialProvider, api_base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            api_base_url: api_base_url.into(),
        }
    }
}

#[async_trait]
impl MailConnector for GmailConnector {
    async fn connect(&self, account: &str) -> Result<Box<dyn MailService>> {
        let token = self.credentials.get_token(account).await?;
        Ok(Box::new(GmailClient::new(self.api_base_url.clone(), token)?))
    }
}
