//! OAuth2 authorization-code client for the Gmail API.
//!
//! Builds the consent URL for the installed-app loopback flow, exchanges the
//! returned code for tokens, and refreshes access tokens.

use std::time::Duration;

use log::{info, warn};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::{MailError, Result};
use crate::sanitize::excerpt;

/// The only scope requested: read-only mailbox access.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Default connect timeout for HTTP requests (10 seconds).
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (60 seconds).
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates an HTTP client with appropriate timeouts.
pub(crate) fn create_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| MailError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime in seconds of the access token.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// Only sent on the initial exchange and occasionally on refresh.
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,

    #[serde(default)]
    pub error_description: Option<String>,
}

/// Client credentials plus the two OAuth endpoints.
pub struct OAuthClient {
    client: Client,
    auth_url: String,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl OAuthClient {
    pub fn new(
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
        })
    }

    /// Consent URL for the loopback flow.
    ///
    /// Requests offline access so the first exchange yields a refresh token.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", GMAIL_READONLY_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| MailError::ConfigError(format!("Invalid authorization URL: {}", e)))
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];
        self.token_request(&params, "Code exchange").await
    }

    /// Refresh an access token using a refresh token.
    pub async fn refresh_access_token(&self, refresh_token: &SecretString) -> Result<TokenResponse> {
        info!("Refreshing access token");

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];
        self.token_request(&params, "Token refresh").await
    }

    async fn token_request(&self, params: &[(&str, &str)], what: &str) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| MailError::OAuth2Error(format!("{} failed: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{} - {}", err.error, excerpt(&desc)),
                    None => err.error,
                },
                Err(_) => excerpt(&body),
            };
            warn!("{} failed ({}): {}", what, status, detail);
            return Err(MailError::OAuth2Error(format!(
                "{} failed ({}): {}",
                what, status, detail
            )));
        }

        response.json::<TokenResponse>().await.map_err(|e| {
            MailError::OAuth2Error(format!("Failed to parse token response: {}", e))
        })
    }
}
