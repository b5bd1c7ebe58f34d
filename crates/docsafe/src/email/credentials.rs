//! Per-account access tokens: load, refresh, or obtain interactively.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use super::callback::CallbackListener;
use super::error::{MailError, Result};
use super::oauth::{OAuthClient, TokenResponse};
use crate::config::Config;
use crate::progress::{NoopProgress, ProgressEvent, ProgressReporter};
use crate::sanitize::sanitize_filename;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Upper bound applied to a server-reported `expires_in`.
const MAX_LIFETIME_SECS: i64 = 365 * 24 * 3600;

/// Token as persisted in `<token_dir>/<account>_token.json`.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

impl StoredToken {
    /// Builds a stored token from a token endpoint response. The previous
    /// refresh token is kept when the response does not carry a new one.
    pub fn from_response(
        response: TokenResponse,
        previous_refresh_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = response
            .expires_in
            .map(|secs| i64::try_from(secs).unwrap_or(MAX_LIFETIME_SECS).min(MAX_LIFETIME_SECS))
            .map(|secs| now + Duration::seconds(secs));
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh_token),
            expires_at,
            scope: response.scope,
            token_type: response.token_type,
        }
    }

    /// A token without a known expiry is assumed valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_BUFFER_SECS) <= now,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }
}

/// Reads and writes token files under one directory.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, account: &str) -> PathBuf {
        self.dir
            .join(format!("{}_token.json", sanitize_filename(account)))
    }

    /// Loads the token for `account`. A missing, unreadable or malformed
    /// file yields `None`.
    pub async fn load(&self, account: &str) -> Option<StoredToken> {
        let path = self.path_for(account);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Token file unreadable");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Token file invalid");
                None
            }
        }
    }

    /// Writes (or overwrites) the token file for `account`.
    pub async fn save(&self, account: &str, token: &StoredToken) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MailError::TokenStore {
                path: self.dir.clone(),
                source: e,
            })?;

        let path = self.path_for(account);
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| MailError::ParseError(format!("Failed to serialize token: {}", e)))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| MailError::TokenStore {
                path: path.clone(),
                source: e,
            })?;
        restrict_permissions(&path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| MailError::TokenStore {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Obtains a valid access token for a mail account.
pub struct CredentialProvider {
    oauth: OAuthClient,
    store: TokenStore,
    progress: Arc<dyn ProgressReporter>,
}

impl CredentialProvider {
    pub fn new(oauth: OAuthClient, store: TokenStore) -> Self {
        Self {
            oauth,
            store,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Resolves client credentials and endpoints from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        use secrecy::ExposeSecret;

        let client_id = config.oauth.client_id_source().resolve()?;
        let client_secret = config.oauth.client_secret_source().resolve()?;
        let oauth = OAuthClient::new(
            config.oauth.auth_url.clone(),
            config.oauth.token_url.clone(),
            client_id.expose_secret().to_string(),
            client_secret,
        )?;
        Ok(Self::new(oauth, TokenStore::new(config.token_dir())))
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Returns a valid access token, refreshing or re-authorizing if needed.
    pub async fn get_token(&self, account: &str) -> Result<SecretString> {
        let span = info_span!("get_token", account = %account);
        async {
            let now = Utc::now();
            match self.store.load(account).await {
                Some(token) if !token.is_expired(now) => {
                    info!("Using stored access token");
                    Ok(token.access_token())
                }
                Some(token) if token.can_refresh() => {
                    let refreshed = self.refresh(account, token).await?;
                    Ok(refreshed.access_token())
                }
                _ => self.authorize(account).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the interactive loopback authorization and persists the result.
    pub async fn authorize(&self, account: &str) -> Result<SecretString> {
        let listener = CallbackListener::bind().await?;
        let redirect_uri = listener.redirect_uri().to_string();
        let state = uuid::Uuid::new_v4().to_string();
        let url = self.oauth.authorization_url(&redirect_uri, &state)?;

        self.progress.report(ProgressEvent::AuthorizationRequired {
            account: account.to_string(),
            url: url.to_string(),
        });

        let code = listener.wait_for_code(&state).await?;
        let response = self.oauth.exchange_code(&code, &redirect_uri).await?;
        let token = StoredToken::from_response(response, None, Utc::now());
        self.store.save(account, &token).await?;

        info!(account = %account, "Authorization complete, token stored");
        Ok(token.access_token())
    }

    async fn refresh(&self, account: &str, token: StoredToken) -> Result<StoredToken> {
        let refresh_token = SecretString::from(token.refresh_token.clone().unwrap_or_default());
        let response = self.oauth.refresh_access_token(&refresh_token).await?;
        let refreshed = StoredToken::from_response(response, token.refresh_token, Utc::now());
        self.store.save(account, &refreshed).await?;

        self.progress.report(ProgressEvent::TokenRefreshed {
            account: account.to_string(),
        });
        Ok(refreshed)
    }
}
