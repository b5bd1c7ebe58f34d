use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secrets::{expand_home, SecretSource};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

pub const DEFAULT_CLIENT_ID_ENV_VAR: &str = "DOCSAFE_GMAIL_CLIENT_ID";
pub const DEFAULT_CLIENT_SECRET_ENV_VAR: &str = "DOCSAFE_GMAIL_CLIENT_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    /// Base directory for relative store, attachment and token paths.
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    /// Directory relative `dataDirectory` values resolve against; the
    /// config file's directory when loaded from disk.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_data_directory() -> String {
    ".".to_string()
}

/// How much work one transaction covers during a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// One transaction per account pass. Any error rolls back the account
    /// and aborts the run.
    #[default]
    Account,
    /// One transaction per message. A failing message is rolled back and
    /// reported; the pass continues.
    Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default = "default_ingest_database")]
    pub database: String,
    #[serde(default = "default_attachment_directory")]
    pub attachment_directory: String,
    #[serde(default = "default_token_directory")]
    pub token_directory: String,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default)]
    pub commit_mode: CommitMode,
}

fn default_ingest_database() -> String {
    "mails.db".to_string()
}

fn default_attachment_directory() -> String {
    "attachments".to_string()
}

fn default_token_directory() -> String {
    "tokens".to_string()
}

pub fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "png", "jpeg", "jpg", "doc", "docx", "odt", "zip", "tar.gz"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_results() -> u32 {
    10_000
}

fn default_lookback_days() -> u32 {
    1000
}

/// Upper bound for `ingest.lookbackDays` (about a century).
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            database: default_ingest_database(),
            attachment_directory: default_attachment_directory(),
            token_directory: default_token_directory(),
            allowed_extensions: default_allowed_extensions(),
            max_results: default_max_results(),
            lookback_days: default_lookback_days(),
            commit_mode: CommitMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_id_file: Option<String>,
    #[serde(default = "default_client_id_env_var")]
    pub client_id_env_var: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_secret_file: Option<String>,
    #[serde(default = "default_client_secret_env_var")]
    pub client_secret_env_var: Option<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_client_id_env_var() -> Option<String> {
    Some(DEFAULT_CLIENT_ID_ENV_VAR.to_string())
}

fn default_client_secret_env_var() -> Option<String> {
    Some(DEFAULT_CLIENT_SECRET_ENV_VAR.to_string())
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_id_file: None,
            client_id_env_var: default_client_id_env_var(),
            client_secret: None,
            client_secret_file: None,
            client_secret_env_var: default_client_secret_env_var(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl OAuthConfig {
    pub fn client_id_source(&self) -> SecretSource {
        SecretSource {
            value: self.client_id.clone(),
            file: self.client_id_file.clone(),
            env_var: self.client_id_env_var.clone(),
        }
    }

    pub fn client_secret_source(&self) -> SecretSource {
        SecretSource {
            value: self.client_secret.clone(),
            file: self.client_secret_file.clone(),
            env_var: self.client_secret_env_var.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterBackend {
    /// In-process text extraction.
    #[default]
    Lopdf,
    /// poppler's `pdftohtml -xml`.
    Pdftohtml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeConfig {
    /// Ingest store to read PDF rows from. Defaults to `ingest.database`.
    #[serde(default)]
    pub input_database: Option<String>,
    /// Directory holding the PDFs. Defaults to `ingest.attachmentDirectory`.
    #[serde(default)]
    pub input_directory: Option<String>,
    #[serde(default = "default_output_database")]
    pub output_database: String,
    /// Defaults to the platform temp directory.
    #[serde(default)]
    pub temp_directory: Option<String>,
    #[serde(default)]
    pub converter: ConverterBackend,
}

fn default_output_database() -> String {
    "documents.db".to_string()
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        resolve_against(&self.base_dir, &self.data_directory)
    }

    fn data_path(&self, value: &str) -> PathBuf {
        resolve_against(&self.data_dir(), value)
    }

    pub fn ingest_database_path(&self) -> PathBuf {
        self.data_path(&self.ingest.database)
    }

    pub fn attachment_dir(&self) -> PathBuf {
        self.data_path(&self.ingest.attachment_directory)
    }

    pub fn token_dir(&self) -> PathBuf {
        self.data_path(&self.ingest.token_directory)
    }

    pub fn normalize_input_database_path(&self) -> PathBuf {
        match &self.normalize.input_database {
            Some(db) => self.data_path(db),
            None => self.ingest_database_path(),
        }
    }

    pub fn normalize_input_dir(&self) -> PathBuf {
        match &self.normalize.input_directory {
            Some(dir) => self.data_path(dir),
            None => self.attachment_dir(),
        }
    }

    pub fn normalize_output_database_path(&self) -> PathBuf {
        self.data_path(&self.normalize.output_database)
    }

    pub fn temp_dir(&self) -> PathBuf {
        match &self.normalize.temp_directory {
            Some(dir) => self.data_path(dir),
            None => std::env::temp_dir(),
        }
    }

    /// Accounts a sync should cover: the single `only` account if given,
    /// otherwise every configured account.
    pub fn sync_accounts(&self, only: Option<&str>) -> Result<Vec<String>, ConfigError> {
        if let Some(account) = only {
            return Ok(vec![account.to_string()]);
        }
        if self.ingest.accounts.is_empty() {
            return Err(ConfigError::Validation {
                message: "No accounts configured under ingest.accounts".to_string(),
            });
        }
        Ok(self.ingest.accounts.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            data_directory: default_data_directory(),
            ingest: IngestConfig::default(),
            oauth: OAuthConfig::default(),
            normalize: NormalizeConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

fn resolve_against(base: &Path, value: &str) -> PathBuf {
    let expanded = expand_home(value);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
