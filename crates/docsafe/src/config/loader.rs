use std::path::{Path, PathBuf};

use crate::config::schema::{Config, MAX_LOOKBACK_DAYS};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// `~/.docsafe/config.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".docsafe").join("config.json"))
        .ok_or(ConfigError::NoDefaultLocation)
}

/// Loads and validates a config file. Relative paths inside it resolve
/// against the file's directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    load_config_from_str(&content, base_dir)
}

pub fn load_config_from_str(content: &str, base_dir: PathBuf) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let mut config: Config = serde_json::from_value(json_value)?;
    config.base_dir = base_dir;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let ingest = &config.ingest;
    if ingest.allowed_extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "ingest.allowedExtensions must not be empty".to_string(),
        });
    }
    for ext in &ingest.allowed_extensions {
        let trimmed = ext.trim_start_matches('.');
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(ConfigError::Validation {
                message: format!("Invalid extension in ingest.allowedExtensions: '{}'", ext),
            });
        }
    }
    if ingest.lookback_days > MAX_LOOKBACK_DAYS {
        return Err(ConfigError::Validation {
            message: format!("ingest.lookbackDays must be at most {}", MAX_LOOKBACK_DAYS),
        });
    }
    if ingest.max_results == 0 {
        return Err(ConfigError::Validation {
            message: "ingest.maxResults must be positive".to_string(),
        });
    }

    for (name, source) in [
        ("oauth.clientId", config.oauth.client_id_source()),
        ("oauth.clientSecret", config.oauth.client_secret_source()),
    ] {
        if !source.is_configured() {
            return Err(ConfigError::Validation {
                message: format!("{} needs a value, a file or an env var name", name),
            });
        }
    }

    for (name, url) in [
        ("oauth.authUrl", &config.oauth.auth_url),
        ("oauth.tokenUrl", &config.oauth.token_url),
        ("oauth.apiBaseUrl", &config.oauth.api_base_url),
    ] {
        if let Err(e) = reqwest::Url::parse(url) {
            return Err(ConfigError::Validation {
                message: format!("{} is not a valid URL ({}): {}", name, e, url),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CommitMode, ConverterBackend};

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#, PathBuf::from("/cfg")).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.ingest.max_results, 10_000);
        assert_eq!(config.data_dir(), PathBuf::from("/cfg/."));
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "dataDirectory": "/srv/docsafe",
            "ingest": {
                "accounts": ["alice@example.com"],
                "allowedExtensions": ["pdf", "tar.gz"],
                "maxResults": 50,
                "lookbackDays": 30,
                "commitMode": "message"
            },
            "oauth": {
                "clientId": "id-123",
                "clientSecretFile": "~/.config/docsafe/secret",
                "tokenUrl": "http://127.0.0.1:9000/token"
            },
            "normalize": {
                "converter": "pdftohtml",
                "tempDirectory": "tmp"
            }
        }
        "#;

        let config = load_config_from_str(config_json, PathBuf::new()).unwrap();
        assert_eq!(config.ingest.accounts, vec!["alice@example.com"]);
        assert_eq!(config.ingest.max_results, 50);
        assert_eq!(config.ingest.lookback_days, 30);
        assert_eq!(config.ingest.commit_mode, CommitMode::Message);
        assert_eq!(config.normalize.converter, ConverterBackend::Pdftohtml);
        assert_eq!(config.temp_dir(), PathBuf::from("/srv/docsafe/tmp"));
        assert_eq!(config.oauth.client_id.as_deref(), Some("id-123"));
        assert_eq!(config.oauth.token_url, "http://127.0.0.1:9000/token");
    }

    #[test]
    fn test_unknown_field_rejected_by_schema() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "ingest": { "acounts": [] } }"#,
            PathBuf::new(),
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#, PathBuf::new());
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_zero_max_results_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "ingest": { "maxResults": 0 } }"#,
            PathBuf::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_huge_lookback_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "ingest": { "lookbackDays": 4000000000 } }"#,
            PathBuf::new(),
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));

        let config = load_config_from_str(
            r#"{ "version": "1.0", "ingest": { "lookbackDays": 36500 } }"#,
            PathBuf::new(),
        )
        .unwrap();
        assert_eq!(config.ingest.lookback_days, MAX_LOOKBACK_DAYS);
    }

    #[test]
    fn test_empty_allow_list_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "ingest": { "allowedExtensions": [] } }"#,
            PathBuf::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_commit_mode_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "ingest": { "commitMode": "never" } }"#,
            PathBuf::new(),
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_blank_client_secret_source_rejected() {
        let json = r#"{"version": "1.0", "oauth": {"clientSecretEnvVar": ""}}"#;
        let err = load_config_from_str(json, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref message } if message.contains("oauth.clientSecret")));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "oauth": { "tokenUrl": "not a url" } }"#,
            PathBuf::new(),
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_load_config_file_sets_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "version": "1.0", "dataDirectory": "state" }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.ingest_database_path(),
            dir.path().join("state").join("mails.db")
        );
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/docsafe/config.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json", PathBuf::new());
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }
}
