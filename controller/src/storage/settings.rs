//! Settings file management

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::errors::ControllerError;
use crate::logs::LogLevel;

/// Environment variable overriding the session token from the settings file
pub const TOKEN_ENV_VAR: &str = "RELCTL_TOKEN";

/// Controller settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Slug of the installed application
    pub app_slug: String,

    /// Releases arrive as uploaded airgap bundles
    #[serde(default)]
    pub airgap: bool,

    /// The console runs inside an embedded cluster
    #[serde(default)]
    pub embedded_cluster: bool,

    /// Release history page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Polling configuration
    #[serde(default)]
    pub polling: PollingSettings,
}

fn default_page_size() -> u32 {
    20
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, ControllerError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let mut settings: Settings = serde_json::from_str(&contents)?;

        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            settings.backend.auth_token = Some(SecretString::from(token));
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.app_slug.trim().is_empty() {
            return Err(ControllerError::ConfigError("app_slug must be set".to_string()));
        }
        if self.page_size == 0 {
            return Err(ControllerError::ConfigError(
                "page_size must be greater than zero".to_string(),
            ));
        }
        let intervals = [
            ("update_status_interval_ms", self.polling.update_status_interval_ms),
            ("download_status_interval_ms", self.polling.download_status_interval_ms),
            ("upgrade_status_interval_ms", self.polling.upgrade_status_interval_ms),
            ("history_refresh_interval_ms", self.polling.history_refresh_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(ControllerError::ConfigError(format!(
                "polling.{} must be greater than zero",
                name
            )));
        }
        if self.backend.auth_token.is_none() {
            return Err(ControllerError::ConfigError(format!(
                "no session token; set backend.auth_token or {}",
                TOKEN_ENV_VAR
            )));
        }
        Ok(())
    }
}

/// Backend API settings
#[derive(Debug, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the admin console API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Session token sent in the Authorization header
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub auth_token: Option<SecretString>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn default_backend_url() -> String {
    "http://localhost:8800/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            auth_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Polling intervals in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_update_status_interval")]
    pub update_status_interval_ms: u64,

    #[serde(default = "default_download_status_interval")]
    pub download_status_interval_ms: u64,

    #[serde(default = "default_upgrade_status_interval")]
    pub upgrade_status_interval_ms: u64,

    #[serde(default = "default_history_refresh_interval")]
    pub history_refresh_interval_ms: u64,
}

fn default_update_status_interval() -> u64 {
    1000
}

fn default_download_status_interval() -> u64 {
    2000
}

fn default_upgrade_status_interval() -> u64 {
    1000
}

fn default_history_refresh_interval() -> u64 {
    2000
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            update_status_interval_ms: default_update_status_interval(),
            download_status_interval_ms: default_download_status_interval(),
            upgrade_status_interval_ms: default_upgrade_status_interval(),
            history_refresh_interval_ms: default_history_refresh_interval(),
        }
    }
}
