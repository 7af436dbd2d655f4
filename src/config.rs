//! Dashboard configuration.
//!
//! Resolution order: explicit environment variables, then the OS credential
//! store. An API key may also be given as a connection string (plain or
//! base64url JSON carrying `url` and `key`), in which case the URL inside it
//! is used when none is configured separately.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::{normalize_base_url, DEFAULT_TIMEOUT};
use crate::error::ConfigError;
use crate::report_table::DEFAULT_PAGE_SIZE;
use crate::storage;

pub const ENV_URL: &str = "ADMIN_DASHBOARD_URL";
pub const ENV_API_KEY: &str = "ADMIN_DASHBOARD_API_KEY";
pub const ENV_CONNECTION: &str = "ADMIN_DASHBOARD_CONNECTION";
pub const ENV_TIMEOUT_SECS: &str = "ADMIN_DASHBOARD_TIMEOUT_SECS";
pub const ENV_LOG_DIR: &str = "ADMIN_DASHBOARD_LOG_DIR";

/// Stock alerts refresh on a fixed 30 second timer.
pub const DEFAULT_STOCK_ALERT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub page_size: usize,
    pub stock_alert_interval: Duration,
    pub log_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            stock_alert_interval: DEFAULT_STOCK_ALERT_INTERVAL,
            log_dir: default_log_dir(),
        }
    }
}

/// Platform data directory for rolling logs.
pub fn default_log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                .join(".local")
                .join("share")
        });
    base.join("admin-dashboard").join("logs")
}

// ---------------------------------------------------------------------------
// Connection strings
// ---------------------------------------------------------------------------

fn decode_connection_string_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed).ok();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

fn connection_field(raw: &str, keys: &[&str]) -> Option<String> {
    let payload = decode_connection_string_payload(raw)?;
    keys.iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn extract_api_key_from_connection_string(raw: &str) -> Option<String> {
    connection_field(raw, &["key", "apiKey", "api_key"])
}

pub fn extract_url_from_connection_string(raw: &str) -> Option<String> {
    connection_field(raw, &["url", "baseUrl", "base_url"]).map(|u| normalize_base_url(&u))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl DashboardConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let mut config = Self::default();
        config.apply_credentials(Some(base_url.to_string()), Some(api_key.to_string()));
        config
    }

    /// Fill URL and key, unpacking a connection string when the key is one.
    fn apply_credentials(&mut self, url: Option<String>, key: Option<String>) {
        if let Some(raw_key) = key {
            match extract_api_key_from_connection_string(&raw_key) {
                Some(decoded) => {
                    debug!("api key supplied as connection string");
                    if url.is_none() && self.base_url.is_empty() {
                        if let Some(decoded_url) = extract_url_from_connection_string(&raw_key) {
                            self.base_url = decoded_url;
                        }
                    }
                    self.api_key = decoded;
                }
                None => self.api_key = raw_key.trim().to_string(),
            }
        }
        if let Some(url) = url {
            let normalized = normalize_base_url(&url);
            if !normalized.is_empty() {
                self.base_url = normalized;
            }
        }
    }

    /// Read configuration from the process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let key = env_non_empty(ENV_API_KEY).or_else(|| env_non_empty(ENV_CONNECTION));
        config.apply_credentials(env_non_empty(ENV_URL), key);

        if let Some(raw) = env_non_empty(ENV_TIMEOUT_SECS) {
            let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = env_non_empty(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Environment first, then whatever is stored in the OS credential store.
    pub fn resolve() -> anyhow::Result<Self> {
        match Self::from_env() {
            Ok(config) => {
                info!(base_url = %config.base_url, "configuration loaded from environment");
                Ok(config)
            }
            Err(ConfigError::InvalidValue { key, value }) => {
                Err(ConfigError::InvalidValue { key, value }.into())
            }
            Err(_) => {
                let mut config = Self::default();
                config.apply_credentials(
                    storage::get_credential(storage::KEY_BASE_URL),
                    storage::get_credential(storage::KEY_API_KEY),
                );
                config.validate()?;
                info!(base_url = %config.base_url, "configuration loaded from credential store");
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}
