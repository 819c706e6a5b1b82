//! Configuration loading and resolution
//!
//! Config file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory
//! 4. Compiled defaults (no file)
//!
//! A missing config file is not an error: the service logs a warning and
//! starts with compiled defaults. Secrets can always be supplied through the
//! environment so they never need to live in the TOML file.

use crate::api::signature::TimestampTolerance;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const ENV_CONFIG_PATH: &str = "ENCORE_CONFIG";
/// Environment override for the webhook signing secret
pub const ENV_WEBHOOK_SECRET: &str = "ENCORE_WEBHOOK_SECRET";
/// Environment override for the CMS API token
pub const ENV_CMS_TOKEN: &str = "ENCORE_CMS_TOKEN";
/// Environment override for the listen address
pub const ENV_BIND_ADDR: &str = "ENCORE_BIND_ADDR";

/// Upper bound for ledger windows (one day)
pub const MAX_LEDGER_WINDOW_SECS: u64 = 86_400;

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub webhook: WebhookConfig,
    pub ledger: LedgerSettings,
    pub extraction: ExtractionSettings,
    pub cms: CmsSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:5740`
    pub bind_addr: String,
    /// Maximum accepted webhook body size
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Signing secret shared with the CMS; empty disables verification
    pub secret: String,
    /// The only document type this service processes
    pub document_type: String,
    /// Required value of the release-source discriminator (None = any)
    pub required_source: Option<String>,
    pub max_past_ms: i64,
    pub max_future_ms: i64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        let tolerance = TimestampTolerance::default();
        Self {
            secret: String::new(),
            document_type: "release".to_string(),
            required_source: Some("upload".to_string()),
            max_past_ms: tolerance.max_past_ms,
            max_future_ms: tolerance.max_future_ms,
        }
    }
}

impl WebhookConfig {
    pub fn tolerance(&self) -> TimestampTolerance {
        TimestampTolerance {
            max_past_ms: self.max_past_ms,
            max_future_ms: self.max_future_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Sliding window for counting attempts per document
    pub retry_window_secs: u64,
    /// Attempts allowed per document inside the retry window
    pub max_retries: usize,
    /// Lifetime of a dedup entry for one delivery
    pub expiry_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            retry_window_secs: 300,
            max_retries: 3,
            expiry_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Upper bound on fetch + probe for one track
    pub track_timeout_secs: u64,
    /// Attempts per audio fetch (transient failures only)
    pub fetch_retries: u32,
    /// Largest audio file that will be downloaded
    pub max_audio_bytes: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            track_timeout_secs: 30,
            fetch_retries: 3,
            max_audio_bytes: 512 * 1024 * 1024,
        }
    }
}

impl ExtractionSettings {
    pub fn track_timeout(&self) -> Duration {
        Duration::from_secs(self.track_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsSettings {
    /// Base URL of the content API, e.g. `https://abc123.api.example-cms.io`
    pub api_url: String,
    pub api_version: String,
    pub dataset: String,
    /// Write token; prefer ENCORE_CMS_TOKEN
    pub token: String,
    pub request_timeout_secs: u64,
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3333".to_string(),
            api_version: "v2024-01-01".to_string(),
            dataset: "production".to_string(),
            token: String::new(),
            request_timeout_secs: 15,
        }
    }
}

impl ServiceConfig {
    /// Resolve, load, apply ENV overrides and validate
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path, ENV_CONFIG_PATH) {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                Self::default()
            }
            None => {
                warn!("No config file located, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Environment variables win over file values for secrets and bind address
    pub fn apply_env_overrides(&mut self) {
        if let Some(secret) = non_empty_env(ENV_WEBHOOK_SECRET) {
            self.webhook.secret = secret;
        }
        if let Some(token) = non_empty_env(ENV_CMS_TOKEN) {
            self.cms.token = token;
        }
        if let Some(addr) = non_empty_env(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.max_retries == 0 {
            return Err(Error::Config("ledger.max_retries must be at least 1".to_string()));
        }
        if self.ledger.retry_window_secs == 0 || self.ledger.expiry_secs == 0 {
            return Err(Error::Config(
                "ledger windows must be greater than zero".to_string(),
            ));
        }
        if self.ledger.retry_window_secs > MAX_LEDGER_WINDOW_SECS
            || self.ledger.expiry_secs > MAX_LEDGER_WINDOW_SECS
        {
            return Err(Error::Config(format!(
                "ledger windows must not exceed {} seconds",
                MAX_LEDGER_WINDOW_SECS
            )));
        }
        if self.extraction.track_timeout_secs == 0 {
            return Err(Error::Config(
                "extraction.track_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.extraction.fetch_retries == 0 {
            return Err(Error::Config(
                "extraction.fetch_retries must be at least 1".to_string(),
            ));
        }
        if self.webhook.document_type.trim().is_empty() {
            return Err(Error::Config("webhook.document_type must not be empty".to_string()));
        }
        if self.webhook.max_past_ms < 0 || self.webhook.max_future_ms < 0 {
            return Err(Error::Config(
                "webhook timestamp tolerances must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config file resolution
///
/// Returns the first candidate from CLI argument, environment variable,
/// or the platform config directory. The caller decides what to do if the
/// file is missing.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = non_empty_env(env_var_name) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config directory
    default_config_path()
}

/// `~/.config/encore/encore-wh.toml` (or the platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("encore").join("encore-wh.toml"))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
