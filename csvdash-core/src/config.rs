//! Configuration management for csvdash
//!
//! Config files are stored in platform-appropriate locations:
//! - Linux: ~/.config/csvdash/
//! - macOS: ~/Library/Application Support/csvdash/
//! - Windows: %APPDATA%\csvdash\
//!
//! `CSVDASH_API_URL` and `CSVDASH_WS_URL` override the server URLs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::RetryPolicy;
use crate::storage::{FileCredentialStore, StorageError};

pub const API_URL_ENV: &str = "CSVDASH_API_URL";
pub const WS_URL_ENV: &str = "CSVDASH_WS_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    NoDirFound,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Dashboard server endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Live update channel
    #[serde(default)]
    pub live: LiveConfig,

    /// Client behaviour
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the HTTP API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Notification WebSocket URL
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Fixed wait between a dropped connection and the next attempt
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Random extra wait of up to this many milliseconds (0 = none)
    #[serde(default)]
    pub reconnect_jitter_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Where the session credential is kept (defaults to the data dir)
    pub credential_path: Option<PathBuf>,

    /// TUI-specific settings
    #[serde(default)]
    pub tui: TuiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuiConfig {
    /// Enable mouse support
    #[serde(default = "default_true")]
    pub mouse: bool,
}

// Default value functions
fn default_api_url() -> String {
    crate::DEFAULT_API_URL.to_string()
}
fn default_ws_url() -> String {
    crate::DEFAULT_WS_URL.to_string()
}
fn default_reconnect_delay() -> u64 {
    crate::channel::DEFAULT_RECONNECT_DELAY.as_secs()
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay(),
            reconnect_jitter_ms: 0,
        }
    }
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self { mouse: true }
    }
}

impl LiveConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_secs(self.reconnect_delay_secs),
            jitter: Duration::from_millis(self.reconnect_jitter_ms),
        }
    }
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("csvdash"))
            .ok_or(ConfigError::NoDirFound)
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from default location, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override server URLs from the environment
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.is_empty()) {
            self.server.api_url = url;
        }
        if let Some(url) = lookup(WS_URL_ENV).filter(|u| !u.is_empty()) {
            self.server.ws_url = url;
        }
    }

    /// Credential storage for this configuration
    pub fn credential_store(&self) -> Result<FileCredentialStore, StorageError> {
        match &self.client.credential_path {
            Some(path) => Ok(FileCredentialStore::new(path)),
            None => FileCredentialStore::default_location(),
        }
    }
}
