//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.emolens.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".emolens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// REST API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Push channel settings.
    #[serde(default)]
    pub events: EventsConfig,

    /// Session (token) storage settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Background reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Where uploaded videos are stored by the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Direct multipart upload to the API server.
    Local,
    /// Presigned object-storage upload followed by a finalize call.
    #[default]
    S3,
}

/// REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the version prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Backend storage mode; decides the upload flow and stream URLs.
    #[serde(default)]
    pub storage_mode: StorageMode,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            storage_mode: StorageMode::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Push channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Newline-delimited JSON event stream URL.
    #[serde(default = "default_events_url")]
    pub url: String,

    /// Subscribe to push events in `watch`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            url: default_events_url(),
            enabled: true,
        }
    }
}

fn default_events_url() -> String {
    "http://localhost:5000/events".to_string()
}

fn default_true() -> bool {
    true
}

/// Session storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Explicit session file. Defaults to the platform data directory.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

/// Background reconciliation poll settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Run the poll alongside the push channel.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay between successful refreshes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// First retry delay after a failed refresh.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_seconds: u64,

    /// Upper bound for the retry delay.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_seconds: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval(),
            backoff_base_seconds: default_backoff_base(),
            backoff_max_seconds: default_backoff_max(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_backoff_base() -> u64 {
    2
}

fn default_backoff_max() -> u64 {
    300
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_seconds)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_seconds)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(mode) = args.storage {
            self.api.storage_mode = mode;
        }
        if let Some(ref url) = args.events_url {
            self.events.url = url.clone();
        }
        if let Some(ref path) = args.session_file {
            self.session.token_file = Some(path.clone());
        }
    }

    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [("API", &self.api.base_url), ("events", &self.events.url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("{} URL must start with 'http://' or 'https://'", name));
            }
        }
        if self.api.timeout_seconds == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }
        if self.reconcile.interval_seconds == 0 {
            return Err("Reconcile interval must be at least 1 second".to_string());
        }
        if self.reconcile.backoff_base_seconds > self.reconcile.backoff_max_seconds {
            return Err("backoff_base_seconds cannot exceed backoff_max_seconds".to_string());
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
