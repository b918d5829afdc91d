//! Optional TOML configuration for the `update-trigger` binary and embedding hosts.
//!
//! The file carries settings that rarely change between launches, such as the update
//! server root and HTTP client tuning, so a host only has to pass per-launch values
//! (paths, process ids, its own version) on the command line.
//!
//! # Configuration File Location
//!
//! - `UPDATE_TRIGGER_CONFIG` when set
//! - otherwise `{config dir}/update-trigger/config.toml`
//!   (`~/.config` on Linux, `~/Library/Application Support` on macOS,
//!   `%APPDATA%` on Windows)
//!
//! # File Format
//!
//! ```toml
//! base_url = "https://updates.example.com/app"
//! version_file = "version.json"
//! updater_name = "latest-updater"
//! connect_timeout_secs = 10
//! read_timeout_secs = 30
//! user_agent = "my-app-updater/1.0"
//! show_progress = true
//! ```
//!
//! Every key is optional.

use crate::core::TriggerError;
use crate::utils::platform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "UPDATE_TRIGGER_CONFIG";

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_read_timeout_secs() -> u64 {
    30
}

const fn default_show_progress() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("update-trigger/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings shared by every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Update server root. Command-line `--base-url` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Name of the version descriptor file on the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_file: Option<String>,

    /// Name of the updater binary on the server and in the temp directory.
    ///
    /// Defaults to [`platform::updater_binary_name`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updater_name: Option<String>,

    /// Connect timeout of the HTTP client, in seconds. `0` disables it.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Longest silence allowed while waiting for response headers or the next body
    /// chunk, in seconds. `0` disables it.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether the binary shows a terminal progress bar while downloading.
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            version_file: None,
            updater_name: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            user_agent: default_user_agent(),
            show_progress: default_show_progress(),
        }
    }
}

impl TriggerConfig {
    /// Resolves the default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        platform::default_config_path()
    }

    /// Loads the configuration from the default location.
    ///
    /// A missing file, or a platform without a config directory, yields the defaults.
    pub async fn load() -> Result<Self> {
        match Self::default_path() {
            Ok(path) => Self::load_default(Some(path)).await,
            Err(e) => {
                debug!("No default config location: {e:#}");
                Self::load_default(None).await
            }
        }
    }

    async fn load_default(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) if fs::try_exists(&path).await.unwrap_or(false) => {
                Self::load_from(&path).await
            }
            _ => Ok(Self::default()),
        }
    }

    /// Loads from an explicit path if given, otherwise from the default location.
    ///
    /// Unlike the default location, an explicitly given file must exist.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => {
                if !fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(TriggerError::Config {
                        message: format!("configuration file not found: {}", path.display()),
                    }
                    .into());
                }
                Self::load_from(&path).await
            }
            None => Self::load().await,
        }
    }

    /// Loads and parses a TOML file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// The updater binary name, falling back to the platform default.
    pub fn updater_name(&self) -> &str {
        self.updater_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(platform::updater_binary_name())
    }

    /// The HTTP connect timeout, or `None` when disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    /// The HTTP read timeout, or `None` when disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }
}
