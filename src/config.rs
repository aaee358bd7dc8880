//! Service configuration.
//!
//! Loaded from `config.toml`. Every section falls back to defaults, so an
//! empty file (or no file at all) yields a working configuration.

use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the fetch service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Info endpoint settings.
    pub server: ServerConfig,
    /// Alarm cadence and stale-attempt recovery.
    pub schedule: ScheduleConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
}

/// Info endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the companion server.
    pub base_url: String,
    /// Path of the info document, appended to `base_url`.
    pub info_path: String,
    /// Query string appended when the extended payload is requested.
    pub extended_query: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout used by the connectivity probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:29863".to_owned(),
            info_path: "/info.json".to_owned(),
            extended_query: "graph=1".to_owned(),
            request_timeout_secs: 30,
            probe_timeout_ms: 1_500,
        }
    }
}

impl ServerConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Probe connect timeout as a [`Duration`].
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Alarm cadence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Delay before the next wake-up after any cycle, in seconds.
    pub retry_delay_secs: u64,
    /// Age after which an in-flight attempt is considered abandoned, in seconds.
    pub stale_threshold_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: 60,
            stale_threshold_secs: 300,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Data directory override (None = [`crate::app_dirs::data_dir`]).
    pub data_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| FetchError::Config(e.to_string()))
    }

    /// Load configuration from `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FetchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Resolved data directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(crate::app_dirs::data_dir)
    }
}
