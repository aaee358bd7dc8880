//! Centralized directory and file paths for the fetch service.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/dripfetch/` | `~/.local/share/dripfetch/` |
//! | Config | `~/Library/Application Support/dripfetch/` | `~/.config/dripfetch/` |
//!
//! # Environment Overrides
//!
//! - `DRIPFETCH_DATA_DIR` overrides [`data_dir`]
//! - `DRIPFETCH_CONFIG_DIR` overrides [`config_dir`]

use std::path::{Path, PathBuf};

/// File name of the status document.
pub const STATUS_FILE: &str = "status.json";

/// File name of the user settings document.
pub const SETTINGS_FILE: &str = "settings.json";

/// File name of the last fetched info payload.
pub const INFO_FILE: &str = "info.json";

/// File name of the pending alarm table.
pub const ALARMS_FILE: &str = "alarms.json";

/// Data root directory.
///
/// Holds the status, settings, and info documents plus the alarm table
/// and logs. Override with `DRIPFETCH_DATA_DIR`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DRIPFETCH_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("dripfetch"))
        .unwrap_or_else(|| PathBuf::from("/tmp/dripfetch-data"))
}

/// Config directory, home of `config.toml`. Override with
/// `DRIPFETCH_CONFIG_DIR`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DRIPFETCH_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("dripfetch"))
        .unwrap_or_else(|| PathBuf::from("/tmp/dripfetch-config"))
}

/// Service config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Log file directory under a data root.
#[must_use]
pub fn logs_dir(data_root: &Path) -> PathBuf {
    data_root.join("logs")
}

/// Concrete file locations for one data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub status: PathBuf,
    pub settings: PathBuf,
    pub info: PathBuf,
    pub alarms: PathBuf,
}

impl DataPaths {
    /// Lay out the service files under `root`.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            status: root.join(STATUS_FILE),
            settings: root.join(SETTINGS_FILE),
            info: root.join(INFO_FILE),
            alarms: root.join(ALARMS_FILE),
        }
    }
}
