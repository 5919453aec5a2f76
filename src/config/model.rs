// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::CarriageReturnPolicy;

/// Channels ensured before `conda update --all`.
pub const DEFAULT_CONDA_CHANNELS: &[&str] = &[
    "defaults",
    "conda-canary",
    "conda-forge",
    "pytorch",
    "nvidia",
    "pypi",
];

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// log_file = "/var/log/system-maintenance.log"
/// user_id = 1000
/// command_timeout = "45m"
/// carriage_return = "last"
/// zsh_update = true
///
/// [conda]
/// channels = ["defaults", "conda-forge"]
/// ```
///
/// Every key is optional; unset values fall back to CLI flags, environment
/// overrides, then platform defaults (see [`crate::config::Settings`]).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Unix uid of the desktop user that user-scoped tasks run as.
    #[serde(default)]
    pub user_id: Option<u32>,

    /// Per-command timeout, e.g. `"90s"` or `"45m"`.
    #[serde(default)]
    pub command_timeout: Option<String>,

    #[serde(default)]
    pub carriage_return: Option<CarriageReturnPolicy>,

    #[serde(default)]
    pub init_check: Option<bool>,

    #[serde(default)]
    pub zsh_update: Option<bool>,

    #[serde(default)]
    pub pwsh_update: Option<bool>,

    #[serde(default)]
    pub conda: CondaSection,
}

/// `[conda]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CondaSection {
    #[serde(default = "default_conda_channels")]
    pub channels: Vec<String>,
}

impl Default for CondaSection {
    fn default() -> Self {
        Self {
            channels: default_conda_channels(),
        }
    }
}

fn default_conda_channels() -> Vec<String> {
    DEFAULT_CONDA_CHANNELS.iter().map(|c| c.to_string()).collect()
}

/// Default log file location for this platform.
#[cfg(not(windows))]
pub fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/system-maintenance.log")
}

/// Default log file location for this platform.
#[cfg(windows)]
pub fn default_log_file() -> PathBuf {
    match std::env::var_os("APPDATA").filter(|v| !v.is_empty()) {
        Some(app_data) => PathBuf::from(app_data)
            .join("system-maintenance")
            .join("logs")
            .join("system-maintenance.log"),
        None => std::env::temp_dir().join("system-maintenance.log"),
    }
}

/// First regular user on most Linux installs. Not applicable on Windows.
pub fn default_user_id() -> Option<u32> {
    if cfg!(windows) { None } else { Some(1000) }
}
