// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::errors::{Result, SysmaintError};

/// Where the effective configuration came from. Reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The default location had no file; built-in defaults apply.
    Defaults(PathBuf),
}

/// Load a configuration file from a given path.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Resolve and load the configuration.
///
/// An explicitly requested file must exist; the default `~/.sysmaint.toml` is
/// optional. Parse errors are reported in both cases.
pub fn load_config(explicit: Option<&Path>) -> Result<(ConfigFile, ConfigSource)> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(SysmaintError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let config = load_from_path(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    let path = default_config_path();
    if path.is_file() {
        let config = load_from_path(&path)?;
        Ok((config, ConfigSource::File(path)))
    } else {
        Ok((ConfigFile::default(), ConfigSource::Defaults(path)))
    }
}

/// `~/.sysmaint.toml`, or `./.sysmaint.toml` when no home directory is known.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sysmaint.toml")
}
