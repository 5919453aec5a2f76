// src/config/mod.rs

//! Configuration for sysmaint.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Merge file, environment and CLI into effective [`Settings`] (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;

pub use loader::{ConfigSource, default_config_path, load_config, load_from_path};
pub use model::{ConfigFile, CondaSection, DEFAULT_CONDA_CHANNELS};
pub use settings::{EnvOverrides, Settings, parse_duration};
