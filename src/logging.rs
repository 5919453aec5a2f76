// src/logging.rs

//! Logging setup for `sysmaint` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `-v` (debug) or `-q` (error)
//! 3. `SYSMAINT_LOG` environment variable (e.g. "info", "debug")
//! 4. default to `info`
//!
//! Logs go to stderr and, when a log file can be opened, are appended to it
//! as well. Debug and trace levels add source file and line.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tracing::{debug, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const ENV_LOG_LEVEL: &str = "SYSMAINT_LOG";

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    pub cli_level: Option<LogLevel>,
    pub verbose: bool,
    pub quiet: bool,
    pub log_file: Option<PathBuf>,
}

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup. Returns the log file actually in use.
pub fn init_logging(opts: &LoggingOptions) -> Result<Option<PathBuf>> {
    let env_level = std::env::var(ENV_LOG_LEVEL).ok();
    let level = resolve_level(opts.cli_level, opts.verbose, opts.quiet, env_level.as_deref());
    let detailed = level >= tracing::Level::DEBUG;

    let (file, file_error) = match opts.log_file.as_deref() {
        Some(path) => match open_log_file(path) {
            Ok(file) => (Some((path.to_path_buf(), file)), None),
            Err(e) => (None, Some((path.to_path_buf(), e))),
        },
        None => (None, None),
    };

    let console = fmt::layer()
        .with_target(detailed)
        .with_file(detailed)
        .with_line_number(detailed)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let (active_file, file_layer) = match file {
        Some((path, file)) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_file(detailed)
                .with_line_number(detailed)
                .with_writer(Mutex::new(file));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install logging subscriber: {e}"))?;

    if let Some((path, e)) = file_error {
        warn!(
            "Could not open log file {}: {}. Logging to console only.",
            path.display(),
            e
        );
    }
    debug!(?level, log_file = ?active_file, "logging initialised");

    Ok(active_file)
}

/// Pick the effective level from CLI flags and the environment.
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    verbose: bool,
    quiet: bool,
    env_level: Option<&str>,
) -> tracing::Level {
    if let Some(lvl) = cli_level {
        return level_from_log_level(lvl);
    }
    if verbose {
        return tracing::Level::DEBUG;
    }
    if quiet {
        return tracing::Level::ERROR;
    }
    env_level
        .and_then(parse_level_str)
        .unwrap_or(tracing::Level::INFO)
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn cli_level_wins_over_everything() {
        let lvl = resolve_level(Some(LogLevel::Warn), true, false, Some("trace"));
        assert_eq!(lvl, Level::WARN);
    }

    #[test]
    fn verbose_and_quiet_map_to_debug_and_error() {
        assert_eq!(resolve_level(None, true, false, Some("warn")), Level::DEBUG);
        assert_eq!(resolve_level(None, false, true, Some("warn")), Level::ERROR);
    }

    #[test]
    fn env_then_default() {
        assert_eq!(resolve_level(None, false, false, Some("Warning")), Level::WARN);
        assert_eq!(resolve_level(None, false, false, Some("bogus")), Level::INFO);
        assert_eq!(resolve_level(None, false, false, None), Level::INFO);
    }
}
