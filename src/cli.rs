// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::exec::CarriageReturnPolicy;

/// Command-line arguments for `sysmaint`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "sysmaint",
    version,
    about = "Comprehensive system maintenance: package managers, shell frameworks and health checks.",
    long_about = "sysmaint performs comprehensive system maintenance across operating systems.\n\
                  It runs every available package manager update and checks system health.\n\n\
                  Example:\n  sudo sysmaint -v --dry-run\n  sudo sysmaint --zsh-update --pwsh-update"
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `~/.sysmaint.toml`, silently skipped when absent.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) output.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Log every command that would run, without changing the system.
    #[arg(short, long)]
    pub dry_run: bool,

    /// Only perform init-system / health checks, no package management.
    #[arg(short, long)]
    pub init_check: bool,

    /// Update Oh My Zsh, Powerlevel10k and Oh My Posh.
    #[arg(short, long)]
    pub zsh_update: bool,

    /// Update PowerShell.
    #[arg(short, long)]
    pub pwsh_update: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// Overrides `-v` / `-q` and `SYSMAINT_LOG`.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Append logs to this file in addition to the console.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Kill any single command running longer than this (e.g. `30m`, `2h`).
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// How carriage-return progress frames are logged (split, last).
    #[arg(long, value_name = "POLICY")]
    pub carriage_return: Option<CarriageReturnPolicy>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
