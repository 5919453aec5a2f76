// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only [`SysmaintError::Privilege`] and configuration errors are fatal to a
//! whole run; everything else is local to one invocation or task and is
//! logged by the orchestrator before it moves on.

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SysmaintError {
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid command request: {0}")]
    InvalidRequest(String),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{description}' exited unsuccessfully ({status})")]
    Exit {
        description: String,
        status: ExitStatus,
    },

    #[error("error streaming output of '{description}': {source}")]
    Stream {
        description: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' was cancelled")]
    Cancelled(String),

    #[error("'{description}' timed out after {after:?}")]
    TimedOut {
        description: String,
        after: Duration,
    },

    #[error("privilege acquisition failed: {0}")]
    Privilege(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SysmaintError {
    /// Exit code of the failed process, when the failure was a non-zero exit.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SysmaintError::Exit { status, .. } => status.code(),
            _ => None,
        }
    }

    /// Whether the error came from a cancellation request rather than the
    /// command itself.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SysmaintError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, SysmaintError>;
