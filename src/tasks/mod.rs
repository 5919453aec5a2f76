// src/tasks/mod.rs

//! Maintenance task catalogue.
//!
//! Each family of tasks is a closed enum; the orchestrator resolves the list
//! for the detected platform once and then dispatches with `match`. Tasks
//! issue every command through the [`Executor`], so dry run is honored at the
//! point each command would be spawned.

pub mod conda;
pub mod health;
pub mod package;
pub mod shell;

use crate::errors::{Result, SysmaintError};
use crate::exec::Executor;
use crate::platform::Platform;

pub use health::{HealthCheck, InitSystem};
pub use package::PackageManager;
pub use shell::{PsVersion, ShellComponent};

/// Shared inputs for one task.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub exec: &'a Executor,
    pub platform: &'a Platform,
    /// Desktop user for user-scoped work, when one could be resolved.
    pub user: Option<&'a str>,
    pub conda_channels: &'a [String],
}

impl TaskContext<'_> {
    pub fn require_user(&self, purpose: &str) -> Result<&str> {
        self.user.ok_or_else(|| {
            SysmaintError::Config(format!("no target user available for {purpose}"))
        })
    }
}

/// How a task ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Skipped(String),
}

impl TaskStatus {
    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        TaskStatus::Skipped(reason.into())
    }
}
