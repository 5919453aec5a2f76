// src/orchestrator.rs

//! Run-level state machine.
//!
//! ```text
//! Start -> AcquirePrivilege -> DetectPlatform -> HealthCheck
//!       -> ShellComponentUpdates -> PackageManagerUpdates -> Done
//! ```
//!
//! Every stage after privilege acquisition is best effort: a failing task is
//! logged once and recorded in the [`RunReport`], and the run moves on.
//! `AcquirePrivilege` can end the run early, either with an error or with a
//! [`RelaunchPlan`] the caller must carry out. Cancellation is checked between
//! tasks.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::Result;
use crate::exec::Executor;
use crate::platform::{self, Platform};
use crate::privilege::{PrivilegeGate, PrivilegeOutcome, RelaunchPlan};
use crate::tasks::{HealthCheck, PackageManager, ShellComponent, TaskContext, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    AcquirePrivilege,
    DetectPlatform,
    HealthCheck,
    ShellComponentUpdates,
    PackageManagerUpdates,
    Done,
}

impl Stage {
    fn next(self) -> Stage {
        match self {
            Stage::Start => Stage::AcquirePrivilege,
            Stage::AcquirePrivilege => Stage::DetectPlatform,
            Stage::DetectPlatform => Stage::HealthCheck,
            Stage::HealthCheck => Stage::ShellComponentUpdates,
            Stage::ShellComponentUpdates => Stage::PackageManagerUpdates,
            Stage::PackageManagerUpdates | Stage::Done => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::AcquirePrivilege => "acquire-privilege",
            Stage::DetectPlatform => "detect-platform",
            Stage::HealthCheck => "health-check",
            Stage::ShellComponentUpdates => "shell-components",
            Stage::PackageManagerUpdates => "package-managers",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Which optional parts of the run are enabled.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Health checks only; skip package managers.
    pub init_check_only: bool,
    pub zsh_update: bool,
    pub pwsh_update: bool,
    pub conda_channels: Vec<String>,
    /// Desktop user for user-scoped tasks.
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub stage: Stage,
    pub task: String,
    pub outcome: TaskOutcome,
}

/// Per-task outcomes of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub platform: Option<Platform>,
    pub records: Vec<TaskRecord>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Failed(_)))
    }

    pub fn outcome_of(&self, task: &str) -> Option<&TaskOutcome> {
        self.records
            .iter()
            .find(|r| r.task == task)
            .map(|r| &r.outcome)
    }

    fn log_summary(&self) {
        info!("--- Run summary ---");
        for record in &self.records {
            match &record.outcome {
                TaskOutcome::Succeeded => info!("[{}] {}: ok", record.stage, record.task),
                TaskOutcome::Skipped(reason) => {
                    info!("[{}] {}: skipped ({})", record.stage, record.task, reason)
                }
                TaskOutcome::Failed(cause) => {
                    warn!("[{}] {}: FAILED ({})", record.stage, record.task, cause)
                }
            }
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunReport),
    /// The process must be restarted with elevated rights.
    Relaunch(RelaunchPlan),
    /// Cancelled (Ctrl-C) before all stages finished.
    Interrupted(RunReport),
}

pub struct Orchestrator {
    exec: Executor,
    gate: Arc<dyn PrivilegeGate>,
    options: OrchestratorOptions,
    cancel: CancellationToken,
    preset_platform: Option<Platform>,
}

impl Orchestrator {
    pub fn new(
        exec: Executor,
        gate: Arc<dyn PrivilegeGate>,
        options: OrchestratorOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            exec,
            gate,
            options,
            cancel,
            preset_platform: None,
        }
    }

    /// Skip detection and use `platform`.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.preset_platform = Some(platform);
        self
    }

    /// Drive the state machine to a terminal state.
    ///
    /// Only privilege acquisition can return `Err`.
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut stage = Stage::Start;
        let mut report = RunReport::default();
        let mut platform = Platform::unknown();

        loop {
            if self.cancel.is_cancelled() && stage != Stage::Done {
                warn!("Interrupted during stage '{stage}'.");
                report.log_summary();
                return Ok(RunOutcome::Interrupted(report));
            }

            match stage {
                Stage::Start => {
                    info!("Starting comprehensive system maintenance.");
                }
                Stage::AcquirePrivilege => match self.gate.acquire() {
                    Ok(PrivilegeOutcome::Elevated) => {}
                    Ok(PrivilegeOutcome::Relaunch(plan)) => {
                        return Ok(RunOutcome::Relaunch(plan));
                    }
                    Err(e) => {
                        error!(error = %e, "Unable to acquire administrative privileges.");
                        return Err(e);
                    }
                },
                Stage::DetectPlatform => {
                    platform = match &self.preset_platform {
                        Some(p) => p.clone(),
                        None => platform::detect(&self.exec).await,
                    };
                    info!("Detected platform: {platform}");
                    report.platform = Some(platform.clone());
                }
                Stage::HealthCheck => {
                    let check = HealthCheck::for_platform(&platform);
                    let ctx = self.context(&platform);
                    let result = check.check(&ctx).await;
                    record(&mut report, stage, check.name(), result);
                }
                Stage::ShellComponentUpdates => {
                    for component in self.shell_components(&platform) {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        let ctx = self.context(&platform);
                        let result = component.update(&ctx).await;
                        record(&mut report, stage, component.name(), result);
                    }
                }
                Stage::PackageManagerUpdates => {
                    if self.options.init_check_only {
                        info!("Skipping package management updates due to '--init-check'.");
                    } else {
                        info!("--- Starting Core Package Manager Updates ---");
                        for manager in PackageManager::for_platform(&platform) {
                            if self.cancel.is_cancelled() {
                                break;
                            }
                            let ctx = self.context(&platform);
                            let result = manager.update(&ctx).await;
                            record(&mut report, stage, manager.name(), result);
                        }
                        info!("--- Core Package Manager Updates Complete ---");
                    }
                }
                Stage::Done => {
                    info!("Comprehensive system maintenance complete.");
                    report.log_summary();
                    if self.exec.dry_run() {
                        info!("Remember: this was a DRY RUN. No changes were applied.");
                    }
                    return Ok(RunOutcome::Completed(report));
                }
            }

            stage = stage.next();
        }
    }

    fn context<'a>(&'a self, platform: &'a Platform) -> TaskContext<'a> {
        TaskContext {
            exec: &self.exec,
            platform,
            user: self.options.user.as_deref(),
            conda_channels: &self.options.conda_channels,
        }
    }

    fn shell_components(&self, platform: &Platform) -> Vec<ShellComponent> {
        let mut components = Vec::new();

        if !self.options.zsh_update {
            info!("Skipping Zsh update. Use '-z' to enable.");
        } else if platform.is_windows() {
            warn!("Zsh update is not available on Windows. Skipping.");
        } else {
            components.push(ShellComponent::Zsh);
        }

        if self.options.pwsh_update {
            components.push(ShellComponent::PowerShell);
        } else {
            info!("Skipping PowerShell update. Use '-p' to enable.");
        }

        components
    }
}

/// Log a task result once and add it to the report.
fn record(report: &mut RunReport, stage: Stage, task: &str, result: Result<TaskStatus>) {
    let outcome = match result {
        Ok(TaskStatus::Completed) => TaskOutcome::Succeeded,
        Ok(TaskStatus::Skipped(reason)) => {
            info!("{task}: skipped ({reason}).");
            TaskOutcome::Skipped(reason)
        }
        Err(e) => {
            error!(stage = %stage, error = %e, "{task} failed.");
            TaskOutcome::Failed(e.to_string())
        }
    };
    report.records.push(TaskRecord {
        stage,
        task: task.to_string(),
        outcome,
    });
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("exec", &self.exec)
            .field("options", &self.options)
            .field("preset_platform", &self.preset_platform)
            .finish_non_exhaustive()
    }
}
