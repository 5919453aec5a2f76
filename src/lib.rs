// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod privilege;
pub mod tasks;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigSource, EnvOverrides, Settings, load_config};
use crate::errors::Result;
use crate::exec::{Executor, Runner, TracingSink};
use crate::logging::LoggingOptions;
use crate::orchestrator::{Orchestrator, OrchestratorOptions, RunOutcome};
use crate::privilege::{PrivilegeGate, SystemPrivilege};

/// How a run ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Completed,
    Interrupted,
}

impl RunExit {
    pub fn code(self) -> i32 {
        match self {
            RunExit::Completed => 0,
            RunExit::Interrupted => 130,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and logging
/// - the command runner and executor facade
/// - privilege handling
/// - the orchestrator
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunExit> {
    let (file, source) = load_config(args.config.as_deref())?;
    let settings = Settings::resolve(&args, file, &EnvOverrides::from_env())?;

    logging::init_logging(&LoggingOptions {
        cli_level: args.log_level,
        verbose: args.verbose,
        quiet: args.quiet,
        log_file: Some(settings.log_file.clone()),
    })?;
    match &source {
        ConfigSource::File(path) => debug!("Using config file: {}", path.display()),
        ConfigSource::Defaults(path) => {
            debug!("No config file at {}, using defaults.", path.display())
        }
    }
    info!("Log file: {}", settings.log_file.display());

    // Ctrl-C → cancel the running command and stop issuing new ones.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Interrupt received; stopping after the current command.");
            cancel.cancel();
        });
    }

    let runner = Runner::new(Arc::new(TracingSink))
        .with_timeout(settings.command_timeout)
        .with_carriage_return_policy(settings.carriage_return)
        .with_cancellation(cancel.clone());
    let exec = Executor::new(Arc::new(runner), settings.dry_run);

    let user = match privilege::target_user(settings.user_id) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "No target user; user-scoped tasks will fail.");
            None
        }
    };

    let options = OrchestratorOptions {
        init_check_only: settings.init_check,
        zsh_update: settings.zsh_update,
        pwsh_update: settings.pwsh_update,
        conda_channels: settings.conda_channels.clone(),
        user,
    };
    let gate: Arc<dyn PrivilegeGate> = Arc::new(SystemPrivilege);
    let orchestrator = Orchestrator::new(exec, gate.clone(), options, cancel);

    match orchestrator.run().await? {
        RunOutcome::Completed(report) => {
            let failed = report.failures().count();
            if failed > 0 {
                warn!("{failed} task(s) failed; see the log for details.");
            }
            Ok(RunExit::Completed)
        }
        RunOutcome::Interrupted(_) => Ok(RunExit::Interrupted),
        RunOutcome::Relaunch(plan) => match gate.relaunch(&plan)? {},
    }
}
