// tests/orchestrator_fake_backend.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use sysmaint::errors::{Result, SysmaintError};
use sysmaint::exec::{CapturedOutput, Executor};
use sysmaint::orchestrator::{Orchestrator, OrchestratorOptions, RunOutcome, RunReport, TaskOutcome};
use sysmaint::platform::Platform;
use sysmaint::privilege::{PrivilegeGate, PrivilegeOutcome, RelaunchPlan};
use sysmaint_test_utils::{AlwaysElevated, FakeBackend};

fn orchestrator(backend: &FakeBackend, dry_run: bool, options: OrchestratorOptions) -> Orchestrator {
    Orchestrator::new(
        Executor::new(Arc::new(backend.clone()), dry_run),
        Arc::new(AlwaysElevated),
        options,
        CancellationToken::new(),
    )
    .with_platform(Platform::classify("ubuntu", "debian"))
}

async fn completed(orch: &Orchestrator) -> RunReport {
    match with_timeout(orch.run()).await {
        Ok(RunOutcome::Completed(report)) => report,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

fn position(descriptions: &[String], wanted: &str) -> usize {
    descriptions
        .iter()
        .position(|d| d == wanted)
        .unwrap_or_else(|| panic!("'{wanted}' not issued; got {descriptions:?}"))
}

#[tokio::test]
async fn failing_manager_does_not_stop_the_next_one() {
    init_tracing();
    let backend = FakeBackend::new()
        .with_programs(["apt", "snap"])
        .failing("Update APT package lists");

    let report = completed(&orchestrator(&backend, false, OrchestratorOptions::default())).await;

    assert!(matches!(report.outcome_of("APT"), Some(TaskOutcome::Failed(_))));
    assert_eq!(report.outcome_of("Snap"), Some(&TaskOutcome::Succeeded));
    assert!(matches!(report.outcome_of("Flatpak"), Some(TaskOutcome::Skipped(_))));
    assert_eq!(report.failures().count(), 1);

    let descriptions = backend.descriptions();
    assert!(descriptions.contains(&"Update Snap packages".to_string()));
    assert!(!descriptions.contains(&"Perform full APT system upgrade".to_string()));
}

#[tokio::test]
async fn apt_steps_run_in_order_and_noninteractively() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt"]);

    let report = completed(&orchestrator(&backend, false, OrchestratorOptions::default())).await;
    assert_eq!(report.outcome_of("APT"), Some(&TaskOutcome::Succeeded));

    let descriptions = backend.descriptions();
    let update = position(&descriptions, "Update APT package lists");
    let upgrade = position(&descriptions, "Perform full APT system upgrade");
    let autoremove = position(&descriptions, "Remove unnecessary APT packages");
    let clean = position(&descriptions, "Clean up APT cache");
    assert!(update < upgrade && upgrade < autoremove && autoremove < clean);

    for req in backend.requests().iter().filter(|r| r.program == "apt") {
        assert_eq!(req.env, vec!["DEBIAN_FRONTEND=noninteractive".to_string()]);
    }
}

#[tokio::test]
async fn init_check_only_skips_package_managers() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt", "snap", "flatpak"]);
    let options = OrchestratorOptions {
        init_check_only: true,
        ..Default::default()
    };

    let report = completed(&orchestrator(&backend, false, options)).await;

    assert!(report.outcome_of("APT").is_none());
    assert!(report.outcome_of("Linux system health").is_some());
    assert!(backend.requests().iter().all(|r| r.program != "apt"));
}

#[tokio::test]
async fn dry_run_flag_reaches_every_request() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt", "snap", "flatpak", "pwsh"]);
    let options = OrchestratorOptions {
        pwsh_update: true,
        ..Default::default()
    };

    completed(&orchestrator(&backend, true, options)).await;

    let requests = backend.requests();
    assert!(!requests.is_empty());
    assert!(requests.iter().all(|r| r.dry_run), "{requests:?}");
}

#[tokio::test]
async fn powershell_update_runs_before_package_managers() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt", "pwsh"]);
    let options = OrchestratorOptions {
        pwsh_update: true,
        ..Default::default()
    };

    let report = completed(&orchestrator(&backend, false, options)).await;
    assert_eq!(report.outcome_of("PowerShell"), Some(&TaskOutcome::Succeeded));

    let descriptions = backend.descriptions();
    assert!(
        position(&descriptions, "Update PowerShell (APT)")
            < position(&descriptions, "Update APT package lists")
    );
}

#[tokio::test]
async fn zsh_update_without_user_fails_only_that_task() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt", "git"]);
    let options = OrchestratorOptions {
        zsh_update: true,
        user: None,
        ..Default::default()
    };

    let report = completed(&orchestrator(&backend, false, options)).await;
    assert!(matches!(
        report.outcome_of("Zsh (Oh My Zsh & Powerlevel10k)"),
        Some(TaskOutcome::Failed(_))
    ));
    assert_eq!(report.outcome_of("APT"), Some(&TaskOutcome::Succeeded));
}

#[tokio::test]
async fn conda_adds_only_missing_channels_as_the_user() {
    init_tracing();
    let listing = CapturedOutput {
        status: None,
        stdout: "--add channels 'conda-forge'\n--add channels 'defaults'   # highest priority\n"
            .to_string(),
        stderr: String::new(),
    };
    let backend = FakeBackend::new()
        .with_programs(["conda"])
        .with_capture("Get existing conda channels", listing);
    let options = OrchestratorOptions {
        conda_channels: vec![
            "defaults".to_string(),
            "conda-forge".to_string(),
            "pytorch".to_string(),
        ],
        user: Some("alice".to_string()),
        ..Default::default()
    };

    let report = completed(&orchestrator(&backend, false, options)).await;
    assert_eq!(report.outcome_of("Conda"), Some(&TaskOutcome::Succeeded));

    let descriptions = backend.descriptions();
    assert!(descriptions.contains(&"Add pytorch channel".to_string()));
    assert!(!descriptions.contains(&"Add defaults channel".to_string()));
    assert!(!descriptions.contains(&"Add conda-forge channel".to_string()));

    for req in backend.requests().iter().filter(|r| r.program == "conda") {
        assert_eq!(req.user.as_deref(), Some("alice"), "{}", req.description);
    }
}

#[tokio::test]
async fn cancelled_run_is_interrupted_before_any_command() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt"]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let orch = Orchestrator::new(
        Executor::new(Arc::new(backend.clone()), false),
        Arc::new(AlwaysElevated),
        OrchestratorOptions::default(),
        cancel,
    )
    .with_platform(Platform::classify("ubuntu", "debian"));

    match with_timeout(orch.run()).await {
        Ok(RunOutcome::Interrupted(report)) => assert!(report.records.is_empty()),
        other => panic!("expected interruption, got {other:?}"),
    }
    assert!(backend.requests().is_empty());
}

struct NeedsRelaunch;

impl PrivilegeGate for NeedsRelaunch {
    fn acquire(&self) -> Result<PrivilegeOutcome> {
        Ok(PrivilegeOutcome::Relaunch(RelaunchPlan {
            helpers: vec![PathBuf::from("/usr/bin/sudo")],
            executable: PathBuf::from("/usr/local/bin/sysmaint"),
            args: vec!["--dry-run".to_string()],
        }))
    }

    fn relaunch(&self, _plan: &RelaunchPlan) -> Result<Infallible> {
        Err(SysmaintError::Privilege("not in tests".to_string()))
    }
}

struct NoElevation;

impl PrivilegeGate for NoElevation {
    fn acquire(&self) -> Result<PrivilegeOutcome> {
        Err(SysmaintError::Privilege("no sudo or doas available".to_string()))
    }

    fn relaunch(&self, _plan: &RelaunchPlan) -> Result<Infallible> {
        Err(SysmaintError::Privilege("not in tests".to_string()))
    }
}

#[tokio::test]
async fn unprivileged_run_asks_for_relaunch_without_running_tasks() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt"]);
    let orch = Orchestrator::new(
        Executor::new(Arc::new(backend.clone()), false),
        Arc::new(NeedsRelaunch),
        OrchestratorOptions::default(),
        CancellationToken::new(),
    );

    match with_timeout(orch.run()).await {
        Ok(RunOutcome::Relaunch(plan)) => {
            assert_eq!(plan.helpers, vec![PathBuf::from("/usr/bin/sudo")]);
            assert_eq!(plan.args, vec!["--dry-run".to_string()]);
        }
        other => panic!("expected a relaunch plan, got {other:?}"),
    }
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn privilege_failure_aborts_the_run() {
    init_tracing();
    let backend = FakeBackend::new().with_programs(["apt"]);
    let orch = Orchestrator::new(
        Executor::new(Arc::new(backend.clone()), false),
        Arc::new(NoElevation),
        OrchestratorOptions::default(),
        CancellationToken::new(),
    );

    let err = with_timeout(orch.run()).await.unwrap_err();
    assert!(matches!(err, SysmaintError::Privilege(_)));
    assert!(backend.requests().is_empty());
}
