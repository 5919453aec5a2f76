// src/tasks/health.rs

//! System health checks: init system and failed units on Linux, component
//! store and file integrity on Windows.

use std::fmt;
use std::path::Path;

use tracing::{error, info, warn};

use crate::errors::Result;
use crate::exec::{CapturedOutput, Encoding};
use crate::tasks::{TaskContext, TaskStatus};

const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";
const SYSV_RCS: &str = "/etc/init.d/rcS";
const SESSION_ENV_KEYS: &[&str] = &["DBUS_SESSION_BUS_ADDRESS", "XDG_RUNTIME_DIR"];
const FAILED_UNITS_ARGS: &[&str] = &["list-units", "--failed", "--no-pager", "--no-legend"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheck {
    Linux,
    Windows,
}

impl HealthCheck {
    pub fn for_platform(platform: &crate::platform::Platform) -> HealthCheck {
        if platform.is_windows() {
            HealthCheck::Windows
        } else {
            HealthCheck::Linux
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HealthCheck::Linux => "Linux system health",
            HealthCheck::Windows => "Windows system health",
        }
    }

    pub async fn check(self, ctx: &TaskContext<'_>) -> Result<TaskStatus> {
        info!("--- Starting {} checks ---", self.name());
        match self {
            HealthCheck::Linux => check_linux(ctx).await,
            HealthCheck::Windows => check_windows(ctx).await,
        }
    }
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
    Systemd,
    Upstart,
    SysVinit,
    Unknown,
}

impl fmt::Display for InitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InitSystem::Systemd => "systemd",
            InitSystem::Upstart => "Upstart",
            InitSystem::SysVinit => "SysVinit",
            InitSystem::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

async fn detect_init_system(ctx: &TaskContext<'_>) -> InitSystem {
    if Path::new(SYSTEMD_RUNTIME_DIR).is_dir() {
        return InitSystem::Systemd;
    }
    if ctx.exec.command_exists("initctl") {
        match ctx
            .exec
            .capture("Query initctl version", "initctl", ["--version"])
            .await
        {
            Ok(out) if out.stdout.contains("Upstart") => return InitSystem::Upstart,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to check initctl version."),
        }
    }
    if Path::new(SYSV_RCS).exists() {
        return InitSystem::SysVinit;
    }
    InitSystem::Unknown
}

async fn check_linux(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let init = detect_init_system(ctx).await;
    info!("Detected init system: {init}.");

    match init {
        InitSystem::Systemd => {
            check_failed_units_system(ctx).await;
            check_failed_units_user(ctx).await;
        }
        InitSystem::Upstart => {
            info!("Upstart has no 'list failed units'. Check /var/log/syslog or dmesg for service errors.");
        }
        InitSystem::SysVinit => {
            info!("SysVinit has no 'list failed units'. Check /var/log/messages or /var/log/syslog for service errors.");
        }
        InitSystem::Unknown => {
            info!("Could not determine the init system (systemd, Upstart, SysVinit).");
        }
    }

    Ok(TaskStatus::Completed)
}

async fn check_failed_units_system(ctx: &TaskContext<'_>) {
    info!("--- Checking for Failed Systemd Units (System Scope) ---");
    if !ctx.exec.command_exists("systemctl") {
        info!("systemctl not found. Skipping systemd unit checks.");
        return;
    }

    let args = std::iter::once("--system").chain(FAILED_UNITS_ARGS.iter().copied());
    let result = ctx
        .exec
        .capture("List failed system units", "systemctl", args)
        .await;
    report_failed_units("system-scope", result);
}

async fn check_failed_units_user(ctx: &TaskContext<'_>) {
    info!("--- Checking for Failed Systemd Units (User Scope) ---");
    let exec = ctx.exec;
    if !exec.command_exists("systemctl") || !exec.command_exists("dbus-launch") {
        info!("systemctl or dbus-launch not found. Skipping user-scope unit checks.");
        return;
    }
    let user = match ctx.require_user("user-scope unit checks") {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "Cannot check user-scope systemd units.");
            return;
        }
    };

    let env_req = exec
        .request("Read user session environment", "env", std::iter::empty::<&str>())
        .as_user(user);
    let session_env = match exec.run_and_capture(&env_req).await {
        Ok(out) => session_env_entries(&out.stdout),
        Err(e) => {
            warn!(error = %e, "Could not read the session environment for {user}.");
            Vec::new()
        }
    };

    let args = ["systemctl", "--user"]
        .into_iter()
        .chain(FAILED_UNITS_ARGS.iter().copied());
    let req = exec
        .request("List failed user units", "dbus-launch", args)
        .with_env(session_env)
        .as_user(user);
    let result = exec.run_and_capture(&req).await;
    report_failed_units(&format!("user-scope ({user})"), result);
}

/// `KEY=VALUE` entries from `env` output needed to reach the user's bus.
pub fn session_env_entries(env_output: &str) -> Vec<String> {
    env_output
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, value)| SESSION_ENV_KEYS.contains(key) && !value.is_empty())
        .map(|(key, value)| format!("{key}={value}"))
        .collect()
}

fn report_failed_units(scope: &str, result: Result<CapturedOutput>) {
    let out = match result {
        Ok(out) => out,
        Err(e) => {
            error!(error = %e, "Failed to check {scope} systemd units.");
            return;
        }
    };

    let units: Vec<&str> = out.stdout_lines().collect();
    // systemctl exits 1 with no output when nothing matched.
    if units.is_empty() && (out.success() || out.exit_code() == Some(1)) {
        info!("No failed {scope} units found.");
        return;
    }
    if !out.success() {
        error!(
            exit_code = ?out.exit_code(),
            "Failed to check {scope} systemd units. Output: {}",
            out.stderr.trim()
        );
        return;
    }

    info!("Found failed {scope} units:");
    for unit in units {
        info!("{unit}");
    }
}

async fn check_windows(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;

    info!("Checking Windows component store health with DISM...");
    if exec.command_exists("dism") {
        match exec
            .run("Check DISM health", "dism", ["/Online", "/Cleanup-Image", "/RestoreHealth"])
            .await
        {
            Ok(()) => info!("DISM health check complete."),
            Err(e) => error!(error = %e, "DISM could not check or restore the component store."),
        }
    } else {
        info!("DISM not found. Skipping DISM health check.");
    }

    info!("Checking system file integrity with SFC...");
    if exec.command_exists("sfc") {
        let req = exec
            .request("Check SFC integrity", "sfc", ["/scannow"])
            .with_encoding(Encoding::Utf16Le)
            .as_user("SYSTEM");
        match exec.run_and_stream(&req).await {
            Ok(()) => info!("SFC integrity check complete."),
            Err(e) => error!(error = %e, "SFC could not verify system file integrity."),
        }
    } else {
        info!("SFC not found. Skipping SFC integrity check.");
    }

    Ok(TaskStatus::Completed)
}
