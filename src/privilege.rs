// src/privilege.rs

//! Privilege acquisition.
//!
//! Acquiring privilege either confirms we already have it or produces a
//! [`RelaunchPlan`]. Carrying out the plan replaces (unix) or ends (Windows)
//! the current process, so [`PrivilegeGate::relaunch`] only ever returns an
//! error.

use std::convert::Infallible;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::errors::{Result, SysmaintError};

/// Result of checking the current privilege level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeOutcome {
    /// Already root / administrator.
    Elevated,
    /// Must restart the program through an elevation helper.
    Relaunch(RelaunchPlan),
}

/// Everything needed to restart this program with elevated rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchPlan {
    /// Elevation helpers to try, in order (`sudo`, `doas`, or `powershell`).
    pub helpers: Vec<PathBuf>,
    pub executable: PathBuf,
    pub args: Vec<String>,
}

/// Seam between the orchestrator and the host's elevation mechanics.
pub trait PrivilegeGate: Send + Sync {
    fn acquire(&self) -> Result<PrivilegeOutcome>;

    /// Restart through the plan's helpers. Does not return on success.
    fn relaunch(&self, plan: &RelaunchPlan) -> Result<Infallible>;
}

/// Real privilege handling for the current OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPrivilege;

impl SystemPrivilege {
    fn plan(helpers: Vec<PathBuf>) -> Result<RelaunchPlan> {
        let executable = std::env::current_exe().map_err(|e| {
            SysmaintError::Privilege(format!("failed to get executable path: {e}"))
        })?;
        Ok(RelaunchPlan {
            helpers,
            executable,
            args: std::env::args().skip(1).collect(),
        })
    }
}

#[cfg(unix)]
impl PrivilegeGate for SystemPrivilege {
    fn acquire(&self) -> Result<PrivilegeOutcome> {
        if sudo::check() == sudo::RunningAs::Root {
            info!("Already running as root.");
            return Ok(PrivilegeOutcome::Elevated);
        }

        info!("Not running as root. Attempting to re-run with elevated privileges...");
        let helpers: Vec<PathBuf> = ["sudo", "doas"]
            .iter()
            .filter_map(|helper| which::which(helper).ok())
            .collect();
        if helpers.is_empty() {
            return Err(SysmaintError::Privilege(
                "neither 'sudo' nor 'doas' found; please run this program as root".to_string(),
            ));
        }
        Ok(PrivilegeOutcome::Relaunch(Self::plan(helpers)?))
    }

    fn relaunch(&self, plan: &RelaunchPlan) -> Result<Infallible> {
        use std::os::unix::process::CommandExt;

        for helper in &plan.helpers {
            info!("Using {} to elevate privileges.", helper.display());
            // exec only returns on failure
            let err = std::process::Command::new(helper)
                .arg(&plan.executable)
                .args(&plan.args)
                .exec();
            warn!("Failed to re-run with {}: {}", helper.display(), err);
        }

        Err(SysmaintError::Privilege(
            "failed to acquire root privileges; ensure sudo or doas is configured, or run as root"
                .to_string(),
        ))
    }
}

#[cfg(windows)]
impl PrivilegeGate for SystemPrivilege {
    fn acquire(&self) -> Result<PrivilegeOutcome> {
        use std::process::{Command, Stdio};

        // `net session` only succeeds for administrators.
        let admin = Command::new("net")
            .arg("session")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .map_err(|e| {
                SysmaintError::Privilege(format!("failed to determine administrator status: {e}"))
            })?;

        if admin {
            info!("Already running with administrator privileges.");
            return Ok(PrivilegeOutcome::Elevated);
        }

        info!("Not running with administrator privileges. Attempting to re-run as administrator...");
        let helper = which::which("powershell")
            .or_else(|_| which::which("pwsh"))
            .map_err(|e| SysmaintError::Privilege(format!("no PowerShell to elevate with: {e}")))?;
        Ok(PrivilegeOutcome::Relaunch(Self::plan(vec![helper])?))
    }

    fn relaunch(&self, plan: &RelaunchPlan) -> Result<Infallible> {
        let Some(helper) = plan.helpers.first() else {
            return Err(SysmaintError::Privilege("no elevation helper available".to_string()));
        };

        let quoted: Vec<String> = plan
            .args
            .iter()
            .map(|a| format!("'{}'", a.replace('\'', "''")))
            .collect();
        let mut script = format!(
            "Start-Process -FilePath '{}' -Verb RunAs",
            plan.executable.display().to_string().replace('\'', "''")
        );
        if !quoted.is_empty() {
            script.push_str(&format!(" -ArgumentList {}", quoted.join(",")));
        }

        let status = std::process::Command::new(helper)
            .args(["-NoProfile", "-Command", &script])
            .status()
            .map_err(|e| SysmaintError::Privilege(format!("failed to re-run as administrator: {e}")))?;
        if !status.success() {
            return Err(SysmaintError::Privilege(format!(
                "elevated relaunch was refused ({status})"
            )));
        }

        std::process::exit(0)
    }
}

/// Resolve the user that user-scoped tasks (Oh My Zsh, conda, user systemd
/// units) run as.
#[cfg(unix)]
pub fn target_user(user_id: Option<u32>) -> Result<String> {
    use nix::unistd::{Uid, User};

    let uid = user_id.ok_or_else(|| {
        SysmaintError::Config("no target user id configured for user-scoped tasks".to_string())
    })?;
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => Ok(user.name),
        Ok(None) => Err(SysmaintError::Config(format!("no user found for id {uid}"))),
        Err(e) => Err(SysmaintError::Config(format!(
            "failed to look up user id {uid}: {e}"
        ))),
    }
}

/// Resolve the user that user-scoped tasks run as. On Windows this is always
/// the current user.
#[cfg(windows)]
pub fn target_user(_user_id: Option<u32>) -> Result<String> {
    std::env::var("USERNAME")
        .map_err(|e| SysmaintError::Config(format!("failed to get current user: {e}")))
}
