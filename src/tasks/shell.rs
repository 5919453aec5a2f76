// src/tasks/shell.rs

//! Opt-in shell framework updates: Oh My Zsh (+ Powerlevel10k, Oh My Posh)
//! and PowerShell itself.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::errors::{Result, SysmaintError};
use crate::exec::Executor;
use crate::platform::PrimaryPackageManager;
use crate::tasks::{TaskContext, TaskStatus};

const PS_VERSION_QUERY: &str =
    "$PSVersionTable.PSVersion.Major;$PSVersionTable.PSVersion.Minor;$PSVersionTable.PSVersion.Patch";

/// Execution policies that allow package-manager scripts to run.
const SUITABLE_POLICIES: &[&str] = &["RemoteSigned", "Unrestricted", "Bypass"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellComponent {
    Zsh,
    PowerShell,
}

impl ShellComponent {
    pub fn name(self) -> &'static str {
        match self {
            ShellComponent::Zsh => "Zsh (Oh My Zsh & Powerlevel10k)",
            ShellComponent::PowerShell => "PowerShell",
        }
    }

    pub async fn update(self, ctx: &TaskContext<'_>) -> Result<TaskStatus> {
        info!("--- {} Update ---", self.name());
        match self {
            ShellComponent::Zsh => update_zsh(ctx).await,
            ShellComponent::PowerShell if ctx.platform.is_windows() => {
                update_pwsh_windows(ctx).await
            }
            ShellComponent::PowerShell => update_pwsh_unix(ctx).await,
        }
    }
}

impl fmt::Display for ShellComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

async fn update_zsh(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    let user = ctx.require_user("Zsh component updates")?;

    let req = exec
        .request("Resolve user home directory", "printenv", ["HOME"])
        .as_user(user);
    let home = exec
        .run_and_capture(&req)
        .await?
        .ensure_success("Resolve user home directory")?;
    let home = home.stdout.trim();
    // Empty under dry run; fall back to the conventional location.
    let home = if home.is_empty() {
        PathBuf::from("/home").join(user)
    } else {
        PathBuf::from(home)
    };

    let oh_my_zsh = home.join(".oh-my-zsh");
    let powerlevel10k = oh_my_zsh.join("custom").join("themes").join("powerlevel10k");
    info!("Checking Zsh components for user {} in {}", user, home.display());

    if !exec.command_exists("git") {
        return Err(SysmaintError::InvalidRequest(
            "'git' is required for Zsh component updates".to_string(),
        ));
    }

    if let Err(e) = exec
        .run_as(user, "Update Oh My Zsh", "zsh", ["-i", "-c", "omz update --unattended"])
        .await
    {
        warn!(error = %e, "'omz update' failed. Attempting 'git pull'.");
        let path = oh_my_zsh.display().to_string();
        exec.run_as(
            user,
            "Update Oh My Zsh (git pull)",
            "git",
            ["-C", path.as_str(), "pull"],
        )
        .await?;
    }

    if powerlevel10k.is_dir() {
        let path = powerlevel10k.display().to_string();
        exec.run_as(user, "Update Powerlevel10k", "git", ["-C", path.as_str(), "pull"])
            .await?;
    } else {
        debug!("Powerlevel10k not found at {}.", powerlevel10k.display());
    }

    upgrade_oh_my_posh(exec).await?;
    Ok(TaskStatus::Completed)
}

async fn update_pwsh_unix(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("pwsh") {
        info!("PowerShell (pwsh) is not installed. Skipping update.");
        return Ok(TaskStatus::skipped("'pwsh' not found"));
    }

    let (description, program, args): (&str, &str, &[&str]) = match ctx.platform.primary {
        PrimaryPackageManager::Apt => (
            "Update PowerShell (APT)",
            "apt",
            &["install", "--only-upgrade", "powershell", "-y"][..],
        ),
        PrimaryPackageManager::Dnf => ("Update PowerShell (DNF)", "dnf", &["upgrade", "powershell", "-y"][..]),
        PrimaryPackageManager::Pacman => (
            "Update PowerShell (Pacman)",
            "pacman",
            &["-S", "powershell", "--noconfirm"][..],
        ),
        PrimaryPackageManager::Zypper => (
            "Update PowerShell (Zypper)",
            "zypper",
            &["update", "powershell", "-y"][..],
        ),
        _ => {
            info!("No supported package manager to update PowerShell automatically.");
            info!("Consider downloading the latest package from https://github.com/PowerShell/PowerShell/releases");
            upgrade_oh_my_posh(exec).await?;
            return Ok(TaskStatus::skipped("no package manager for PowerShell"));
        }
    };
    exec.run(description, program, args.iter().copied()).await?;

    upgrade_oh_my_posh(exec).await?;
    Ok(TaskStatus::Completed)
}

async fn update_pwsh_windows(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    let Some(ps) = detect_powershell(exec).await else {
        info!("No PowerShell found. Install PowerShell 7 from https://aka.ms/powershell-release?tag=stable");
        return Ok(TaskStatus::skipped("no PowerShell executable"));
    };
    info!(
        "Detected PowerShell executable: {} (version {}).",
        ps.executable,
        ps.version.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string())
    );

    if exec.command_exists("winget") {
        exec.run(
            "Update PowerShell (Winget)",
            "winget",
            [
                "upgrade",
                "Microsoft.PowerShell",
                "--silent",
                "--accept-package-agreements",
                "--accept-source-agreements",
            ],
        )
        .await?;
    } else if exec.command_exists("choco") {
        exec.run("Update PowerShell (Chocolatey)", "choco", ["upgrade", "powershell-core", "-y"])
            .await?;
    } else {
        exec.run(
            "Update PowerShell (Scoop)",
            &ps.executable,
            ["-NoProfile", "-Command", "scoop update pwsh"],
        )
        .await?;
    }

    Ok(TaskStatus::Completed)
}

async fn upgrade_oh_my_posh(exec: &Executor) -> Result<()> {
    if exec.command_exists("oh-my-posh") {
        exec.run("Upgrade Oh My Posh CLI", "oh-my-posh", ["upgrade", "--force"])
            .await?;
    } else {
        debug!("Oh My Posh CLI not found. Skipping.");
    }
    Ok(())
}

/// PowerShell version as printed by `$PSVersionTable` (one number per line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PsVersion {
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl FromStr for PsVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if parts.len() < 2 {
            return Err(format!("unexpected PowerShell version output: {}", s.trim()));
        }
        let major = parts[0]
            .parse()
            .map_err(|e| format!("invalid major version '{}': {e}", parts[0]))?;
        let minor = parts[1]
            .parse()
            .map_err(|e| format!("invalid minor version '{}': {e}", parts[1]))?;
        let patch = parts.get(2).and_then(|p| p.parse().ok()).unwrap_or(0);
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for PsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerShell {
    pub executable: String,
    pub version: Option<PsVersion>,
}

async fn query_ps_version(exec: &Executor, program: &str) -> Option<PsVersion> {
    let out = exec
        .capture("Query PowerShell version", program, ["-NoProfile", "-Command", PS_VERSION_QUERY])
        .await
        .ok()?;
    match out.stdout.parse::<PsVersion>() {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(program, error = %e, "could not parse PowerShell version");
            None
        }
    }
}

/// Prefer PowerShell 7+ (`pwsh`), fall back to Windows PowerShell.
pub async fn detect_powershell(exec: &Executor) -> Option<PowerShell> {
    let has_pwsh = exec.command_exists("pwsh");
    let mut pwsh_version = None;
    if has_pwsh {
        pwsh_version = query_ps_version(exec, "pwsh").await;
        if let Some(v) = pwsh_version.filter(|v| v.is_at_least(7, 0)) {
            return Some(PowerShell {
                executable: "pwsh".to_string(),
                version: Some(v),
            });
        }
        debug!("pwsh found but not v7+ or version check failed.");
    }

    if exec.command_exists("powershell") {
        return Some(PowerShell {
            executable: "powershell".to_string(),
            version: query_ps_version(exec, "powershell").await,
        });
    }

    has_pwsh.then(|| PowerShell {
        executable: "pwsh".to_string(),
        version: pwsh_version,
    })
}

/// Make sure the CurrentUser execution policy lets package-manager scripts
/// run, switching it to `RemoteSigned` if needed.
pub async fn ensure_execution_policy(exec: &Executor, ps: &str) -> Result<()> {
    let current = exec
        .capture(
            "Get PowerShell execution policy",
            ps,
            [
                "-NoProfile",
                "-Command",
                "Get-ExecutionPolicy -Scope CurrentUser -ErrorAction SilentlyContinue | Out-String -Stream",
            ],
        )
        .await?
        .ensure_success("Get PowerShell execution policy")?;
    let policy = current.stdout.trim();

    if SUITABLE_POLICIES.iter().any(|p| p.eq_ignore_ascii_case(policy)) {
        debug!("CurrentUser execution policy '{policy}' is suitable.");
        return Ok(());
    }

    warn!("CurrentUser execution policy is '{policy}'. Setting it to 'RemoteSigned'.");
    exec.run(
        "Set PowerShell execution policy",
        ps,
        [
            "-NoProfile",
            "-Command",
            "Set-ExecutionPolicy RemoteSigned -Scope CurrentUser -Force -ErrorAction Stop",
        ],
    )
    .await
}
