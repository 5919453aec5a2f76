// src/tasks/package.rs

//! System package managers.

use std::fmt;

use tracing::{info, warn};

use crate::errors::Result;
use crate::platform::{Platform, PrimaryPackageManager};
use crate::tasks::{TaskContext, TaskStatus, conda};

const APT_ENV: &[&str] = &["DEBIAN_FRONTEND=noninteractive"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Pacman,
    Zypper,
    Bsd,
    Snap,
    Flatpak,
    Winget,
    Chocolatey,
    Scoop,
    Conda,
}

impl PackageManager {
    /// Managers attempted on `platform`, in execution order.
    pub fn for_platform(platform: &Platform) -> Vec<PackageManager> {
        use PackageManager::*;

        if platform.is_windows() {
            return vec![Winget, Chocolatey, Scoop, Conda];
        }

        let mut managers = match platform.primary {
            PrimaryPackageManager::Apt => vec![Apt],
            PrimaryPackageManager::Dnf => vec![Dnf],
            PrimaryPackageManager::Pacman => vec![Pacman],
            PrimaryPackageManager::Zypper => vec![Zypper],
            PrimaryPackageManager::Pkg
            | PrimaryPackageManager::PkgAdd
            | PrimaryPackageManager::GenericBsdPkg => vec![Bsd],
            _ => {
                info!("Primary package manager not definitively detected. Attempting common package managers.");
                vec![Apt, Dnf, Pacman, Zypper, Bsd]
            }
        };
        // cross-distro, always attempted
        managers.extend([Snap, Flatpak, Conda]);
        managers
    }

    pub fn name(self) -> &'static str {
        match self {
            PackageManager::Apt => "APT",
            PackageManager::Dnf => "DNF",
            PackageManager::Pacman => "Pacman",
            PackageManager::Zypper => "Zypper",
            PackageManager::Bsd => "BSD pkg",
            PackageManager::Snap => "Snap",
            PackageManager::Flatpak => "Flatpak",
            PackageManager::Winget => "WinGet",
            PackageManager::Chocolatey => "Chocolatey",
            PackageManager::Scoop => "Scoop",
            PackageManager::Conda => "Conda",
        }
    }

    pub async fn update(self, ctx: &TaskContext<'_>) -> Result<TaskStatus> {
        info!("--- {} Package Management ---", self.name());
        match self {
            PackageManager::Apt => apt(ctx).await,
            PackageManager::Dnf => dnf(ctx).await,
            PackageManager::Pacman => pacman(ctx).await,
            PackageManager::Zypper => zypper(ctx).await,
            PackageManager::Bsd => bsd(ctx).await,
            PackageManager::Snap => snap(ctx).await,
            PackageManager::Flatpak => flatpak(ctx).await,
            PackageManager::Winget => winget(ctx).await,
            PackageManager::Chocolatey => chocolatey(ctx).await,
            PackageManager::Scoop => scoop(ctx).await,
            PackageManager::Conda => conda::update(ctx).await,
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn missing(binary: &str) -> TaskStatus {
    TaskStatus::skipped(format!("'{binary}' not found"))
}

async fn apt(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("apt") {
        return Ok(missing("apt"));
    }

    let steps: [(&str, &[&str]); 4] = [
        ("Update APT package lists", &["update", "-y"]),
        ("Perform full APT system upgrade", &["full-upgrade", "-y"]),
        ("Remove unnecessary APT packages", &["autoremove", "--purge", "-y"]),
        ("Clean up APT cache", &["autoclean", "-y"]),
    ];
    for (description, args) in steps {
        let req = exec
            .request(description, "apt", args.iter().copied())
            .with_env(APT_ENV.iter().copied());
        exec.run_and_stream(&req).await?;
    }
    info!("APT maintenance complete.");

    report_deinstalled_packages(ctx).await;
    Ok(TaskStatus::Completed)
}

async fn report_deinstalled_packages(ctx: &TaskContext<'_>) {
    info!("--- Checking for Partially Removed Packages (dpkg) ---");
    if !ctx.exec.command_exists("dpkg") {
        info!("dpkg not found. Skipping check for partially removed packages.");
        return;
    }

    let output = match ctx
        .exec
        .capture("List dpkg selections", "dpkg", ["--get-selections"])
        .await
        .and_then(|out| out.ensure_success("List dpkg selections"))
    {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "Failed to run 'dpkg --get-selections'.");
            return;
        }
    };

    let packages = deinstalled_packages(&output.stdout);
    if packages.is_empty() {
        info!("No partially deinstalled packages found.");
    } else {
        info!("Found partially deinstalled packages:");
        for pkg in &packages {
            info!("  - {pkg}");
        }
        info!("Consider running 'sudo apt autoremove --purge' if these are APT packages.");
    }
}

/// Package names in `deinstall` state from `dpkg --get-selections` output.
pub fn deinstalled_packages(selections: &str) -> Vec<String> {
    selections
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            (fields.next()? == "deinstall").then(|| name.to_string())
        })
        .collect()
}

async fn dnf(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("dnf") {
        return Ok(missing("dnf"));
    }

    exec.run("Update DNF packages", "dnf", ["upgrade", "-y", "--refresh"])
        .await?;
    if let Err(e) = exec
        .run("Remove unnecessary DNF packages", "dnf", ["autoremove", "-y"])
        .await
    {
        info!(error = %e, "No DNF packages to autoremove or autoremove failed.");
    }
    exec.run("Clean DNF cache", "dnf", ["clean", "all"]).await?;

    info!("DNF maintenance complete.");
    Ok(TaskStatus::Completed)
}

async fn pacman(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("pacman") {
        return Ok(missing("pacman"));
    }

    exec.run("Update Pacman packages", "pacman", ["-Syu", "--noconfirm"])
        .await?;

    // `-Qtdq` exits 1 with no output when there are no orphans.
    match exec
        .capture("Query orphaned Pacman packages", "pacman", ["-Qtdq"])
        .await
    {
        Ok(out) => {
            let orphans: Vec<String> = out.stdout_lines().map(str::to_string).collect();
            if orphans.is_empty() {
                info!("No Pacman orphaned packages to remove.");
            } else {
                let mut args = vec!["-Rns".to_string(), "--noconfirm".to_string()];
                args.extend(orphans);
                if let Err(e) = exec
                    .run("Remove orphaned Pacman packages", "pacman", args)
                    .await
                {
                    warn!(error = %e, "Orphaned Pacman packages were not removed.");
                }
            }
        }
        Err(e) => warn!(error = %e, "Failed to query orphaned Pacman packages."),
    }

    exec.run("Clean Pacman cache", "pacman", ["-Sc", "--noconfirm"])
        .await?;

    info!("Pacman maintenance complete.");
    Ok(TaskStatus::Completed)
}

async fn zypper(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("zypper") {
        return Ok(missing("zypper"));
    }

    exec.run("Refresh Zypper repositories", "zypper", ["refresh"])
        .await?;
    exec.run("Update Zypper packages", "zypper", ["update", "-y"])
        .await?;
    exec.run("Clean Zypper cache", "zypper", ["clean", "--all"])
        .await?;

    info!("Zypper maintenance complete.");
    Ok(TaskStatus::Completed)
}

async fn bsd(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if exec.command_exists("pkg") {
        exec.run("Update FreeBSD packages", "pkg", ["upgrade", "-y"])
            .await?;
        exec.run("Clean FreeBSD pkg cache", "pkg", ["clean", "-a", "-y"])
            .await?;
        info!("FreeBSD 'pkg' maintenance complete.");
        return Ok(TaskStatus::Completed);
    }

    if exec.command_exists("pkg_add") {
        info!("OpenBSD 'pkg_add' does not have a simple 'update all' command.");
        info!("Consider running 'pkg_add -u' for specific packages.");
        return Ok(TaskStatus::skipped("pkg_add has no unattended upgrade"));
    }

    Ok(missing("pkg"))
}

async fn snap(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    if !ctx.exec.command_exists("snap") {
        return Ok(missing("snap"));
    }
    ctx.exec
        .run("Update Snap packages", "snap", ["refresh"])
        .await?;
    Ok(TaskStatus::Completed)
}

async fn flatpak(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("flatpak") {
        return Ok(missing("flatpak"));
    }

    exec.run("Update Flatpak packages", "flatpak", ["update", "-y"])
        .await?;
    if let Err(e) = exec
        .run("Clean Flatpak unused data", "flatpak", ["uninstall", "--unused", "-y"])
        .await
    {
        warn!(error = %e, "Flatpak cleanup failed or found nothing to uninstall.");
    }

    info!("Flatpak maintenance complete.");
    Ok(TaskStatus::Completed)
}

async fn winget(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    if !ctx.exec.command_exists("winget") {
        return Ok(missing("winget"));
    }
    ctx.exec
        .run(
            "Update WinGet packages",
            "winget",
            [
                "upgrade",
                "--all",
                "--include-unknown",
                "--silent",
                "--accept-package-agreements",
                "--accept-source-agreements",
            ],
        )
        .await?;
    Ok(TaskStatus::Completed)
}

async fn chocolatey(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("choco") {
        return Ok(missing("choco"));
    }

    exec.run("Update Chocolatey packages", "choco", ["upgrade", "all", "-y"])
        .await?;
    if let Err(e) = exec
        .run("Clean Chocolatey cache", "choco", ["cache", "remove", "-y"])
        .await
    {
        warn!(error = %e, "Failed to clean Chocolatey cache or no cache to clean.");
    }
    Ok(TaskStatus::Completed)
}

async fn scoop(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    use crate::tasks::shell::{detect_powershell, ensure_execution_policy};

    let exec = ctx.exec;
    let Some(ps) = detect_powershell(exec).await else {
        return Ok(TaskStatus::skipped("no PowerShell to run Scoop with"));
    };
    ensure_execution_policy(exec, &ps.executable).await?;
    let user = ctx.require_user("Scoop")?;

    let ps_command = |command: &'static str| ["-NoProfile", "-Command", command];

    if exec
        .run_as(
            user,
            "Check if Scoop is callable",
            &ps.executable,
            ps_command("Get-Command scoop | Out-Null"),
        )
        .await
        .is_err()
    {
        warn!("Scoop not callable from PowerShell. Skipping Scoop maintenance.");
        return Ok(TaskStatus::skipped("scoop not callable"));
    }

    exec.run_as(user, "Update Scoop core", &ps.executable, ps_command("scoop update"))
        .await?;
    exec.run_as(
        user,
        "Update all Scoop applications",
        &ps.executable,
        ps_command("scoop update --all"),
    )
    .await?;
    if let Err(e) = exec
        .run_as(
            user,
            "Clean Scoop cache and old versions",
            &ps.executable,
            ps_command("scoop cleanup --all"),
        )
        .await
    {
        warn!(error = %e, "Scoop cleanup failed or found nothing to clean.");
    }

    Ok(TaskStatus::Completed)
}
