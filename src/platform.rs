// src/platform.rs

//! Host platform detection.
//!
//! The result only decides which maintenance tasks are attempted and in which
//! order; every task still checks for its own binary before running.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::exec::Executor;

pub const OS_RELEASE: &str = "/etc/os-release";

/// Distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Debian,
    Rhel,
    Arch,
    Suse,
    Gentoo,
    Bsd,
    Windows,
    Unknown,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Family::Debian => "debian",
            Family::Rhel => "rhel",
            Family::Arch => "arch",
            Family::Suse => "suse",
            Family::Gentoo => "gentoo",
            Family::Bsd => "bsd",
            Family::Windows => "windows",
            Family::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The package manager believed to govern the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryPackageManager {
    Apt,
    Dnf,
    Pacman,
    Zypper,
    Portage,
    Pkg,
    PkgAdd,
    GenericBsdPkg,
    Winget,
    Unknown,
}

impl fmt::Display for PrimaryPackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimaryPackageManager::Apt => "apt",
            PrimaryPackageManager::Dnf => "dnf",
            PrimaryPackageManager::Pacman => "pacman",
            PrimaryPackageManager::Zypper => "zypper",
            PrimaryPackageManager::Portage => "portage",
            PrimaryPackageManager::Pkg => "pkg",
            PrimaryPackageManager::PkgAdd => "pkg_add",
            PrimaryPackageManager::GenericBsdPkg => "generic_bsd_pkg",
            PrimaryPackageManager::Winget => "winget",
            PrimaryPackageManager::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Raw distribution id as reported by the host (`ubuntu`, `fedora`, ...).
    pub id: String,
    pub id_like: String,
    pub family: Family,
    pub primary: PrimaryPackageManager,
}

impl Platform {
    pub fn unknown() -> Self {
        Self {
            id: "unknown".to_string(),
            id_like: "unknown".to_string(),
            family: Family::Unknown,
            primary: PrimaryPackageManager::Unknown,
        }
    }

    pub fn windows() -> Self {
        Self {
            id: "windows".to_string(),
            id_like: "windows".to_string(),
            family: Family::Windows,
            primary: PrimaryPackageManager::Winget,
        }
    }

    /// Map a distribution id / id-like pair onto a family and primary
    /// package manager. Both inputs are compared lowercased.
    pub fn classify(id: &str, id_like: &str) -> Self {
        let id = id.trim().to_lowercase();
        let id_like = id_like.trim().to_lowercase();

        let matches = |ids: &[&str]| {
            ids.contains(&id.as_str()) || ids.iter().any(|like| id_like.contains(like))
        };

        let (family, primary) = if matches(&[
            "ubuntu",
            "debian",
            "linuxmint",
            "pop",
            "elementary",
            "mx",
        ]) {
            (Family::Debian, PrimaryPackageManager::Apt)
        } else if matches(&["rhel", "fedora", "centos", "almalinux", "rocky"]) {
            (Family::Rhel, PrimaryPackageManager::Dnf)
        } else if matches(&["arch", "manjaro", "endeavouros"]) {
            (Family::Arch, PrimaryPackageManager::Pacman)
        } else if id == "opensuse" || id.starts_with("opensuse-") || matches(&["suse", "sles"]) {
            (Family::Suse, PrimaryPackageManager::Zypper)
        } else if matches(&["gentoo"]) {
            (Family::Gentoo, PrimaryPackageManager::Portage)
        } else if id == "freebsd" {
            (Family::Bsd, PrimaryPackageManager::Pkg)
        } else if id == "openbsd" {
            (Family::Bsd, PrimaryPackageManager::PkgAdd)
        } else if id_like.contains("bsd") {
            (Family::Bsd, PrimaryPackageManager::GenericBsdPkg)
        } else {
            (Family::Unknown, PrimaryPackageManager::Unknown)
        };

        Self {
            id: if id.is_empty() { "unknown".to_string() } else { id },
            id_like: if id_like.is_empty() {
                "unknown".to_string()
            } else {
                id_like
            },
            family,
            primary,
        }
    }

    pub fn is_windows(&self) -> bool {
        self.family == Family::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, IDLike: {}, Family: {}, PrimaryPackageManager: {}",
            self.id, self.id_like, self.family, self.primary
        )
    }
}

/// Extract `ID=` and `ID_LIKE=` from os-release contents.
pub fn parse_os_release(contents: &str) -> (Option<String>, Option<String>) {
    let mut id = None;
    let mut id_like = None;

    for line in contents.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
        match key {
            "ID" => id = Some(value),
            "ID_LIKE" => id_like = Some(value),
            _ => {}
        }
    }

    (id, id_like)
}

/// Detect the host platform.
///
/// Never fails: anything that cannot be determined degrades to
/// [`Platform::unknown`] and is logged.
pub async fn detect(exec: &Executor) -> Platform {
    if cfg!(windows) {
        info!("Detecting Windows environment and primary package manager...");
        return Platform::windows();
    }

    info!("Detecting distribution and primary package manager...");
    let (mut id, mut id_like) = (None, None);

    if exec.command_exists("lsb_release") {
        match exec.capture("Query distribution id", "lsb_release", ["-is"]).await {
            Ok(out) if out.success() => {
                id = Some(out.stdout.trim().to_lowercase()).filter(|s| !s.is_empty());
            }
            Ok(out) => debug!(exit_code = ?out.exit_code(), "lsb_release -is failed"),
            Err(e) => debug!(error = %e, "lsb_release -is failed"),
        }
        match exec.capture("Query distribution details", "lsb_release", ["-as"]).await {
            Ok(out) if out.success() => {
                id_like = out
                    .stdout
                    .to_lowercase()
                    .split_whitespace()
                    .next()
                    .map(str::to_string);
            }
            Ok(out) => debug!(exit_code = ?out.exit_code(), "lsb_release -as failed"),
            Err(e) => debug!(error = %e, "lsb_release -as failed"),
        }
    }

    if id.as_deref().is_none_or(|s| s.contains("not found")) {
        match read_os_release(Path::new(OS_RELEASE)) {
            Ok(Some((os_id, os_like))) => {
                id = os_id;
                if os_like.is_some() {
                    id_like = os_like;
                }
            }
            Ok(None) => debug!("{} not present", OS_RELEASE),
            Err(e) => warn!("Error reading {}: {}", OS_RELEASE, e),
        }
    }

    let platform = Platform::classify(
        id.as_deref().unwrap_or_default(),
        id_like.as_deref().unwrap_or_default(),
    );
    if platform.primary == PrimaryPackageManager::Unknown {
        info!("Could not definitively determine the distribution. Falling back to command checks.");
    }
    platform
}

fn read_os_release(path: &Path) -> std::io::Result<Option<(Option<String>, Option<String>)>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(parse_os_release(&contents))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
