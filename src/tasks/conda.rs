// src/tasks/conda.rs

//! Conda: channel setup, update and cleanup, run as the desktop user.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::tasks::{TaskContext, TaskStatus};

const CHANNEL_PATTERN: &str = r"--add channels '([^']+)'";

/// Channel names from `conda config --get channels` output.
pub fn parse_channels(output: &str) -> BTreeSet<String> {
    let re = match Regex::new(CHANNEL_PATTERN) {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "invalid conda channel pattern");
            return BTreeSet::new();
        }
    };
    re.captures_iter(output)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

pub async fn update(ctx: &TaskContext<'_>) -> Result<TaskStatus> {
    let exec = ctx.exec;
    if !exec.command_exists("conda") {
        return Ok(TaskStatus::skipped("'conda' not found"));
    }
    let user = ctx.require_user("Conda")?;

    info!("Checking required Conda channels...");
    let existing = {
        let req = exec
            .request("Get existing conda channels", "conda", ["config", "--get", "channels"])
            .as_user(user);
        match exec.run_and_capture(&req).await {
            Ok(out) if out.success() => {
                let channels = parse_channels(&out.stdout);
                debug!(count = channels.len(), "existing conda channels");
                channels
            }
            Ok(out) => {
                warn!(
                    exit_code = ?out.exit_code(),
                    "Could not read conda channels for user '{}'. Adding all required channels.",
                    user
                );
                BTreeSet::new()
            }
            Err(e) => {
                warn!(error = %e, "Could not read conda channels. Adding all required channels.");
                BTreeSet::new()
            }
        }
    };

    for channel in ctx.conda_channels {
        if existing.contains(channel) {
            info!("Channel '{channel}' already exists. Skipping addition.");
            continue;
        }
        let description = format!("Add {channel} channel");
        if let Err(e) = exec
            .run_as(
                user,
                &description,
                "conda",
                ["config", "--add", "channels", channel.as_str()],
            )
            .await
        {
            warn!(error = %e, "Failed to add channel '{channel}'. Proceeding with others.");
        }
    }

    exec.run_as(
        user,
        "Update all Conda packages",
        "conda",
        ["update", "--all", "--yes"],
    )
    .await?;

    if let Err(e) = exec
        .run_as(
            user,
            "Clean Conda cache and old versions",
            "conda",
            ["clean", "--all", "--yes"],
        )
        .await
    {
        warn!(error = %e, "Conda cleanup failed or found nothing to clean.");
    }

    info!("Conda maintenance complete.");
    Ok(TaskStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_listing() {
        let output = "--add channels 'pypi'   # lowest priority\n\
                      --add channels 'conda-forge'\n\
                      --add channels 'defaults'   # highest priority\n";
        let channels = parse_channels(output);
        assert_eq!(channels.len(), 3);
        assert!(channels.contains("conda-forge"));
        assert!(channels.contains("defaults"));
        assert!(channels.contains("pypi"));
    }

    #[test]
    fn empty_listing_yields_no_channels() {
        assert!(parse_channels("").is_empty());
        assert!(parse_channels("--add channels ''\n").is_empty());
    }
}
