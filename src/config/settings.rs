// src/config/settings.rs

//! Effective run settings.
//!
//! Precedence, highest first: CLI flags, environment overrides, config file,
//! platform defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, default_log_file, default_user_id};
use crate::errors::{Result, SysmaintError};
use crate::exec::CarriageReturnPolicy;

pub const ENV_LOG_FILE: &str = "SYSMAINT_LOG_FILE";
pub const ENV_USER_ID: &str = "SYSMAINT_USER_ID";

/// Values taken from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_file: Option<PathBuf>,
    pub user_id: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            log_file: std::env::var_os(ENV_LOG_FILE)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            user_id: std::env::var(ENV_USER_ID).ok().filter(|v| !v.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub dry_run: bool,
    pub init_check: bool,
    pub zsh_update: bool,
    pub pwsh_update: bool,
    pub log_file: PathBuf,
    pub user_id: Option<u32>,
    pub command_timeout: Option<Duration>,
    pub carriage_return: CarriageReturnPolicy,
    pub conda_channels: Vec<String>,
}

impl Settings {
    pub fn resolve(args: &CliArgs, file: ConfigFile, env: &EnvOverrides) -> Result<Self> {
        let user_id = match &env.user_id {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                SysmaintError::Config(format!("invalid {ENV_USER_ID} '{raw}': {e}"))
            })?),
            None => file.user_id.or_else(default_user_id),
        };

        let timeout_str = args.timeout.as_deref().or(file.command_timeout.as_deref());
        let command_timeout = timeout_str
            .map(|s| {
                parse_duration(s)
                    .map_err(|e| SysmaintError::Config(format!("invalid command timeout: {e}")))
            })
            .transpose()?;

        let log_file = args
            .log_file
            .clone()
            .or_else(|| env.log_file.clone())
            .or(file.log_file)
            .unwrap_or_else(default_log_file);

        Ok(Self {
            dry_run: args.dry_run,
            init_check: args.init_check || file.init_check.unwrap_or(false),
            zsh_update: args.zsh_update || file.zsh_update.unwrap_or(false),
            pwsh_update: args.pwsh_update || file.pwsh_update.unwrap_or(false),
            log_file,
            user_id,
            command_timeout,
            carriage_return: args
                .carriage_return
                .or(file.carriage_return)
                .unwrap_or_default(),
            conda_channels: file.conda.channels,
        })
    }
}

/// Parse a duration string like `"500ms"`, `"30s"`, `"45m"` or `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => None,
        "s" => Some(1),
        "m" => Some(60),
        "h" => Some(60 * 60),
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    let duration = match secs_per_unit {
        None => Duration::from_millis(value),
        Some(factor) => value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large"))?,
    };

    if duration.is_zero() {
        return Err(format!("duration '{s}' must be greater than zero"));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration(" 45m "), Ok(Duration::from_secs(45 * 60)));
        assert_eq!(parse_duration("2H"), Ok(Duration::from_secs(2 * 3600)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("45").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn rejects_durations_that_overflow() {
        let err = parse_duration("6000000000000000000h").unwrap_err();
        assert!(err.contains("too large"), "{err}");
        assert!(parse_duration("18446744073709551615m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }
}
