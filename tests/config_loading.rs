// tests/config_loading.rs

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;

use sysmaint::cli::CliArgs;
use sysmaint::config::{
    ConfigFile, ConfigSource, DEFAULT_CONDA_CHANNELS, EnvOverrides, Settings, load_config,
    load_from_path,
};
use sysmaint::errors::SysmaintError;
use sysmaint::exec::CarriageReturnPolicy;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("sysmaint.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn full_config_file_is_parsed() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
log_file = "/tmp/maint.log"
user_id = 1001
command_timeout = "45m"
carriage_return = "last"
zsh_update = true

[conda]
channels = ["defaults", "conda-forge"]
"#,
    );

    let (file, source) = load_config(Some(&path)).unwrap();
    assert_eq!(source, ConfigSource::File(path.clone()));

    let settings = Settings::resolve(&CliArgs::default(), file, &EnvOverrides::default()).unwrap();
    assert_eq!(settings.log_file, PathBuf::from("/tmp/maint.log"));
    assert_eq!(settings.user_id, Some(1001));
    assert_eq!(settings.command_timeout, Some(Duration::from_secs(45 * 60)));
    assert_eq!(settings.carriage_return, CarriageReturnPolicy::Last);
    assert!(settings.zsh_update);
    assert!(!settings.pwsh_update);
    assert!(!settings.init_check);
    assert_eq!(settings.conda_channels, vec!["defaults", "conda-forge"]);
}

#[test]
fn empty_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let file = load_from_path(&path).unwrap();
    let settings = Settings::resolve(&CliArgs::default(), file, &EnvOverrides::default()).unwrap();

    assert!(!settings.dry_run);
    assert_eq!(settings.command_timeout, None);
    assert_eq!(settings.carriage_return, CarriageReturnPolicy::Split);
    assert_eq!(settings.conda_channels, DEFAULT_CONDA_CHANNELS.to_vec());
    if cfg!(windows) {
        assert_eq!(settings.user_id, None);
    } else {
        assert_eq!(settings.user_id, Some(1000));
        assert_eq!(
            settings.log_file,
            PathBuf::from("/var/log/system-maintenance.log")
        );
    }
}

#[test]
fn cli_flags_override_file_and_env() {
    let file: ConfigFile = toml::from_str(
        r#"
log_file = "/from/file.log"
command_timeout = "10m"
carriage_return = "last"
"#,
    )
    .unwrap();
    let env = EnvOverrides {
        log_file: Some(PathBuf::from("/from/env.log")),
        user_id: Some(" 1200 ".to_string()),
    };
    let args = CliArgs::parse_from([
        "sysmaint",
        "--dry-run",
        "--pwsh-update",
        "--log-file",
        "/from/cli.log",
        "--timeout",
        "90s",
        "--carriage-return",
        "split",
    ]);

    let settings = Settings::resolve(&args, file, &env).unwrap();
    assert!(settings.dry_run);
    assert!(settings.pwsh_update);
    assert_eq!(settings.log_file, PathBuf::from("/from/cli.log"));
    assert_eq!(settings.user_id, Some(1200));
    assert_eq!(settings.command_timeout, Some(Duration::from_secs(90)));
    assert_eq!(settings.carriage_return, CarriageReturnPolicy::Split);
}

#[test]
fn env_log_file_beats_config_file() {
    let file: ConfigFile = toml::from_str(r#"log_file = "/from/file.log""#).unwrap();
    let env = EnvOverrides {
        log_file: Some(PathBuf::from("/from/env.log")),
        user_id: None,
    };

    let settings = Settings::resolve(&CliArgs::default(), file, &env).unwrap();
    assert_eq!(settings.log_file, PathBuf::from("/from/env.log"));
}

#[test]
fn explicit_missing_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = load_config(Some(&missing)).unwrap_err();
    assert!(matches!(err, SysmaintError::Config(_)), "got {err:?}");
}

#[test]
fn malformed_toml_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "user_id = \"not a number\"\n");

    let err = load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, SysmaintError::Toml(_)), "got {err:?}");
}

#[test]
fn unknown_carriage_return_policy_is_rejected() {
    let parsed: Result<ConfigFile, _> = toml::from_str(r#"carriage_return = "collapse""#);
    assert!(parsed.is_err());
}

#[test]
fn invalid_values_surface_as_config_errors() {
    let file: ConfigFile = toml::from_str(r#"command_timeout = "soon""#).unwrap();
    let err = Settings::resolve(&CliArgs::default(), file, &EnvOverrides::default()).unwrap_err();
    assert!(matches!(err, SysmaintError::Config(_)));

    let env = EnvOverrides {
        log_file: None,
        user_id: Some("alice".to_string()),
    };
    let err = Settings::resolve(&CliArgs::default(), ConfigFile::default(), &env).unwrap_err();
    assert!(err.to_string().contains("SYSMAINT_USER_ID"));
}

#[test]
fn verbose_and_quiet_conflict() {
    assert!(CliArgs::try_parse_from(["sysmaint", "-v", "-q"]).is_err());
    let args = CliArgs::try_parse_from(["sysmaint", "-v", "-z"]).unwrap();
    assert!(args.verbose);
    assert!(args.zsh_update);
}
