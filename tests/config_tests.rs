//! Configuration loading tests.
//!
//! Tests that touch `VLANPROBE_*` variables run serially since the process
//! environment is shared.

use pretty_assertions::assert_eq;
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

use vlanprobe::config::{Config, CONFIG_ENV_VAR};
use vlanprobe::telemetry::{LogFormat, LogLevel};
use vlanprobe::Error;

const OVERRIDE_VARS: &[&str] = &[
    CONFIG_ENV_VAR,
    "VLANPROBE_SETTLE_DELAY",
    "VLANPROBE_COMMAND_TIMEOUT",
    "VLANPROBE_MAX_CONCURRENT",
    "VLANPROBE_STATE_DIR",
    "VLANPROBE_INVENTORY",
    "VLANPROBE_TARGETS",
    "VLANPROBE_LOG_FORMAT",
];

fn clear_env() {
    for var in OVERRIDE_VARS {
        std::env::remove_var(var);
    }
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_load_toml_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "vlanprobe.toml",
        r#"
[paths]
inventory = "lab/devices.yml"
state_dir = "state"

[timing]
settle_delay_secs = 10

[connection]
port = 2222

[logging]
level = "debug"
format = "json"
"#,
    );

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.paths.inventory, PathBuf::from("lab/devices.yml"));
    assert_eq!(config.paths.state_dir, PathBuf::from("state"));
    assert_eq!(config.paths.targets, PathBuf::from("targets.yml"));
    assert_eq!(config.settle_delay(), Duration::from_secs(10));
    assert_eq!(config.command_timeout(), Duration::from_secs(30));
    assert_eq!(config.connection.port, 2222);
    assert_eq!(config.logging.level, Some(LogLevel::Debug));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
#[serial]
fn test_load_yaml_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "vlanprobe.yml",
        "apply:\n  max_retries: 5\naudit:\n  max_concurrent: 4\n",
    );

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.apply.max_retries, 5);
    assert_eq!(config.audit.max_concurrent, 4);
    assert_eq!(config.run_options().max_concurrent, 4);
}

#[test]
#[serial]
fn test_config_path_from_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "custom.toml", "[timing]\ncommand_timeout_secs = 90\n");
    std::env::set_var(CONFIG_ENV_VAR, &path);

    let config = Config::load(None);
    clear_env();

    assert_eq!(config.unwrap().command_timeout(), Duration::from_secs(90));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "vlanprobe.toml", "[timing]\nsettle_delay_secs = 10\n");
    std::env::set_var("VLANPROBE_SETTLE_DELAY", "0");
    std::env::set_var("VLANPROBE_STATE_DIR", "/var/lib/vlanprobe");
    std::env::set_var("VLANPROBE_LOG_FORMAT", "pretty");

    let config = Config::load(Some(&path));
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.settle_delay(), Duration::ZERO);
    assert_eq!(config.paths.state_dir, PathBuf::from("/var/lib/vlanprobe"));
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
#[serial]
fn test_unparseable_env_override_is_rejected() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "vlanprobe.toml", "");
    std::env::set_var("VLANPROBE_MAX_CONCURRENT", "many");

    let result = Config::load(Some(&path));
    clear_env();

    match result {
        Err(Error::InvalidConfig { key, .. }) => assert_eq!(key, "VLANPROBE_MAX_CONCURRENT"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
#[serial]
fn test_missing_explicit_file_is_config_error() {
    clear_env();
    let dir = TempDir::new().unwrap();

    let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(err.exit_code(), 4);
}

#[test]
#[serial]
fn test_invalid_values_fail_validation() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "vlanprobe.toml", "[audit]\nmax_concurrent = 0\n");

    let err = Config::load(Some(&path)).unwrap_err();

    assert!(matches!(err, Error::InvalidConfig { ref key, .. } if key == "audit.max_concurrent"));
}

#[test]
#[serial]
fn test_malformed_toml_is_parse_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "vlanprobe.toml", "[timing\nsettle_delay_secs = ");

    let err = Config::load(Some(&path)).unwrap_err();

    assert!(matches!(err, Error::TomlParse(_)));
    assert_eq!(err.exit_code(), 4);
}
