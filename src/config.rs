//! Configuration for vlanprobe.
//!
//! Handles loading configuration from, in increasing precedence:
//! - Built-in defaults
//! - A TOML or YAML file (`--config`, `VLANPROBE_CONFIG`, or `vlanprobe.toml`
//!   / `vlanprobe.yml` in the working directory)
//! - `VLANPROBE_*` environment variables
//!
//! Device credentials are deliberately not part of this file; see
//! [`Credentials`](crate::inventory::Credentials).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::orchestrator::RunOptions;
use crate::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
use crate::telemetry::{LogFormat, LogLevel};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "VLANPROBE_CONFIG";

/// Files looked for in the working directory when no path is given.
const DEFAULT_CONFIG_FILES: &[&str] = &["vlanprobe.toml", "vlanprobe.yml", "vlanprobe.yaml"];

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output locations
    pub paths: PathsConfig,

    /// Settle delay and command timeout
    pub timing: TimingConfig,

    /// SSH session settings
    pub connection: ConnectionConfig,

    /// Change push retry settings
    pub apply: ApplyConfig,

    /// Fleet capture settings
    pub audit: AuditConfig,

    /// Logging settings
    pub logging: LogSettings,
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Device inventory file
    pub inventory: PathBuf,
    /// Test target file
    pub targets: PathBuf,
    /// Where audit snapshots are stored
    pub state_dir: PathBuf,
    /// Where test reports are written
    pub report_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            inventory: PathBuf::from("devices.yml"),
            targets: PathBuf::from("targets.yml"),
            state_dir: PathBuf::from("."),
            report_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after applying the change before the post-audit
    pub settle_delay_secs: u64,
    /// Per-command timeout
    pub command_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: 5,
            command_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// SSH port for devices that do not set their own
    pub port: u16,
    /// Extra connect attempts after the first
    pub connect_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: 22,
            connect_retries: 2,
            retry_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Extra push attempts after the first
    pub max_retries: u32,
    /// Delay before the first retry; later retries back off exponentially
    pub retry_delay_ms: u64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Devices captured at once
    pub max_concurrent: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { max_concurrent: 1 }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Fixed level; when unset the `-v` count decides
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    /// Also append logs to this file
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// An explicit path that does not exist is an error; the implicit
    /// working-directory files are optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        let explicit = config_path.map(Path::to_path_buf).or(env_path);

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match DEFAULT_CONFIG_FILES
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
            {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single file, choosing the parser by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        Ok(config)
    }

    /// Apply `VLANPROBE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `VLANPROBE_*` overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| Error::invalid_config(key, format!("cannot parse '{value}'")))
        }

        // VLANPROBE_SETTLE_DELAY
        if let Some(v) = lookup("VLANPROBE_SETTLE_DELAY") {
            self.timing.settle_delay_secs = parse("VLANPROBE_SETTLE_DELAY", &v)?;
        }

        // VLANPROBE_COMMAND_TIMEOUT
        if let Some(v) = lookup("VLANPROBE_COMMAND_TIMEOUT") {
            self.timing.command_timeout_secs = parse("VLANPROBE_COMMAND_TIMEOUT", &v)?;
        }

        // VLANPROBE_MAX_CONCURRENT
        if let Some(v) = lookup("VLANPROBE_MAX_CONCURRENT") {
            self.audit.max_concurrent = parse("VLANPROBE_MAX_CONCURRENT", &v)?;
        }

        // VLANPROBE_STATE_DIR
        if let Some(v) = lookup("VLANPROBE_STATE_DIR") {
            self.paths.state_dir = PathBuf::from(v);
        }

        // VLANPROBE_INVENTORY
        if let Some(v) = lookup("VLANPROBE_INVENTORY") {
            self.paths.inventory = PathBuf::from(v);
        }

        // VLANPROBE_TARGETS
        if let Some(v) = lookup("VLANPROBE_TARGETS") {
            self.paths.targets = PathBuf::from(v);
        }

        // VLANPROBE_LOG_FORMAT
        if let Some(v) = lookup("VLANPROBE_LOG_FORMAT") {
            self.logging.format = v.parse()?;
        }

        Ok(())
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.timing.command_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "timing.command_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.audit.max_concurrent == 0 {
            return Err(Error::invalid_config(
                "audit.max_concurrent",
                "must be at least 1",
            ));
        }
        if self.connection.port == 0 {
            return Err(Error::invalid_config("connection.port", "must be non-zero"));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.timing.settle_delay_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.command_timeout_secs)
    }

    /// Retry policy for opening SSH sessions.
    pub fn connect_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::constant(
            self.connection.connect_retries,
            Duration::from_millis(self.connection.retry_delay_ms),
        )
    }

    /// Retry policy for pushing a change.
    pub fn apply_retry_policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.apply.retry_delay_ms);
        RetryPolicy::builder()
            .max_retries(self.apply.max_retries)
            .initial_delay(initial)
            .max_delay(initial.saturating_mul(8))
            .backoff(BackoffStrategy::Exponential { multiplier: 2.0 })
            .jitter(JitterStrategy::Equal)
            .build()
    }

    /// Orchestrator options derived from this configuration.
    pub fn run_options(&self) -> RunOptions {
        RunOptions::default()
            .with_settle_delay(self.settle_delay())
            .with_command_timeout(self.command_timeout())
            .with_max_concurrent(self.audit.max_concurrent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timing.settle_delay_secs, 5);
        assert_eq!(config.timing.command_timeout_secs, 30);
        assert_eq!(config.connection.port, 22);
        assert_eq!(config.apply.max_retries, 3);
        assert_eq!(config.audit.max_concurrent, 1);
        assert_eq!(config.paths.inventory, PathBuf::from("devices.yml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [timing]
            settle_delay_secs = 10

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.settle_delay_secs, 10);
        assert_eq!(config.timing.command_timeout_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("VLANPROBE_SETTLE_DELAY", "0"),
            ("VLANPROBE_MAX_CONCURRENT", "4"),
            ("VLANPROBE_STATE_DIR", "/var/lib/vlanprobe"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert_eq!(config.audit.max_concurrent, 4);
        assert_eq!(config.paths.state_dir, PathBuf::from("/var/lib/vlanprobe"));
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "VLANPROBE_COMMAND_TIMEOUT").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { key, .. } if key == "VLANPROBE_COMMAND_TIMEOUT"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.timing.command_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_run_options() {
        let opts = Config::default().run_options();
        assert!(opts.rollback);
        assert_eq!(opts.command_timeout, Duration::from_secs(30));
    }
}
