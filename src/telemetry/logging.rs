//! Structured logging setup using the tracing crate.
//!
//! Supports pretty, compact and JSON console output plus an optional plain
//! log file. `RUST_LOG` always wins over the configured level.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::{Error, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Convert from verbosity level (0-3+).
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::invalid_config(
                "logging.level",
                format!("unknown level '{other}'"),
            )),
        }
    }
}

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty console output with colors
    Pretty,
    /// Compact single-line output
    #[default]
    Compact,
    /// JSON structured output
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::invalid_config(
                "logging.format",
                format!("unknown format '{other}' (expected pretty, compact or json)"),
            )),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include span enter/exit events
    pub with_spans: bool,
    pub with_target: bool,
    pub ansi_colors: bool,
    /// Also append plain-text logs to this file
    pub file: Option<PathBuf>,
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            with_spans: false,
            with_target: false,
            ansi_colors: true,
            file: None,
            filter: None,
        }
    }
}

/// Builder for installing the global subscriber.
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    config: LoggingConfig,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: LoggingConfig) -> Self {
        Self { config }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn with_verbosity(self, verbosity: u8) -> Self {
        let builder = self.with_level(LogLevel::from_verbosity(verbosity));
        builder.with_target(verbosity >= 3)
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.config.ansi_colors = enabled;
        self
    }

    pub fn with_spans(mut self, enabled: bool) -> Self {
        self.config.with_spans = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.config.with_target = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    pub fn with_file_output(mut self, path: impl AsRef<Path>) -> Self {
        self.config.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Build and install the global subscriber.
    pub fn init(self) -> Result<()> {
        let mut layers = vec![self.console_layer()];
        if let Some(path) = &self.config.file {
            layers.push(self.file_layer(path)?);
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn build_filter(&self) -> EnvFilter {
        let default_filter = self.config.level.as_directive();

        if let Some(ref filter) = self.config.filter {
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(filter))
                .unwrap_or_else(|_| EnvFilter::new(default_filter))
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.config.with_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn console_layer(&self) -> BoxedLayer {
        let filter = self.build_filter();
        let base = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.config.with_target)
            .with_span_events(self.span_events());

        match self.config.format {
            LogFormat::Pretty => base
                .pretty()
                .with_ansi(self.config.ansi_colors)
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => base
                .compact()
                .with_ansi(self.config.ansi_colors)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => base
                .json()
                .with_current_span(true)
                .with_span_list(self.config.with_spans)
                .with_filter(filter)
                .boxed(),
        }
    }

    fn file_layer(&self, path: &Path) -> Result<BoxedLayer> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Config(format!("cannot open log file {}: {e}", path.display())))?;

        Ok(tracing_subscriber::fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_filter(self.build_filter())
            .boxed())
    }
}
