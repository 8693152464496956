//! Error types for vlanprobe.
//!
//! Each layer owns a narrow error enum (`ConnectionError`, `CaptureError`,
//! `StoreError`, `ApplyError`); this module defines the crate-wide [`Error`]
//! those fold into at the configuration and orchestration boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::connection::ConnectionError;
use crate::state::persistence::StoreError;

/// Result type alias for vlanprobe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for vlanprobe.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Tool configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configuration value is present but invalid.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Dotted key of the offending setting
        key: String,
        /// Error message
        message: String,
    },

    /// Missing or incomplete device credentials.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    // ========================================================================
    // Inventory Errors
    // ========================================================================
    /// Error loading the device inventory or targets file.
    #[error("Failed to load inventory from '{path}': {message}")]
    InventoryLoad {
        /// Path to inventory
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Device not found in inventory.
    #[error("Device '{0}' not found in inventory")]
    DeviceNotFound(String),

    /// VLAN identifier outside 1-4094 or not numeric.
    #[error("Invalid VLAN ID: '{0}' (must be 1-4094)")]
    InvalidVlan(String),

    /// Interface name not in a recognized form.
    #[error("Invalid interface name format: '{0}'")]
    InvalidInterface(String),

    /// Test prerequisites are not met; every problem is listed.
    #[error("Test prerequisites not met: {}", .0.join("; "))]
    Prerequisites(Vec<String>),

    // ========================================================================
    // Run Errors
    // ========================================================================
    /// One or more inventory devices could not be reached.
    #[error("Environment validation failed, unreachable devices: {}", .unreachable.join(", "))]
    EnvironmentValidation {
        /// Names of the unreachable devices
        unreachable: Vec<String>,
    },

    /// A run attempted to move its phase backwards or out of a terminal phase.
    #[error("Invalid phase transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// Current phase
        from: String,
        /// Requested phase
        to: String,
    },

    /// Transport error outside of a capture or apply.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Snapshot store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    // ========================================================================
    // Parsing Errors
    // ========================================================================
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parse error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new inventory load error.
    pub fn inventory_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InventoryLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid configuration error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Connection(e) => e.is_transient(),
            Error::EnvironmentValidation { .. } => true,
            _ => false,
        }
    }

    /// Returns the error code for CLI exit status.
    ///
    /// Codes 0-2 are reserved for run outcomes (pass, fail, pass with a
    /// failed rollback).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::EnvironmentValidation { .. } | Error::Connection(_) => 3,
            Error::Config(_)
            | Error::InvalidConfig { .. }
            | Error::MissingCredentials(_)
            | Error::TomlParse(_) => 4,
            Error::InventoryLoad { .. }
            | Error::DeviceNotFound(_)
            | Error::InvalidVlan(_)
            | Error::InvalidInterface(_)
            | Error::Prerequisites(_)
            | Error::YamlParse(_) => 5,
            Error::Store(_) | Error::Io(_) | Error::JsonParse(_) => 6,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
