//! Connection layer for switch CLI sessions.
//!
//! This module provides the transport seam between the network adapter and a
//! device: open an interactive session, send a show command and get raw text
//! back, push a block of configuration lines.
//!
//! # Overview
//!
//! - [`SessionFactory`] opens a [`DeviceSession`] to one device.
//! - [`DeviceSession`] sends commands and returns raw text.
//!
//! The only shipped transport is SSH via `russh` (the `russh` feature, on by
//! default). Tests substitute their own factory.
//!
//! # Example
//!
//! ```rust,ignore
//! use vlanprobe::connection::{SessionFactory, SessionTarget};
//! use vlanprobe::connection::russh::SshSessionFactory;
//!
//! let factory = SshSessionFactory::new();
//! let mut session = factory.open(&SessionTarget::new("10.0.0.1"), &creds).await?;
//! let output = session.send_command("show vlan brief").await?;
//! session.close().await?;
//! ```

#[cfg(feature = "russh")]
pub mod russh;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::inventory::{Credentials, DEFAULT_SSH_PORT};

/// Wrapper so russh errors can serve as a client handler error type.
#[cfg(feature = "russh")]
#[derive(Debug)]
pub struct RusshError(pub ::russh::Error);

#[cfg(feature = "russh")]
impl From<::russh::Error> for RusshError {
    fn from(err: ::russh::Error) -> Self {
        RusshError(err)
    }
}

#[cfg(feature = "russh")]
impl std::fmt::Display for RusshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Russh error: {}", self.0)
    }
}

#[cfg(feature = "russh")]
impl std::error::Error for RusshError {}

/// Errors that can occur talking to a device.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish initial connection to the host.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Every configured login was rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command could not be sent or its output could not be read.
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// The device answered a command with a CLI error marker.
    #[error("Command '{command}' rejected by device: {output}")]
    CommandRejected {
        /// The rejected command line
        command: String,
        /// The device's error text
        output: String,
    },

    /// Connection or command timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// SSH-specific error from the underlying implementation.
    #[error("SSH error: {0}")]
    SshError(String),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The session was already closed.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl ConnectionError {
    /// Returns true for failures a fresh attempt might get past.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectionFailed(_)
                | ConnectionError::Timeout(_)
                | ConnectionError::SshError(_)
                | ConnectionError::IoError(_)
                | ConnectionError::ConnectionClosed
        )
    }

    /// Returns true if the host never answered at the network level.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ConnectionError::IoError(_) => true,
            ConnectionError::ConnectionFailed(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("unreachable") || msg.contains("no route") || msg.contains("refused")
            }
            _ => false,
        }
    }
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Where and how long to talk to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub host: String,
    pub port: u16,
    /// Per-command timeout, also used for connect and authentication
    pub timeout: Duration,
}

impl SessionTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open CLI session on one device.
#[async_trait]
pub trait DeviceSession: Send {
    /// Identifier for logging, usually `host:port`.
    fn identifier(&self) -> &str;

    /// Run one show command and return its raw output.
    async fn send_command(&mut self, command: &str) -> ConnectionResult<String>;

    /// Enter configuration mode, send `lines` in order, and leave it.
    ///
    /// Fails with [`ConnectionError::CommandRejected`] on the first line the
    /// device refuses.
    async fn send_config_set(&mut self, lines: &[String]) -> ConnectionResult<String>;

    /// Close the session.
    async fn close(&mut self) -> ConnectionResult<()>;
}

/// Opens sessions to devices.
#[async_trait]
pub trait SessionFactory: Send + Sync + std::fmt::Debug {
    /// Open a session, trying each login in `credentials` in order.
    async fn open(
        &self,
        target: &SessionTarget,
        credentials: &Credentials,
    ) -> ConnectionResult<Box<dyn DeviceSession>>;
}
