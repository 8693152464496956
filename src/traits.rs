//! Core traits defining the collaborator seams of vlanprobe.
//!
//! The orchestrator never talks to a device directly. It goes through a
//! [`DeviceAdapter`] to capture state and a [`ChangeApplier`] to push the
//! VLAN change, so tests can drive a full run against a simulated fleet.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::inventory::{Credentials, DeviceEntry};
use crate::state::DeviceState;

// ============================================================================
// Capture
// ============================================================================

/// Why a device could not be captured.
///
/// A capture that got a session but lost some commands is not an error; it
/// comes back as a [`CapturedDevice`] with warnings (partial discovery).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// A session could not be opened, or a command timed out.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The device did not answer at all.
    #[error("unreachable: {0}")]
    Unreachable(String),
}

/// A successfully captured device.
#[derive(Debug, Clone)]
pub struct CapturedDevice {
    /// The captured state; fields that could not be read hold `unknown`
    pub state: DeviceState,
    /// Discovery problems encountered along the way
    pub warnings: Vec<String>,
}

impl CapturedDevice {
    /// A capture with no discovery problems.
    pub fn complete(state: DeviceState) -> Self {
        Self {
            state,
            warnings: Vec::new(),
        }
    }

    /// Returns true if some discovery commands failed.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Turns one device into a populated [`DeviceState`].
///
/// Implementations must bound every underlying command by `timeout` and
/// report a timeout as [`CaptureError::ConnectionFailed`].
#[async_trait]
pub trait DeviceAdapter: Send + Sync + Debug {
    /// Captures the full state of `device`, known in inventory as `name`.
    async fn capture(
        &self,
        name: &str,
        device: &DeviceEntry,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<CapturedDevice, CaptureError>;
}

// ============================================================================
// Change application
// ============================================================================

/// A single access-port VLAN assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    /// Inventory name of the device
    pub device_name: String,
    /// Canonical interface name
    pub interface: String,
    /// Access VLAN to assign, canonical decimal
    pub vlan: String,
    /// Voice VLAN to assign alongside, if any
    pub voice_vlan: Option<String>,
}

impl ChangeRequest {
    /// Creates a request without a voice VLAN.
    pub fn new(
        device_name: impl Into<String>,
        interface: impl Into<String>,
        vlan: impl Into<String>,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            interface: interface.into(),
            vlan: vlan.into(),
            voice_vlan: None,
        }
    }

    /// Sets the voice VLAN.
    pub fn with_voice_vlan(mut self, voice_vlan: Option<String>) -> Self {
        self.voice_vlan = voice_vlan;
        self
    }
}

/// Final outcome of a change that did not land.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// Could not open a session to push the change.
    #[error("connection failed after {attempts} attempt(s): {message}")]
    Connection {
        /// Attempts made
        attempts: u32,
        /// Last error message
        message: String,
    },

    /// The device rejected one of the configuration lines.
    #[error("device rejected configuration: {0}")]
    Rejected(String),
}

/// Applies a VLAN change to one interface.
///
/// Retrying is the applier's business; the caller only sees the final
/// outcome.
#[async_trait]
pub trait ChangeApplier: Send + Sync + Debug {
    /// Applies `request` to `device`.
    async fn apply(
        &self,
        device: &DeviceEntry,
        credentials: &Credentials,
        request: &ChangeRequest,
        timeout: Duration,
    ) -> Result<(), ApplyError>;
}
