//! # vlanprobe - End-to-End Validation of Switch-Port VLAN Changes
//!
//! vlanprobe proves that moving one switch port to a new access VLAN did
//! exactly that and nothing else. It captures the whole fleet, pushes the
//! change, captures again, checks the target port, compares every other port
//! against the first capture, and finally puts the original VLAN back.
//!
//! ## Core Concepts
//!
//! - **Inventory**: the devices to capture, plus the one port under test
//! - **Snapshot**: every device's ports, VLANs and port-channels at one instant
//! - **Delta**: the structured difference between two snapshots
//! - **Test run**: the record a run builds as it moves through its phases
//! - **Adapter / Applier**: the seams that read from and write to devices
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │               (run / validate / audit / compare)                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           Orchestrator                               │
//! │   validate → pre-audit → apply → post-audit → check → rollback       │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │  DeviceAdapter  │   │    ChangeApplier    │   │   SnapshotStore     │
//! │  (IOS capture)  │   │   (IOS config push) │   │   (JSON files)      │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!          │                         │
//!          └────────────┬────────────┘
//!                       ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Connection layer (SSH via russh)                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vlanprobe::prelude::*;
//! use vlanprobe::connection::russh::SshSessionFactory;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let inventory = Inventory::load("devices.yml")?;
//!     let target = TargetSpec::load("targets.yml")?.resolve(&inventory)?;
//!
//!     let factory = Arc::new(SshSessionFactory::new());
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(IosDeviceAdapter::new(factory.clone())),
//!         Arc::new(IosChangeApplier::new(factory)),
//!         Arc::new(JsonSnapshotStore::new(".")?),
//!         inventory,
//!         Credentials::from_env()?,
//!     );
//!
//!     let run = orchestrator.run(&target).await;
//!     println!("{}", vlanprobe::report::render_summary(&run));
//!     std::process::exit(run.outcome().exit_code());
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error handling
    pub use crate::error::{Error, Result};

    // Inputs
    pub use crate::config::Config;
    pub use crate::inventory::{Credentials, DeviceEntry, Inventory, TargetSpec, TestTarget, VlanId};

    // Snapshot model
    pub use crate::state::{
        diff, AuditSnapshot, Delta, DeviceState, JsonSnapshotStore, MemorySnapshotStore,
        PortConfig, SnapshotStore,
    };

    // Device seams
    pub use crate::network::{IosChangeApplier, IosDeviceAdapter};
    pub use crate::traits::*;

    // Runs
    pub use crate::orchestrator::{
        FinalizedRun, Orchestrator, Phase, RunOptions, RunOutcome, TestRun,
    };
}

// ============================================================================
// Core Types
// ============================================================================

/// Error types for vlanprobe operations.
pub mod error;

/// Seams between the orchestrator and the devices.
pub mod traits;

/// Device inventory, credentials and the test target.
pub mod inventory;

/// Snapshot model, fleet capture, differ and snapshot storage.
pub mod state;

// ============================================================================
// Device Access
// ============================================================================

/// Transport layer for switch CLI sessions.
pub mod connection;

/// Cisco IOS command parsing, capture and change push.
pub mod network;

/// Retry with backoff for flaky device sessions.
pub mod retry;

// ============================================================================
// Execution
// ============================================================================

/// Test-run state machine and the orchestrator that drives it.
pub mod orchestrator;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration loading from files and `VLANPROBE_*` variables.
pub mod config;

// ============================================================================
// Reporting and Output
// ============================================================================

/// Console summary, Markdown and JSON reports.
pub mod report;

/// Structured logging setup.
pub mod telemetry;

pub use error::{Error, Result};

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of vlanprobe.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
