//! Device Snapshot Model
//!
//! Value types describing what a fleet looked like at one instant, plus the
//! fleet-wide capture pass that produces them.
//!
//! ## Key Types
//!
//! - **PortConfig**: one switch port's observable state.
//! - **DeviceState**: one device's ports, VLANs and port-channels.
//! - **AuditSnapshot**: device name to `DeviceState` for the whole fleet.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   capture()   ┌──────────────┐   save(id)   ┌───────────────┐
//! │ DeviceAdapter│ ─────────────▶│ AuditSnapshot│ ────────────▶│ SnapshotStore │
//! └──────────────┘  per device   └──────────────┘              └───────────────┘
//!                                   │       │
//!                              pre  │       │ post
//!                                   ▼       ▼
//!                                ┌─────────────┐
//!                                │ diff::diff  │ ──▶ Delta
//!                                └─────────────┘
//! ```
//!
//! Snapshots are never mutated after capture. A device that fails to capture
//! is left out entirely rather than stored half-filled; any field the adapter
//! could not read is set to [`UNKNOWN`].

pub mod diff;
pub mod persistence;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::inventory::{Credentials, Inventory};
use crate::traits::{CaptureError, DeviceAdapter};

pub use diff::{diff, Delta, DeviceDelta, FieldChange, PortChange};
pub use persistence::{JsonSnapshotStore, MemorySnapshotStore, SnapshotStore, StoreError};

/// Sentinel for a field whose value could not be determined.
pub const UNKNOWN: &str = "unknown";

/// Sentinel for an unset voice VLAN.
pub const NO_VOICE_VLAN: &str = "none";

// ============================================================================
// Port
// ============================================================================

/// Administrative switchport mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchportMode {
    Access,
    Trunk,
    Dynamic,
    #[default]
    Unknown,
}

impl fmt::Display for SwitchportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwitchportMode::Access => "access",
            SwitchportMode::Trunk => "trunk",
            SwitchportMode::Dynamic => "dynamic",
            SwitchportMode::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SwitchportMode {
    type Err = std::convert::Infallible;

    /// Accepts IOS wording such as `static access` or `dynamic auto`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Ok(if lower.contains("access") {
            SwitchportMode::Access
        } else if lower.contains("trunk") {
            SwitchportMode::Trunk
        } else if lower.starts_with("dynamic") {
            SwitchportMode::Dynamic
        } else {
            SwitchportMode::Unknown
        })
    }
}

/// One switch port's observable state.
///
/// Field names are part of the persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Canonical interface name, e.g. `GigabitEthernet0/1`
    pub interface: String,
    pub admin_status: String,
    pub operational_status: String,
    /// Canonical decimal VLAN id, or `unknown`
    pub access_vlan: String,
    /// Canonical decimal VLAN id, `none`, or `unknown`
    pub voice_vlan: String,
    pub mode: SwitchportMode,
    /// `None` when the running configuration could not be read
    #[serde(default)]
    pub portfast: Option<bool>,
    /// Description line, empty when none is set, or `unknown`
    pub description: String,
    pub speed: String,
    pub duplex: String,
    /// Neighbor device id, `None` for no neighbor, `unknown` if CDP could not be read
    #[serde(default)]
    pub cdp_neighbor: Option<String>,
    #[serde(default)]
    pub portchannel_member: Option<String>,
}

impl PortConfig {
    /// A port about which nothing is known yet.
    pub fn unknown(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            admin_status: UNKNOWN.to_string(),
            operational_status: UNKNOWN.to_string(),
            access_vlan: UNKNOWN.to_string(),
            voice_vlan: UNKNOWN.to_string(),
            mode: SwitchportMode::Unknown,
            portfast: None,
            description: UNKNOWN.to_string(),
            speed: UNKNOWN.to_string(),
            duplex: UNKNOWN.to_string(),
            cdp_neighbor: Some(UNKNOWN.to_string()),
            portchannel_member: None,
        }
    }

    /// An up, connected access port in `vlan` with auto speed/duplex.
    pub fn access(interface: impl Into<String>, vlan: impl Into<String>) -> Self {
        Self {
            admin_status: "up".to_string(),
            operational_status: "connected".to_string(),
            access_vlan: vlan.into(),
            voice_vlan: NO_VOICE_VLAN.to_string(),
            mode: SwitchportMode::Access,
            portfast: Some(false),
            description: String::new(),
            speed: "auto".to_string(),
            duplex: "auto".to_string(),
            cdp_neighbor: None,
            ..Self::unknown(interface)
        }
    }

    pub fn with_access_vlan(mut self, vlan: impl Into<String>) -> Self {
        self.access_vlan = vlan.into();
        self
    }

    pub fn with_mode(mut self, mode: SwitchportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_operational_status(mut self, status: impl Into<String>) -> Self {
        self.operational_status = status.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_portchannel(mut self, portchannel: impl Into<String>) -> Self {
        self.portchannel_member = Some(portchannel.into());
        self
    }

    /// Returns true if the link is operationally up.
    pub fn is_link_up(&self) -> bool {
        matches!(self.operational_status.as_str(), "up" | "connected")
    }
}

// ============================================================================
// Device
// ============================================================================

/// One VLAN as listed by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRecord {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl VlanRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: status.into(),
        }
    }
}

/// One device's full captured state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub hostname: String,
    pub ip_address: String,
    pub device_type: String,
    pub timestamp: DateTime<Utc>,
    /// Interface name to port state
    pub ports: BTreeMap<String, PortConfig>,
    pub vlans: Vec<VlanRecord>,
    /// Port-channel name to ordered member interface names
    pub portchannels: BTreeMap<String, Vec<String>>,
}

impl DeviceState {
    /// Creates an empty device state stamped with the current time.
    pub fn new(
        hostname: impl Into<String>,
        ip_address: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            ip_address: ip_address.into(),
            device_type: device_type.into(),
            timestamp: Utc::now(),
            ports: BTreeMap::new(),
            vlans: Vec::new(),
            portchannels: BTreeMap::new(),
        }
    }

    /// Adds a port, keyed by its interface name.
    pub fn with_port(mut self, port: PortConfig) -> Self {
        self.ports.insert(port.interface.clone(), port);
        self
    }

    pub fn with_vlan(mut self, vlan: VlanRecord) -> Self {
        self.vlans.push(vlan);
        self
    }

    pub fn with_portchannel(mut self, name: impl Into<String>, members: Vec<String>) -> Self {
        self.portchannels.insert(name.into(), members);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn port(&self, interface: &str) -> Option<&PortConfig> {
        self.ports.get(interface)
    }

    /// Port-channel members that are missing from the port map.
    ///
    /// Discovery ordering can produce these transiently, so they are
    /// reported rather than rejected.
    pub fn membership_warnings(&self) -> Vec<String> {
        self.portchannels
            .iter()
            .flat_map(|(po, members)| {
                members
                    .iter()
                    .filter(|m| !self.ports.contains_key(m.as_str()))
                    .map(move |m| format!("port-channel {po} member {m} not found in port list"))
            })
            .collect()
    }
}

// ============================================================================
// Fleet
// ============================================================================

/// Device name to captured state, for the whole fleet at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditSnapshot {
    devices: BTreeMap<String, DeviceState>,
}

impl AuditSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, name: impl Into<String>, state: DeviceState) -> Self {
        self.devices.insert(name.into(), state);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DeviceState> {
        self.devices.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceState)> {
        self.devices.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Looks up one port on one device.
    pub fn port(&self, device: &str, interface: &str) -> Option<&PortConfig> {
        self.devices.get(device).and_then(|d| d.port(interface))
    }

    /// Total number of ports across all devices.
    pub fn port_count(&self) -> usize {
        self.devices.values().map(|d| d.ports.len()).sum()
    }
}

impl FromIterator<(String, DeviceState)> for AuditSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, DeviceState)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}

/// A device that could not be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCapture {
    pub device: String,
    pub reason: CaptureError,
}

/// Result of a fleet-wide capture: the devices that succeeded plus an
/// account of the ones that did not.
#[derive(Debug, Clone, Default)]
pub struct FleetCapture {
    pub snapshot: AuditSnapshot,
    pub failed: Vec<FailedCapture>,
    /// Partial-discovery and membership warnings, prefixed by device name
    pub warnings: Vec<String>,
}

impl FleetCapture {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_devices(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.device.clone()).collect()
    }
}

/// Captures every device in `inventory`.
///
/// One device failing never stops the others. At most `max_concurrent`
/// sessions are in flight, each device is captured exactly once, and the
/// snapshot is assembled only after every capture has settled.
pub async fn capture_all(
    adapter: &dyn DeviceAdapter,
    inventory: &Inventory,
    credentials: &Credentials,
    timeout: Duration,
    max_concurrent: usize,
) -> FleetCapture {
    info!(devices = inventory.len(), "Starting fleet capture");

    let results: Vec<_> = stream::iter(inventory.iter())
        .map(|(name, entry)| async move {
            debug!(device = %name, host = %entry.host, "Capturing device");
            let result = adapter.capture(name, entry, credentials, timeout).await;
            (name.to_string(), result)
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let mut capture = FleetCapture::default();
    let mut captured = BTreeMap::new();
    for (name, result) in results {
        match result {
            Ok(device) => {
                for w in device
                    .warnings
                    .iter()
                    .cloned()
                    .chain(device.state.membership_warnings())
                {
                    warn!(device = %name, "{}", w);
                    capture.warnings.push(format!("{name}: {w}"));
                }
                captured.insert(name, device.state);
            }
            Err(reason) => {
                warn!(device = %name, error = %reason, "Capture failed");
                capture.failed.push(FailedCapture {
                    device: name,
                    reason,
                });
            }
        }
    }
    capture.failed.sort_by(|a, b| a.device.cmp(&b.device));
    capture.snapshot = AuditSnapshot { devices: captured };

    info!(
        captured = capture.snapshot.len(),
        failed = capture.failed_count(),
        "Fleet capture finished"
    );
    capture
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switchport_mode_from_ios_text() {
        assert_eq!(
            "static access".parse::<SwitchportMode>().unwrap(),
            SwitchportMode::Access
        );
        assert_eq!(
            "trunk".parse::<SwitchportMode>().unwrap(),
            SwitchportMode::Trunk
        );
        assert_eq!(
            "dynamic auto".parse::<SwitchportMode>().unwrap(),
            SwitchportMode::Dynamic
        );
        assert_eq!(
            "routed".parse::<SwitchportMode>().unwrap(),
            SwitchportMode::Unknown
        );
    }

    #[test]
    fn test_unknown_port_uses_sentinels() {
        let port = PortConfig::unknown("GigabitEthernet0/1");
        assert_eq!(port.access_vlan, UNKNOWN);
        assert_eq!(port.operational_status, UNKNOWN);
        assert_eq!(port.mode, SwitchportMode::Unknown);
        assert!(!port.is_link_up());
    }

    #[test]
    fn test_membership_warnings() {
        let state = DeviceState::new("sw1", "10.0.0.1", "cisco_ios")
            .with_port(PortConfig::access("GigabitEthernet0/1", "10"))
            .with_portchannel(
                "Po1",
                vec![
                    "GigabitEthernet0/1".to_string(),
                    "GigabitEthernet0/2".to_string(),
                ],
            );
        let warnings = state.membership_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("GigabitEthernet0/2"));
    }

    #[test]
    fn test_snapshot_serializes_keyed_by_device() {
        let snapshot = AuditSnapshot::new().with_device(
            "sw1",
            DeviceState::new("sw1", "10.0.0.1", "cisco_ios")
                .with_port(PortConfig::access("GigabitEthernet0/1", "10")),
        );
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json["sw1"]["ports"]["GigabitEthernet0/1"]["access_vlan"],
            "10"
        );
        assert_eq!(json["sw1"]["ports"]["GigabitEthernet0/1"]["mode"], "access");
        assert!(json["sw1"]["ports"]["GigabitEthernet0/1"]["cdp_neighbor"].is_null());
    }
}
