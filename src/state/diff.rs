//! Snapshot Diff Engine
//!
//! Compares two [`AuditSnapshot`]s and produces a structured [`Delta`].
//!
//! ## Rules
//!
//! - Devices only in `after` are added, devices only in `before` are removed.
//!   A removed device gets no per-port records.
//! - For devices in both, ports are diffed by interface name and every
//!   declared [`PortConfig`] field is compared with plain equality. No
//!   normalization happens here.
//! - Empty sections are left out, so an empty `Delta` means nothing changed.
//!
//! `diff` is pure: no I/O, deterministic output ordering.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AuditSnapshot, DeviceState, PortConfig};

/// Before/after pair for one changed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub before: Value,
    pub after: Value,
}

impl FieldChange {
    pub fn new(before: Value, after: Value) -> Self {
        Self { before, after }
    }

    /// The `before` value as a string, if it is one.
    pub fn before_str(&self) -> Option<&str> {
        self.before.as_str()
    }

    /// The `after` value as a string, if it is one.
    pub fn after_str(&self) -> Option<&str> {
        self.after.as_str()
    }
}

/// Whether a port appeared or disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Added,
    Removed,
}

/// Change record for one port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortChange {
    /// The port exists on only one side; `config` is that side's state.
    Presence { status: Presence, config: PortConfig },
    /// The port exists on both sides and these fields differ.
    Modified {
        config_changes: BTreeMap<String, FieldChange>,
    },
}

impl PortChange {
    /// The change to `field`, if this is a modification touching it.
    pub fn field(&self, field: &str) -> Option<&FieldChange> {
        match self {
            PortChange::Modified { config_changes } => config_changes.get(field),
            PortChange::Presence { .. } => None,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(
            self,
            PortChange::Presence {
                status: Presence::Added,
                ..
            }
        )
    }

    pub fn is_removed(&self) -> bool {
        matches!(
            self,
            PortChange::Presence {
                status: Presence::Removed,
                ..
            }
        )
    }
}

/// Everything that changed on one device present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDelta {
    /// Interface name to change record
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub port_changes: BTreeMap<String, PortChange>,
    /// VLAN id to before/after record (`null` where absent)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vlan_changes: BTreeMap<String, FieldChange>,
    /// Port-channel name to before/after member list (`null` where absent)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub portchannel_changes: BTreeMap<String, FieldChange>,
    /// Device-level metadata such as the capture timestamp
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub general_changes: BTreeMap<String, FieldChange>,
}

impl DeviceDelta {
    pub fn is_empty(&self) -> bool {
        self.port_changes.is_empty()
            && self.vlan_changes.is_empty()
            && self.portchannel_changes.is_empty()
            && self.general_changes.is_empty()
    }

    /// Returns true if only metadata changed.
    pub fn is_metadata_only(&self) -> bool {
        self.port_changes.is_empty()
            && self.vlan_changes.is_empty()
            && self.portchannel_changes.is_empty()
    }
}

/// Structured difference between two fleet snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub added_devices: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub removed_devices: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub device_changes: BTreeMap<String, DeviceDelta>,
}

/// Counts for a [`Delta`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeltaSummary {
    pub added_devices: usize,
    pub removed_devices: usize,
    pub changed_devices: usize,
    pub added_ports: usize,
    pub removed_ports: usize,
    pub modified_ports: usize,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added_devices.is_empty()
            && self.removed_devices.is_empty()
            && self.device_changes.is_empty()
    }

    /// Every port record as `(device, interface, change)`, in order.
    pub fn port_changes(&self) -> impl Iterator<Item = (&str, &str, &PortChange)> {
        self.device_changes.iter().flat_map(|(device, dd)| {
            dd.port_changes
                .iter()
                .map(move |(iface, change)| (device.as_str(), iface.as_str(), change))
        })
    }

    pub fn summary(&self) -> DeltaSummary {
        let mut summary = DeltaSummary {
            added_devices: self.added_devices.len(),
            removed_devices: self.removed_devices.len(),
            changed_devices: self
                .device_changes
                .values()
                .filter(|d| !d.is_metadata_only())
                .count(),
            ..DeltaSummary::default()
        };
        for (_, _, change) in self.port_changes() {
            match change {
                PortChange::Presence {
                    status: Presence::Added,
                    ..
                } => summary.added_ports += 1,
                PortChange::Presence {
                    status: Presence::Removed,
                    ..
                } => summary.removed_ports += 1,
                PortChange::Modified { .. } => summary.modified_ports += 1,
            }
        }
        summary
    }
}

/// Computes the delta from `before` to `after`.
pub fn diff(before: &AuditSnapshot, after: &AuditSnapshot) -> Delta {
    let before_names: BTreeSet<&str> = before.device_names().collect();
    let after_names: BTreeSet<&str> = after.device_names().collect();

    let mut delta = Delta {
        added_devices: after_names
            .difference(&before_names)
            .map(|s| (*s).to_string())
            .collect(),
        removed_devices: before_names
            .difference(&after_names)
            .map(|s| (*s).to_string())
            .collect(),
        device_changes: BTreeMap::new(),
    };

    for name in before_names.intersection(&after_names) {
        if let (Some(b), Some(a)) = (before.get(name), after.get(name)) {
            let device_delta = diff_device(b, a);
            if !device_delta.is_empty() {
                delta.device_changes.insert((*name).to_string(), device_delta);
            }
        }
    }

    delta
}

/// Computes the changes on a single device.
pub fn diff_device(before: &DeviceState, after: &DeviceState) -> DeviceDelta {
    let mut delta = DeviceDelta::default();

    if before.hostname != after.hostname {
        delta.general_changes.insert(
            "hostname".to_string(),
            FieldChange::new(json!(before.hostname), json!(after.hostname)),
        );
    }
    if before.ip_address != after.ip_address {
        delta.general_changes.insert(
            "ip_address".to_string(),
            FieldChange::new(json!(before.ip_address), json!(after.ip_address)),
        );
    }
    if before.device_type != after.device_type {
        delta.general_changes.insert(
            "device_type".to_string(),
            FieldChange::new(json!(before.device_type), json!(after.device_type)),
        );
    }
    if before.timestamp != after.timestamp {
        delta.general_changes.insert(
            "timestamp".to_string(),
            FieldChange::new(json!(before.timestamp), json!(after.timestamp)),
        );
    }

    for (iface, old) in &before.ports {
        match after.ports.get(iface) {
            None => {
                delta.port_changes.insert(
                    iface.clone(),
                    PortChange::Presence {
                        status: Presence::Removed,
                        config: old.clone(),
                    },
                );
            }
            Some(new) => {
                let config_changes = port_field_changes(old, new);
                if !config_changes.is_empty() {
                    delta
                        .port_changes
                        .insert(iface.clone(), PortChange::Modified { config_changes });
                }
            }
        }
    }
    for (iface, new) in &after.ports {
        if !before.ports.contains_key(iface) {
            delta.port_changes.insert(
                iface.clone(),
                PortChange::Presence {
                    status: Presence::Added,
                    config: new.clone(),
                },
            );
        }
    }

    let old_vlans: BTreeMap<&str, _> = before.vlans.iter().map(|v| (v.id.as_str(), v)).collect();
    let new_vlans: BTreeMap<&str, _> = after.vlans.iter().map(|v| (v.id.as_str(), v)).collect();
    let vlan_ids: BTreeSet<&str> = old_vlans.keys().chain(new_vlans.keys()).copied().collect();
    for id in vlan_ids {
        let (old, new) = (old_vlans.get(id), new_vlans.get(id));
        if old != new {
            delta
                .vlan_changes
                .insert(id.to_string(), FieldChange::new(json!(old), json!(new)));
        }
    }

    let po_names: BTreeSet<&String> = before
        .portchannels
        .keys()
        .chain(after.portchannels.keys())
        .collect();
    for po in po_names {
        let (old, new) = (before.portchannels.get(po), after.portchannels.get(po));
        if old != new {
            delta
                .portchannel_changes
                .insert(po.clone(), FieldChange::new(json!(old), json!(new)));
        }
    }

    delta
}

/// Compares every declared field of two port states.
macro_rules! compare_fields {
    ($before:expr, $after:expr, $changes:expr; $($field:ident),+ $(,)?) => {
        $(
            if $before.$field != $after.$field {
                $changes.insert(
                    stringify!($field).to_string(),
                    FieldChange::new(json!($before.$field), json!($after.$field)),
                );
            }
        )+
    };
}

fn port_field_changes(before: &PortConfig, after: &PortConfig) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    compare_fields!(before, after, changes;
        interface,
        admin_status,
        operational_status,
        access_vlan,
        voice_vlan,
        mode,
        portfast,
        description,
        speed,
        duplex,
        cdp_neighbor,
        portchannel_member,
    );
    changes
}
