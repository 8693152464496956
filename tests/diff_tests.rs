//! Property-based tests for the snapshot differ using proptest.
//!
//! Snapshots are generated from small random fleets; every capture uses the
//! same timestamp so only the fields under test can differ.

use chrono::{TimeZone, Utc};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use vlanprobe::state::{diff, AuditSnapshot, DeviceState, PortChange, PortConfig};

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Strategy for generating VLAN ids as captured (canonical decimal)
fn vlan() -> impl Strategy<Value = String> {
    (1u16..=4094).prop_map(|v| v.to_string())
}

/// Strategy for one device: port number to access VLAN
fn device_ports() -> impl Strategy<Value = BTreeMap<u8, String>> {
    btree_map(1u8..=48, vlan(), 0..8)
}

/// Strategy for a fleet: device name to ports
fn fleet() -> impl Strategy<Value = BTreeMap<String, BTreeMap<u8, String>>> {
    btree_map("sw[1-9]", device_ports(), 0..5)
}

fn iface(n: u8) -> String {
    format!("GigabitEthernet0/{n}")
}

fn device(name: &str, ports: &BTreeMap<u8, String>) -> DeviceState {
    let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    ports.iter().fold(
        DeviceState::new(name, "10.0.0.1", "cisco_ios").with_timestamp(stamp),
        |state, (n, vlan)| state.with_port(PortConfig::access(iface(*n), vlan.clone())),
    )
}

fn snapshot(fleet: &BTreeMap<String, BTreeMap<u8, String>>) -> AuditSnapshot {
    fleet
        .iter()
        .map(|(name, ports)| (name.clone(), device(name, ports)))
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn diff_of_snapshot_with_itself_is_empty(f in fleet()) {
        let s = snapshot(&f);
        prop_assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn added_and_removed_devices_mirror(a in fleet(), b in fleet()) {
        let (sa, sb) = (snapshot(&a), snapshot(&b));
        let forward = diff(&sa, &sb);
        let backward = diff(&sb, &sa);

        prop_assert_eq!(&forward.added_devices, &backward.removed_devices);
        prop_assert_eq!(&forward.removed_devices, &backward.added_devices);

        let expected_added: BTreeSet<String> =
            b.keys().filter(|k| !a.contains_key(*k)).cloned().collect();
        prop_assert_eq!(forward.added_devices, expected_added);
    }

    #[test]
    fn modified_ports_are_exactly_the_retagged_ones(
        before in device_ports(),
        retag in vec(any::<bool>(), 48),
        new_vlan in vlan(),
    ) {
        let after: BTreeMap<u8, String> = before
            .iter()
            .map(|(n, v)| {
                let v = if retag[usize::from(*n) - 1] { new_vlan.clone() } else { v.clone() };
                (*n, v)
            })
            .collect();

        let pre: AuditSnapshot = std::iter::once(("sw1".to_string(), device("sw1", &before))).collect();
        let post: AuditSnapshot = std::iter::once(("sw1".to_string(), device("sw1", &after))).collect();
        let delta = diff(&pre, &post);

        let expected: BTreeSet<String> = before
            .iter()
            .filter(|(n, v)| after[*n] != **v)
            .map(|(n, _)| iface(*n))
            .collect();
        let actual: BTreeSet<String> = delta
            .port_changes()
            .map(|(_, i, _)| i.to_string())
            .collect();
        prop_assert_eq!(&actual, &expected);

        for (_, _, change) in delta.port_changes() {
            match change {
                PortChange::Modified { config_changes } => {
                    prop_assert_eq!(config_changes.keys().collect::<Vec<_>>(), vec!["access_vlan"]);
                }
                PortChange::Presence { .. } => prop_assert!(false, "no ports added or removed"),
            }
        }
    }

    #[test]
    fn port_presence_changes_match_key_sets(a in device_ports(), b in device_ports()) {
        let pre: AuditSnapshot = std::iter::once(("sw1".to_string(), device("sw1", &a))).collect();
        let post: AuditSnapshot = std::iter::once(("sw1".to_string(), device("sw1", &b))).collect();
        let delta = diff(&pre, &post);
        let summary = delta.summary();

        let removed = a.keys().filter(|k| !b.contains_key(*k)).count();
        let added = b.keys().filter(|k| !a.contains_key(*k)).count();
        prop_assert_eq!(summary.removed_ports, removed);
        prop_assert_eq!(summary.added_ports, added);
    }
}

// ============================================================================
// Fixed cases
// ============================================================================

#[test]
fn test_removed_device_has_no_port_records() {
    let mut f = BTreeMap::new();
    f.insert("sw1".to_string(), BTreeMap::from([(1u8, "10".to_string())]));
    f.insert("sw2".to_string(), BTreeMap::from([(1u8, "10".to_string())]));
    let before = snapshot(&f);
    f.remove("sw2");
    let after = snapshot(&f);

    let delta = diff(&before, &after);

    assert_eq!(delta.removed_devices.iter().collect::<Vec<_>>(), vec!["sw2"]);
    assert!(delta.device_changes.is_empty());
    assert_eq!(delta.port_changes().count(), 0);
}

#[test]
fn test_delta_json_shape() {
    let before = snapshot(&BTreeMap::from([(
        "sw1".to_string(),
        BTreeMap::from([(1u8, "10".to_string())]),
    )]));
    let after = snapshot(&BTreeMap::from([(
        "sw1".to_string(),
        BTreeMap::from([(1u8, "20".to_string())]),
    )]));

    let value = serde_json::to_value(diff(&before, &after)).unwrap();

    assert_eq!(
        value["device_changes"]["sw1"]["port_changes"]["GigabitEthernet0/1"]["config_changes"]
            ["access_vlan"],
        serde_json::json!({ "before": "10", "after": "20" })
    );
    assert!(value.get("added_devices").is_none());
}
