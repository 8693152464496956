//! End-to-end orchestrator tests against a simulated fleet.
//!
//! These tests drive full runs through `Orchestrator::run` with the mock
//! adapter and applier from `common`, covering:
//! - A clean change with rollback
//! - Side effects on other ports
//! - A change that lands the wrong VLAN
//! - Unreachable devices during environment validation
//! - Partial fleet capture
//! - Rollback failure and disabled rollback
//! - Applier failures and bad targets

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::time::Duration;
use vlanprobe::inventory::{Inventory, VlanId};
use vlanprobe::orchestrator::{
    post_snapshot_id, pre_snapshot_id, FailureKind, Phase, RollbackOutcome, RunOptions,
    RunOutcome,
};
use vlanprobe::state::{PortConfig, SnapshotStore, SwitchportMode};
use vlanprobe::traits::ApplyError;
use vlanprobe::Error;

// ============================================================================
// Passing runs
// ============================================================================

#[tokio::test]
async fn test_clean_change_completes_and_rolls_back() {
    let h = Harness::new(2);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert_eq!(run.phase, Phase::Completed);
    assert!(run.success);
    assert!(run.errors.is_empty(), "errors: {:?}", run.errors);
    assert!(run.failures.is_empty());
    assert_eq!(run.original_vlan.as_deref(), Some("10"));
    assert!(run.changes_applied);
    assert!(run.rollback_performed);
    assert_eq!(run.rollback, RollbackOutcome::Succeeded);
    assert_eq!(run.outcome(), RunOutcome::Passed);
    assert_eq!(run.outcome().exit_code(), 0);
    assert!(run.end_time.is_some());

    let requests = h.applier.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].interface, GI1);
    assert_eq!(requests[0].vlan, "20");
    assert_eq!(requests[1].vlan, "10");
    assert_eq!(requests[1].voice_vlan, None);
    assert_eq!(h.network.access_vlan("sw1", GI1).as_deref(), Some("10"));
}

#[tokio::test]
async fn test_clean_change_delta_only_touches_target() {
    let h = Harness::new(3);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    let delta = run.delta.as_ref().expect("delta recorded");
    let changed: Vec<_> = delta
        .port_changes()
        .map(|(device, iface, _)| format!("{device}:{iface}"))
        .collect();
    assert_eq!(changed, vec![format!("sw1:{GI1}")]);

    let change = delta
        .port_changes()
        .next()
        .and_then(|(_, _, c)| c.field("access_vlan").cloned())
        .unwrap();
    assert_eq!(change.before_str(), Some("10"));
    assert_eq!(change.after_str(), Some("20"));
}

#[tokio::test]
async fn test_snapshots_are_stored_under_run_ids() {
    let h = Harness::new(1);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    let pre = pre_snapshot_id(&run.test_id);
    let post = post_snapshot_id(&run.test_id);
    assert_eq!(run.pre_snapshot_id.as_deref(), Some(pre.as_str()));
    assert_eq!(run.post_snapshot_id.as_deref(), Some(post.as_str()));
    assert!(h.store.exists(&pre));
    assert!(h.store.exists(&post));

    let stored = h.store.load(&post).unwrap();
    assert_eq!(stored.port("sw1", GI1).unwrap().access_vlan, "20");
}

#[tokio::test]
async fn test_partial_fleet_capture_is_a_warning() {
    let h = Harness::new(5);
    // Reachable during environment validation, gone from the pre-audit on
    h.network.fail_from_capture("sw5", 2);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(run.success, "errors: {:?}", run.errors);
    assert_eq!(run.pre_audit.as_ref().unwrap().len(), 4);
    assert!(!run.pre_audit.as_ref().unwrap().contains("sw5"));
    assert!(run.warnings.iter().any(|w| w.contains("sw5")));
    assert!(run.failures.is_empty());
}

#[tokio::test]
async fn test_target_already_in_vlan_warns() {
    let h = Harness::new(1);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "10")).await;

    assert!(run.success);
    assert!(run
        .warnings
        .iter()
        .any(|w| w.contains("already in VLAN 10")));
}

#[tokio::test]
async fn test_voice_vlan_applied_with_change() {
    let h = Harness::new(1);
    let t = target("sw1", "Gi0/1", "20").with_voice_vlan(VlanId::parse("100").unwrap());

    let run = h.orchestrator.run(&t).await;

    assert!(run.success, "errors: {:?}", run.errors);
    assert!(!run.warnings.iter().any(|w| w.contains("voice VLAN")));
    let requests = h.applier.requests();
    assert_eq!(requests[0].voice_vlan.as_deref(), Some("100"));
}

#[tokio::test]
async fn test_mode_change_on_other_port_is_a_warning() {
    let h = Harness::new(2);
    h.applier.with_mode_change("sw2", GI2, SwitchportMode::Trunk);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(run.success, "errors: {:?}", run.errors);
    assert!(run.failures.is_empty());
    assert!(run
        .warnings
        .contains(&format!("mode change on sw2:{GI2} (access -> trunk)")));
}

#[tokio::test]
async fn test_device_missing_from_post_audit_is_a_warning() {
    let h = Harness::new(3);
    // environment check and pre-audit succeed, post-audit loses sw3
    h.network.fail_from_capture("sw3", 3);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(run.success, "errors: {:?}", run.errors);
    assert_eq!(run.phase, Phase::Completed);
    assert!(run.pre_audit.as_ref().unwrap().contains("sw3"));
    assert!(!run.post_audit.as_ref().unwrap().contains("sw3"));
    assert!(run
        .warnings
        .contains(&"device sw3 missing from post-audit".to_string()));
}

#[tokio::test]
async fn test_target_link_down_is_a_warning() {
    let h = Harness::new(1);
    h.network.set_operational_status("sw1", GI1, "notconnect");

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(run.success, "errors: {:?}", run.errors);
    assert!(run.failures.is_empty());
    assert!(run
        .warnings
        .contains(&format!("sw1:{GI1} operational status is notconnect")));
}

// ============================================================================
// Failing runs
// ============================================================================

#[tokio::test]
async fn test_side_effect_on_other_device_fails_run() {
    let h = Harness::new(2);
    h.network.add_device(
        "sw2",
        switch("sw2", "10.0.0.2", "10").with_port(PortConfig::access(GI3, "5")),
    );
    h.applier.with_side_effect("sw2", GI3, "6");

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(!run.success);
    assert_eq!(run.phase, Phase::Failed);
    assert!(run.has_failure(FailureKind::SideEffectFailure));
    assert!(!run.has_failure(FailureKind::ValidationFailure));
    assert!(run
        .errors
        .iter()
        .any(|e| e.contains("sw2:GigabitEthernet0/3") && e.contains("5 -> 6")));
    // Rollback still restores the target
    assert_eq!(run.rollback, RollbackOutcome::Succeeded);
    assert_eq!(h.network.access_vlan("sw1", GI1).as_deref(), Some("10"));
}

#[tokio::test]
async fn test_wrong_vlan_fails_validation_and_rolls_back() {
    let h = Harness::new(2);
    h.applier.misapply_as("21");

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(!run.success);
    assert_eq!(run.phase, Phase::Failed);
    assert!(run.has_failure(FailureKind::ValidationFailure));
    assert!(run
        .errors
        .iter()
        .any(|e| e.contains("access VLAN is 21, expected 20")));
    // Side-effect check never ran
    assert!(run.delta.is_none());

    let requests = h.applier.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].vlan, "10");
    assert!(run.rollback_performed);
}

#[tokio::test]
async fn test_unreachable_device_stops_before_pre_audit() {
    let h = Harness::new(3);
    h.network.set_unreachable("sw3");

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(!run.success);
    assert_eq!(run.phase, Phase::Failed);
    assert!(run.has_failure(FailureKind::ConnectivityFailure));
    assert!(run.errors.iter().any(|e| e.contains("sw3")));
    assert!(!run.changes_applied);
    assert!(run.pre_audit.is_none());
    assert_eq!(run.rollback, RollbackOutcome::NotAttempted);
    assert_eq!(h.applier.call_count(), 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_rollback_failure_keeps_pass_with_distinct_outcome() {
    let h = Harness::new(1);
    h.applier.fail_rollback();

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(run.success);
    assert_eq!(run.phase, Phase::Completed);
    assert!(run.has_failure(FailureKind::RollbackFailure));
    assert!(!run.rollback_performed);
    assert!(matches!(run.rollback, RollbackOutcome::Failed { .. }));
    assert_eq!(run.outcome(), RunOutcome::PassedRollbackFailed);
    assert_eq!(run.outcome().exit_code(), 2);
    assert_eq!(h.network.access_vlan("sw1", GI1).as_deref(), Some("20"));
}

#[tokio::test]
async fn test_rollback_disabled_leaves_change_in_place() {
    let h = Harness::new(1).with_options(
        RunOptions::default()
            .with_settle_delay(Duration::ZERO)
            .with_rollback(false),
    );

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(run.success);
    assert_eq!(h.applier.call_count(), 1);
    assert_eq!(run.rollback, RollbackOutcome::NotAttempted);
    assert!(run.warnings.iter().any(|w| w.contains("rollback disabled")));
    assert_eq!(h.network.access_vlan("sw1", GI1).as_deref(), Some("20"));
}

#[tokio::test]
async fn test_missing_interface_fails_before_apply() {
    let h = Harness::new(1);

    let run = h.orchestrator.run(&target("sw1", "Gi0/9", "20")).await;

    assert!(!run.success);
    assert!(run.has_failure(FailureKind::ValidationFailure));
    assert!(run.errors.iter().any(|e| e.contains("GigabitEthernet0/9")));
    assert_eq!(h.applier.call_count(), 0);
    assert!(run.original_vlan.is_none());
}

#[tokio::test]
async fn test_rejected_change_is_validation_failure_without_rollback() {
    let h = Harness::new(1);
    h.applier
        .fail_first_with(ApplyError::Rejected("switchport access vlan 20: % Invalid input".into()));

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(!run.success);
    assert!(run.has_failure(FailureKind::ValidationFailure));
    assert!(!run.changes_applied);
    assert_eq!(h.applier.call_count(), 1);
    assert_eq!(run.rollback, RollbackOutcome::NotAttempted);
}

#[tokio::test]
async fn test_apply_connection_failure_is_connectivity_failure() {
    let h = Harness::new(1);
    h.applier.fail_first_with(ApplyError::Connection {
        attempts: 3,
        message: "timed out".into(),
    });

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;

    assert!(!run.success);
    assert!(run.has_failure(FailureKind::ConnectivityFailure));
    assert!(run.errors[0].starts_with("ConnectivityFailure:"));
}

// ============================================================================
// Environment validation
// ============================================================================

#[tokio::test]
async fn test_validate_environment_lists_unreachable() {
    let h = Harness::new(3);
    h.network.set_unreachable("sw2");

    let err = h.orchestrator.validate_environment().await.unwrap_err();

    match err {
        Error::EnvironmentValidation { unreachable } => {
            assert_eq!(unreachable, vec!["sw2".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_validate_environment_empty_inventory() {
    let h = Harness::with_inventory(MockNetwork::new(), Inventory::new());
    assert!(matches!(
        h.orchestrator.validate_environment().await,
        Err(Error::Config(_))
    ));
}

#[tokio::test]
async fn test_each_device_captured_once_per_audit() {
    let h = Harness::new(4);

    let capture = h.orchestrator.audit().await;

    assert_eq!(capture.snapshot.len(), 4);
    assert!(capture.failed.is_empty());
    for i in 1..=4 {
        assert_eq!(h.network.capture_count(&format!("sw{i}")), 1);
    }
}

#[tokio::test]
async fn test_finalized_run_serializes_phase() {
    let h = Harness::new(1);

    let run = h.orchestrator.run(&target("sw1", "Gi0/1", "20")).await;
    let value = serde_json::to_value(&run).unwrap();

    assert_eq!(value["phase"], "completed");
    assert_eq!(value["success"], true);
    assert_eq!(value["target_interface"], GI1);
    assert_eq!(value["rollback"]["status"], "succeeded");
}
