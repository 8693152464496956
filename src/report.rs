//! Rendering of finalized runs and fleet audits.
//!
//! Nothing here computes results; everything renders values the
//! orchestrator and differ already produced.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::orchestrator::{RollbackOutcome, RunOutcome, TestRun};
use crate::state::{AuditSnapshot, Delta, PortChange};

const RULE_WIDTH: usize = 60;

/// Report format version written into JSON reports.
pub const REPORT_VERSION: &str = "1.0";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or("Unknown")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Console summary
// ============================================================================

/// Plain-text summary of a run, as printed at the end of `vlanprobe run`.
pub fn render_summary(run: &TestRun) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "NETWORK VLAN CHANGE TEST SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Test ID: {}", run.test_id);
    let _ = writeln!(out, "Start Time: {}", run.start_time.to_rfc3339());
    let _ = writeln!(
        out,
        "End Time: {}",
        run.end_time
            .map_or_else(|| "Unknown".to_string(), |t| t.to_rfc3339())
    );
    out.push('\n');

    let _ = writeln!(out, "Test Configuration:");
    let _ = writeln!(out, "  Device: {}", run.target_device);
    let _ = writeln!(out, "  Interface: {}", run.target_interface);
    let _ = writeln!(out, "  Original VLAN: {}", or_unknown(run.original_vlan.as_deref()));
    let _ = writeln!(out, "  Target VLAN: {}", run.target_vlan);
    out.push('\n');

    let _ = writeln!(out, "Overall Result: {}", run.outcome());
    out.push('\n');

    let _ = writeln!(out, "Detailed Results:");
    let _ = writeln!(out, "  Final Phase: {}", run.phase);
    let _ = writeln!(out, "  Changes Applied: {}", yes_no(run.changes_applied));
    let _ = writeln!(out, "  Rollback Performed: {}", yes_no(run.rollback_performed));
    out.push('\n');

    if !run.errors.is_empty() {
        let _ = writeln!(out, "Errors:");
        for error in &run.errors {
            let _ = writeln!(out, "  - {error}");
        }
        out.push('\n');
    }

    if !run.warnings.is_empty() {
        let _ = writeln!(out, "Warnings:");
        for warning in &run.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{rule}");
    out
}

// ============================================================================
// Markdown test report
// ============================================================================

/// Markdown test report, including the per-port comparison when the run got
/// as far as the side-effect check.
pub fn render_markdown(run: &TestRun) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# VLAN Change Test Report\n");
    let _ = writeln!(out, "**Test ID**: {}", run.test_id);
    let _ = writeln!(out, "**Start Time**: {}", run.start_time.to_rfc3339());
    if let Some(end) = run.end_time {
        let _ = writeln!(out, "**End Time**: {}", end.to_rfc3339());
    }
    let _ = writeln!(out, "**Result**: {}\n", run.outcome());

    let _ = writeln!(out, "## Test Configuration\n");
    let _ = writeln!(out, "- **Target Device**: {}", run.target_device);
    let _ = writeln!(out, "- **Target Interface**: {}", run.target_interface);
    let _ = writeln!(out, "- **Original VLAN**: {}", or_unknown(run.original_vlan.as_deref()));
    let _ = writeln!(out, "- **Target VLAN**: {}", run.target_vlan);
    if let Some(voice) = &run.voice_vlan {
        let _ = writeln!(out, "- **Voice VLAN**: {voice}");
    }
    out.push('\n');

    let _ = writeln!(out, "## Test Results\n");
    let _ = writeln!(out, "- **Final Phase**: {}", run.phase);
    let _ = writeln!(out, "- **Changes Applied**: {}", yes_no(run.changes_applied));
    let rollback = match &run.rollback {
        RollbackOutcome::NotAttempted => "Not attempted".to_string(),
        RollbackOutcome::Succeeded => "Succeeded".to_string(),
        RollbackOutcome::Failed { reason } => format!("Failed ({reason})"),
    };
    let _ = writeln!(out, "- **Rollback**: {rollback}\n");

    if !run.errors.is_empty() {
        let _ = writeln!(out, "## Errors\n");
        for error in &run.errors {
            let _ = writeln!(out, "- {error}");
        }
        out.push('\n');
    }

    if !run.warnings.is_empty() {
        let _ = writeln!(out, "## Warnings\n");
        for warning in &run.warnings {
            let _ = writeln!(out, "- {warning}");
        }
        out.push('\n');
    }

    if let Some(delta) = &run.delta {
        let _ = writeln!(out, "## Detailed Comparison\n");
        render_delta_markdown(&mut out, delta);
    }

    out
}

fn render_delta_markdown(out: &mut String, delta: &Delta) {
    for device in &delta.added_devices {
        let _ = writeln!(out, "- Device **{device}** appeared\n");
    }
    for device in &delta.removed_devices {
        let _ = writeln!(out, "- Device **{device}** missing\n");
    }

    let mut any_ports = false;
    for (device, changes) in &delta.device_changes {
        if changes.port_changes.is_empty() {
            continue;
        }
        any_ports = true;
        let _ = writeln!(out, "### {device}\n");
        let _ = writeln!(out, "#### Port Changes\n");
        for (port, change) in &changes.port_changes {
            let _ = writeln!(out, "**{port}**:");
            match change {
                PortChange::Presence { .. } if change.is_added() => {
                    let _ = writeln!(out, "- added");
                }
                PortChange::Presence { .. } => {
                    let _ = writeln!(out, "- removed");
                }
                PortChange::Modified { config_changes } => {
                    for (field, fc) in config_changes {
                        let _ = writeln!(
                            out,
                            "- {field}: {} → {}",
                            display_value(&fc.before),
                            display_value(&fc.after)
                        );
                    }
                }
            }
            out.push('\n');
        }
    }

    if !any_ports && delta.added_devices.is_empty() && delta.removed_devices.is_empty() {
        let _ = writeln!(out, "No device changes detected.\n");
    }
}

// ============================================================================
// JSON test report
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub report_type: &'static str,
    pub version: &'static str,
    pub generated_at: DateTime<Local>,
    pub test_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestConfiguration {
    pub target_device: String,
    pub target_interface: String,
    pub original_vlan: Option<String>,
    pub target_vlan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_vlan: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestExecution {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub success: bool,
    pub outcome: RunOutcome,
    pub phase: String,
    pub changes_applied: bool,
    pub rollback_performed: bool,
    pub rollback: RollbackOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Issues {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    /// Latest device capture time in the snapshot
    pub timestamp: Option<DateTime<Utc>>,
    pub device_count: usize,
    pub devices: Vec<String>,
}

impl AuditSummary {
    pub fn from_snapshot(snapshot: &AuditSnapshot) -> Self {
        Self {
            timestamp: snapshot.iter().map(|(_, d)| d.timestamp).max(),
            device_count: snapshot.len(),
            devices: snapshot.device_names().map(str::to_string).collect(),
        }
    }
}

/// Machine-readable test report.
#[derive(Debug, Clone, Serialize)]
pub struct TestReportJson {
    pub metadata: ReportMetadata,
    pub test_configuration: TestConfiguration,
    pub test_execution: TestExecution,
    pub issues: Issues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_change_audit: Option<AuditSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_change_audit: Option<AuditSummary>,
}

impl TestReportJson {
    pub fn from_run(run: &TestRun) -> Self {
        Self {
            metadata: ReportMetadata {
                report_type: "network_vlan_test",
                version: REPORT_VERSION,
                generated_at: Local::now(),
                test_id: run.test_id.clone(),
            },
            test_configuration: TestConfiguration {
                target_device: run.target_device.clone(),
                target_interface: run.target_interface.clone(),
                original_vlan: run.original_vlan.clone(),
                target_vlan: run.target_vlan.clone(),
                voice_vlan: run.voice_vlan.clone(),
            },
            test_execution: TestExecution {
                start_time: run.start_time,
                end_time: run.end_time,
                success: run.success,
                outcome: run.outcome(),
                phase: run.phase.to_string(),
                changes_applied: run.changes_applied,
                rollback_performed: run.rollback_performed,
                rollback: run.rollback.clone(),
            },
            issues: Issues {
                errors: run.errors.clone(),
                warnings: run.warnings.clone(),
            },
            pre_change_audit: run.pre_audit.as_ref().map(AuditSummary::from_snapshot),
            post_change_audit: run.post_audit.as_ref().map(AuditSummary::from_snapshot),
        }
    }
}

/// Where [`write_test_reports`] put its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Writes `test_report_<id>.md` and `test_report_<id>.json` into `dir`.
pub fn write_test_reports(run: &TestRun, dir: &Path) -> Result<ReportPaths> {
    fs::create_dir_all(dir)?;
    let markdown = dir.join(format!("test_report_{}.md", run.test_id));
    let json = dir.join(format!("test_report_{}.json", run.test_id));

    fs::write(&markdown, render_markdown(run))?;
    let body = serde_json::to_string_pretty(&TestReportJson::from_run(run))?;
    fs::write(&json, body + "\n")?;

    Ok(ReportPaths { markdown, json })
}

// ============================================================================
// Audit report
// ============================================================================

/// Markdown report of a fleet audit.
pub fn render_audit_markdown(snapshot: &AuditSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Network Audit Report\n");
    let _ = writeln!(out, "Generated: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let total_vlans: usize = snapshot.iter().map(|(_, d)| d.vlans.len()).sum();
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- **Devices Audited**: {}", snapshot.len());
    let _ = writeln!(out, "- **Total Ports**: {}", snapshot.port_count());
    let _ = writeln!(out, "- **Total VLANs**: {total_vlans}\n");

    for (name, device) in snapshot.iter() {
        let _ = writeln!(out, "## Device: {name}\n");
        let _ = writeln!(out, "- **Hostname**: {}", device.hostname);
        let _ = writeln!(out, "- **IP Address**: {}", device.ip_address);
        let _ = writeln!(out, "- **Device Type**: {}", device.device_type);
        let _ = writeln!(out, "- **Audit Time**: {}", device.timestamp.to_rfc3339());
        let _ = writeln!(out, "- **Ports**: {}", device.ports.len());
        let _ = writeln!(out, "- **VLANs**: {}", device.vlans.len());
        let _ = writeln!(out, "- **Port-Channels**: {}\n", device.portchannels.len());

        if device.ports.is_empty() {
            continue;
        }
        let _ = writeln!(out, "### Port Summary\n");
        let _ = writeln!(out, "| Interface | Status | Mode | Access VLAN | Voice VLAN |");
        let _ = writeln!(out, "|-----------|--------|------|-------------|------------|");
        for port in device.ports.values() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                port.interface, port.operational_status, port.mode, port.access_vlan, port.voice_vlan
            );
        }
        out.push('\n');
    }

    out
}
