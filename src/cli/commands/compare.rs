//! Compare command - Diff two saved audits
//!
//! Works purely on snapshot files; no device is contacted.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use vlanprobe::state::persistence::load_snapshot_file;
use vlanprobe::state::{diff, Delta, PortChange};

/// Arguments for the compare command
#[derive(Parser, Debug, Clone)]
pub struct CompareArgs {
    /// Earlier snapshot file
    pub before: PathBuf,

    /// Later snapshot file
    pub after: PathBuf,
}

impl CompareArgs {
    /// Execute the compare command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let before = load_snapshot_file(&self.before)
            .map_err(vlanprobe::Error::from)
            .with_context(|| format!("Failed to load snapshot {}", self.before.display()))?;
        let after = load_snapshot_file(&self.after)
            .map_err(vlanprobe::Error::from)
            .with_context(|| format!("Failed to load snapshot {}", self.after.display()))?;

        let delta = diff(&before, &after);

        if ctx.output.is_json() {
            ctx.output.document(&serde_json::json!({
                "before": self.before,
                "after": self.after,
                "summary": delta.summary(),
                "delta": delta,
            }))?;
            return Ok(0);
        }

        ctx.output.banner("AUDIT COMPARISON");
        if !has_significant_changes(&delta) {
            ctx.output.success("No changes detected between audits");
            return Ok(0);
        }

        let summary = delta.summary();
        ctx.output.table(
            &["Devices +", "Devices -", "Changed", "Ports +", "Ports -", "Ports ~"],
            &[vec![
                summary.added_devices.to_string(),
                summary.removed_devices.to_string(),
                summary.changed_devices.to_string(),
                summary.added_ports.to_string(),
                summary.removed_ports.to_string(),
                summary.modified_ports.to_string(),
            ]],
        );

        ctx.output.list(
            "Added devices",
            &delta.added_devices.iter().cloned().collect::<Vec<_>>(),
        );
        ctx.output.list(
            "Removed devices",
            &delta.removed_devices.iter().cloned().collect::<Vec<_>>(),
        );
        ctx.output.list("Port changes", &describe_port_changes(&delta));

        Ok(0)
    }
}

/// Capture timestamps always move; anything else counts.
fn has_significant_changes(delta: &Delta) -> bool {
    !delta.added_devices.is_empty()
        || !delta.removed_devices.is_empty()
        || delta.device_changes.values().any(|d| !d.is_metadata_only())
}

fn describe_port_changes(delta: &Delta) -> Vec<String> {
    let mut lines = Vec::new();
    for (device, interface, change) in delta.port_changes() {
        match change {
            PortChange::Presence { .. } if change.is_added() => {
                lines.push(format!("{device}:{interface} added"));
            }
            PortChange::Presence { .. } => {
                lines.push(format!("{device}:{interface} removed"));
            }
            PortChange::Modified { config_changes } => {
                for (field, fc) in config_changes {
                    lines.push(format!(
                        "{device}:{interface} {field}: {} -> {}",
                        fc.before_str().unwrap_or("-"),
                        fc.after_str().unwrap_or("-"),
                    ));
                }
            }
        }
    }
    lines
}
