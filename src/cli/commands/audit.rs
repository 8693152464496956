//! Audit command - Capture the fleet
//!
//! Captures every inventory device once and saves the snapshot as JSON,
//! optionally with a Markdown report next to it.

use super::CommandContext;
use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use vlanprobe::report::render_audit_markdown;
use vlanprobe::state::persistence::save_snapshot_file;

/// Arguments for the audit command
#[derive(Parser, Debug, Clone)]
pub struct AuditArgs {
    /// Where to save the snapshot (default: audit_<timestamp>.json in the state directory)
    #[arg(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Also write a Markdown audit report next to the snapshot
    #[arg(long)]
    pub report: bool,
}

impl AuditArgs {
    /// Execute the audit command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.output.banner("NETWORK AUDIT");

        let inventory = ctx.load_inventory()?;
        let orchestrator = ctx.orchestrator(inventory)?;
        let capture = orchestrator.audit().await;

        let path = self.output_file.clone().unwrap_or_else(|| {
            ctx.config.paths.state_dir.join(format!(
                "audit_{}.json",
                Local::now().format("%Y%m%d_%H%M%S")
            ))
        });
        save_snapshot_file(&path, &capture.snapshot).map_err(vlanprobe::Error::from)?;

        let report_path = if self.report {
            let report_path = path.with_extension("md");
            std::fs::write(&report_path, render_audit_markdown(&capture.snapshot))?;
            Some(report_path)
        } else {
            None
        };

        if ctx.output.is_json() {
            ctx.output.document(&serde_json::json!({
                "snapshot": path,
                "report": report_path,
                "devices": capture.snapshot.len(),
                "ports": capture.snapshot.port_count(),
                "failed": capture.failed_devices(),
                "warnings": capture.warnings,
            }))?;
        } else {
            let rows: Vec<Vec<String>> = capture
                .snapshot
                .iter()
                .map(|(name, device)| {
                    vec![
                        name.to_string(),
                        device.hostname.clone(),
                        device.ports.len().to_string(),
                        device.vlans.len().to_string(),
                    ]
                })
                .collect();
            ctx.output
                .table(&["Device", "Hostname", "Ports", "VLANs"], &rows);
            ctx.output.list("Capture warnings", &capture.warnings);
            ctx.output.list(
                "Failed devices",
                &capture
                    .failed
                    .iter()
                    .map(|f| format!("{}: {}", f.device, f.reason))
                    .collect::<Vec<_>>(),
            );
            ctx.output
                .success(&format!("Snapshot saved to {}", path.display()));
            if let Some(report_path) = &report_path {
                ctx.output
                    .success(&format!("Report saved to {}", report_path.display()));
            }
        }

        Ok(if capture.failed.is_empty() { 0 } else { 1 })
    }
}
