//! Validate command - Pre-flight checks
//!
//! Checks the target file against the inventory, then trial-captures every
//! device. Nothing on the network is changed.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use vlanprobe::inventory::{validate_prerequisites, TargetSpec};
use vlanprobe::Error;

/// Arguments for the validate command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Only check the inventory and target files, do not contact devices
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: bool,
    devices: usize,
    problems: Vec<String>,
    unreachable: Vec<String>,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.output.banner("VALIDATE ENVIRONMENT");

        let inventory = ctx.load_inventory()?;
        let spec = TargetSpec::load(ctx.targets_path())?;

        let mut report = ValidationReport {
            valid: true,
            devices: inventory.len(),
            problems: validate_prerequisites(&inventory, &spec),
            unreachable: Vec::new(),
        };

        if report.problems.is_empty() {
            ctx.output.success("Target configuration is valid");
        } else {
            for problem in &report.problems {
                ctx.output.error(problem);
            }
        }

        if !self.offline {
            ctx.output.section("Device reachability");
            let orchestrator = ctx.orchestrator(inventory)?;
            match orchestrator.validate_environment().await {
                Ok(()) => ctx
                    .output
                    .success(&format!("All {} devices reachable", report.devices)),
                Err(Error::EnvironmentValidation { unreachable }) => {
                    ctx.output.list("Unreachable devices", &unreachable);
                    report.unreachable = unreachable;
                }
                Err(e) => return Err(e.into()),
            }
        }

        report.valid = report.problems.is_empty() && report.unreachable.is_empty();
        if ctx.output.is_json() {
            ctx.output.document(&report)?;
        }

        if report.valid {
            Ok(0)
        } else if !report.problems.is_empty() {
            Ok(Error::Prerequisites(report.problems).exit_code())
        } else {
            Ok(Error::EnvironmentValidation {
                unreachable: report.unreachable,
            }
            .exit_code())
        }
    }
}
