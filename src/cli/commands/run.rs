//! Run command - Execute the VLAN change test
//!
//! Loads the inventory and target, drives the orchestrator through a full
//! run, writes the reports, and maps the outcome to the exit status.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use tracing::warn;
use vlanprobe::inventory::TargetSpec;
use vlanprobe::report::{render_summary, write_test_reports, TestReportJson};

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Leave the test VLAN in place instead of rolling back
    #[arg(long)]
    pub no_cleanup: bool,

    /// Skip writing the Markdown and JSON report files
    #[arg(long)]
    pub no_report: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.output.banner("VLAN CHANGE TEST");

        let inventory = ctx.load_inventory()?;
        let targets_path = ctx.targets_path();
        ctx.output
            .info(&format!("Loading target from {}", targets_path.display()));
        let target = TargetSpec::load(&targets_path)?.resolve(&inventory)?;

        ctx.output.info(&format!(
            "Target: {}:{} -> VLAN {}",
            target.device, target.interface, target.test_vlan
        ));
        if self.no_cleanup {
            ctx.output
                .warning("Cleanup disabled - the test VLAN will be left in place");
        }

        let orchestrator = ctx.orchestrator(inventory)?;
        let options = orchestrator.options().clone().with_rollback(!self.no_cleanup);
        let orchestrator = orchestrator.with_options(options);

        let finalized = orchestrator.run(&target).await;
        let run = finalized.run();

        if !self.no_report {
            match write_test_reports(run, &ctx.config.paths.report_dir) {
                Ok(paths) => {
                    ctx.output
                        .info(&format!("Markdown report: {}", paths.markdown.display()));
                    ctx.output
                        .info(&format!("JSON report: {}", paths.json.display()));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to write test reports");
                    ctx.output
                        .warning(&format!("Failed to write test reports: {e}"));
                }
            }
        }

        if ctx.output.is_json() {
            ctx.output.document(&TestReportJson::from_run(run))?;
        } else {
            ctx.output.plain(&render_summary(run));
            ctx.output.outcome(run.outcome());
        }

        Ok(run.outcome().exit_code())
    }
}
