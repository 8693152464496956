//! CLI module for vlanprobe
//!
//! Argument parsing and subcommand dispatch. Each subcommand lives in
//! [`commands`] as an `XArgs` struct with an `execute` method.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// vlanprobe - validate switch-port VLAN changes end to end
///
/// Audits the fleet, applies an access VLAN change to one port, audits again,
/// proves nothing else moved, and puts the port back.
#[derive(Parser, Debug, Clone)]
#[command(name = "vlanprobe")]
#[command(author = "vlanprobe Contributors")]
#[command(version)]
#[command(about = "Validate switch-port VLAN changes end to end", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (TOML or YAML)
    #[arg(short = 'c', long, global = true, env = "VLANPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device inventory file (overrides the configured path)
    #[arg(short = 'd', long, global = true)]
    pub devices: Option<PathBuf>,

    /// Test target file (overrides the configured path)
    #[arg(short = 't', long, global = true)]
    pub targets: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the full VLAN change test against the configured target
    Run(commands::run::RunArgs),

    /// Check prerequisites and device reachability without changing anything
    Validate(commands::validate::ValidateArgs),

    /// Capture the whole fleet and save the snapshot
    Audit(commands::audit::AuditArgs),

    /// Compare two saved audit snapshots
    Compare(commands::compare::CompareArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
