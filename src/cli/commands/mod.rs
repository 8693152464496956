//! Subcommands module for vlanprobe CLI
//!
//! This module contains all the subcommand implementations.

pub mod audit;
pub mod compare;
pub mod run;
pub mod validate;

use crate::cli::output::OutputFormatter;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use vlanprobe::config::Config;
use vlanprobe::connection::russh::SshSessionFactory;
use vlanprobe::connection::SessionFactory;
use vlanprobe::inventory::{Credentials, Inventory};
use vlanprobe::network::{IosChangeApplier, IosDeviceAdapter};
use vlanprobe::orchestrator::Orchestrator;
use vlanprobe::state::JsonSnapshotStore;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Inventory path given on the command line
    pub devices_path: Option<PathBuf>,
    /// Targets path given on the command line
    pub targets_path: Option<PathBuf>,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            output,
            devices_path: cli.devices.clone(),
            targets_path: cli.targets.clone(),
            verbosity: cli.verbosity(),
        }
    }

    /// Get the effective inventory path
    pub fn inventory_path(&self) -> PathBuf {
        self.devices_path
            .clone()
            .unwrap_or_else(|| self.config.paths.inventory.clone())
    }

    /// Get the effective targets path
    pub fn targets_path(&self) -> PathBuf {
        self.targets_path
            .clone()
            .unwrap_or_else(|| self.config.paths.targets.clone())
    }

    /// Load the device inventory, filling in the configured default port
    pub fn load_inventory(&self) -> Result<Inventory> {
        let path = self.inventory_path();
        self.output
            .info(&format!("Loading inventory from {}", path.display()));
        let inventory = Inventory::load(&path)?.with_default_port(self.config.connection.port);
        Ok(inventory)
    }

    /// Wire the SSH transport, IOS adapter and applier, and snapshot store
    /// into an orchestrator for `inventory`.
    pub fn orchestrator(&self, inventory: Inventory) -> Result<Orchestrator> {
        let credentials = Credentials::from_env()?;

        let factory: Arc<dyn SessionFactory> = Arc::new(
            SshSessionFactory::new().with_connect_retry(self.config.connect_retry_policy()),
        );
        let adapter = Arc::new(IosDeviceAdapter::new(Arc::clone(&factory)));
        let applier = Arc::new(
            IosChangeApplier::new(factory).with_retry(self.config.apply_retry_policy()),
        );
        let store = Arc::new(
            JsonSnapshotStore::new(&self.config.paths.state_dir).map_err(vlanprobe::Error::from)?,
        );

        Ok(Orchestrator::new(adapter, applier, store, inventory, credentials)
            .with_options(self.config.run_options()))
    }
}
