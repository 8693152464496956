//! Shared test utilities and fixtures for the vlanprobe test suite.
//!
//! This module provides:
//! - A simulated switch fleet ([`MockNetwork`]) shared by the mocks
//! - [`MockAdapter`], a `DeviceAdapter` that reads the simulated fleet
//! - [`MockApplier`], a `ChangeApplier` that writes to it and records calls
//! - Fixture builders for inventories, devices and orchestrators
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use vlanprobe::inventory::{Credentials, DeviceEntry, Inventory, TestTarget, VlanId};
use vlanprobe::orchestrator::{Orchestrator, RunOptions};
use vlanprobe::state::{DeviceState, MemorySnapshotStore, PortConfig, SwitchportMode, VlanRecord};
use vlanprobe::traits::{
    ApplyError, CaptureError, CapturedDevice, ChangeApplier, ChangeRequest, DeviceAdapter,
};

// ============================================================================
// Simulated fleet
// ============================================================================

/// The devices as they "really" are. Captures read it, changes write it.
#[derive(Debug, Default)]
pub struct MockNetwork {
    devices: RwLock<HashMap<String, DeviceState>>,
    unreachable: RwLock<HashSet<String>>,
    /// Device name to the capture number (1-based) from which it fails
    fail_from: RwLock<HashMap<String, u32>>,
    captures: RwLock<HashMap<String, u32>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_device(&self, name: impl Into<String>, state: DeviceState) {
        self.devices.write().insert(name.into(), state);
    }

    /// Every capture of `name` fails as unreachable.
    pub fn set_unreachable(&self, name: impl Into<String>) {
        self.unreachable.write().insert(name.into());
    }

    /// Captures of `name` succeed until the `n`th, which and all later fail.
    pub fn fail_from_capture(&self, name: impl Into<String>, n: u32) {
        self.fail_from.write().insert(name.into(), n);
    }

    pub fn set_access_vlan(&self, device: &str, interface: &str, vlan: &str) {
        if let Some(port) = self
            .devices
            .write()
            .get_mut(device)
            .and_then(|d| d.ports.get_mut(interface))
        {
            port.access_vlan = vlan.to_string();
        }
    }

    pub fn set_voice_vlan(&self, device: &str, interface: &str, vlan: &str) {
        if let Some(port) = self
            .devices
            .write()
            .get_mut(device)
            .and_then(|d| d.ports.get_mut(interface))
        {
            port.voice_vlan = vlan.to_string();
        }
    }

    pub fn set_mode(&self, device: &str, interface: &str, mode: SwitchportMode) {
        if let Some(port) = self
            .devices
            .write()
            .get_mut(device)
            .and_then(|d| d.ports.get_mut(interface))
        {
            port.mode = mode;
        }
    }

    pub fn set_operational_status(&self, device: &str, interface: &str, status: &str) {
        if let Some(port) = self
            .devices
            .write()
            .get_mut(device)
            .and_then(|d| d.ports.get_mut(interface))
        {
            port.operational_status = status.to_string();
        }
    }

    pub fn access_vlan(&self, device: &str, interface: &str) -> Option<String> {
        self.devices
            .read()
            .get(device)
            .and_then(|d| d.ports.get(interface))
            .map(|p| p.access_vlan.clone())
    }

    pub fn capture_count(&self, device: &str) -> u32 {
        self.captures.read().get(device).copied().unwrap_or(0)
    }

    fn capture(&self, name: &str) -> Result<DeviceState, CaptureError> {
        let count = {
            let mut captures = self.captures.write();
            let count = captures.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if self.unreachable.read().contains(name) {
            return Err(CaptureError::Unreachable(format!("{name}: no route to host")));
        }
        if let Some(&n) = self.fail_from.read().get(name) {
            if count >= n {
                return Err(CaptureError::ConnectionFailed(format!(
                    "{name}: session dropped"
                )));
            }
        }

        self.devices
            .read()
            .get(name)
            .cloned()
            .map(|state| state.with_timestamp(Utc::now()))
            .ok_or_else(|| CaptureError::ConnectionFailed(format!("{name}: unknown device")))
    }
}

// ============================================================================
// Mock adapter
// ============================================================================

/// `DeviceAdapter` over a [`MockNetwork`].
#[derive(Debug)]
pub struct MockAdapter {
    network: Arc<MockNetwork>,
}

impl MockAdapter {
    pub fn new(network: Arc<MockNetwork>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl DeviceAdapter for MockAdapter {
    async fn capture(
        &self,
        name: &str,
        _device: &DeviceEntry,
        _credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<CapturedDevice, CaptureError> {
        self.network.capture(name).map(CapturedDevice::complete)
    }
}

// ============================================================================
// Mock applier
// ============================================================================

/// `ChangeApplier` over a [`MockNetwork`] that records every request.
#[derive(Debug)]
pub struct MockApplier {
    network: Arc<MockNetwork>,
    requests: RwLock<Vec<ChangeRequest>>,
    /// Fail the first apply with this error
    first_error: RwLock<Option<ApplyError>>,
    /// Fail every apply after the first
    fail_rollback: AtomicBool,
    /// First apply lands this VLAN instead of the requested one
    misapply: RwLock<Option<String>>,
    /// First apply also moves this other port
    side_effect: RwLock<Option<(String, String, String)>>,
    /// First apply also flips this other port's mode
    mode_change: RwLock<Option<(String, String, SwitchportMode)>>,
    calls: AtomicU32,
}

impl MockApplier {
    pub fn new(network: Arc<MockNetwork>) -> Self {
        Self {
            network,
            requests: RwLock::new(Vec::new()),
            first_error: RwLock::new(None),
            fail_rollback: AtomicBool::new(false),
            misapply: RwLock::new(None),
            side_effect: RwLock::new(None),
            mode_change: RwLock::new(None),
            calls: AtomicU32::new(0),
        }
    }

    pub fn fail_first_with(&self, error: ApplyError) {
        *self.first_error.write() = Some(error);
    }

    pub fn fail_rollback(&self) {
        self.fail_rollback.store(true, Ordering::SeqCst);
    }

    pub fn misapply_as(&self, vlan: impl Into<String>) {
        *self.misapply.write() = Some(vlan.into());
    }

    pub fn with_side_effect(&self, device: &str, interface: &str, vlan: &str) {
        *self.side_effect.write() =
            Some((device.to_string(), interface.to_string(), vlan.to_string()));
    }

    pub fn with_mode_change(&self, device: &str, interface: &str, mode: SwitchportMode) {
        *self.mode_change.write() = Some((device.to_string(), interface.to_string(), mode));
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChangeRequest> {
        self.requests.read().clone()
    }
}

#[async_trait]
impl ChangeApplier for MockApplier {
    async fn apply(
        &self,
        _device: &DeviceEntry,
        _credentials: &Credentials,
        request: &ChangeRequest,
        _timeout: Duration,
    ) -> Result<(), ApplyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.write().push(request.clone());

        if call == 1 {
            if let Some(err) = self.first_error.write().take() {
                return Err(err);
            }
        } else if self.fail_rollback.load(Ordering::SeqCst) {
            return Err(ApplyError::Connection {
                attempts: 3,
                message: "connection reset by peer".to_string(),
            });
        }

        let vlan = if call == 1 {
            self.misapply.read().clone().unwrap_or_else(|| request.vlan.clone())
        } else {
            request.vlan.clone()
        };
        self.network
            .set_access_vlan(&request.device_name, &request.interface, &vlan);
        if let Some(voice) = &request.voice_vlan {
            self.network
                .set_voice_vlan(&request.device_name, &request.interface, voice);
        }

        if call == 1 {
            if let Some((device, interface, vlan)) = self.side_effect.read().clone() {
                self.network.set_access_vlan(&device, &interface, &vlan);
            }
            if let Some((device, interface, mode)) = self.mode_change.read().clone() {
                self.network.set_mode(&device, &interface, mode);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const GI1: &str = "GigabitEthernet0/1";
pub const GI2: &str = "GigabitEthernet0/2";
pub const GI3: &str = "GigabitEthernet0/3";

/// A switch with two access ports in `vlan` and the usual VLAN table.
pub fn switch(hostname: &str, ip: &str, vlan: &str) -> DeviceState {
    DeviceState::new(hostname, ip, "cisco_ios")
        .with_port(PortConfig::access(GI1, vlan))
        .with_port(PortConfig::access(GI2, vlan))
        .with_vlan(VlanRecord::new("1", "default", "active"))
        .with_vlan(VlanRecord::new("10", "USERS", "active"))
        .with_vlan(VlanRecord::new("20", "TEST", "active"))
}

/// Adds `count` switches `sw1..swN` to the network and the inventory.
pub fn fleet(network: &MockNetwork, count: usize) -> Inventory {
    let mut inventory = Inventory::new();
    for i in 1..=count {
        let name = format!("sw{i}");
        let ip = format!("10.0.0.{i}");
        network.add_device(&name, switch(&name, &ip, "10"));
        inventory = inventory.with_device(&name, DeviceEntry::new(ip));
    }
    inventory
}

pub fn credentials() -> Credentials {
    Credentials::new("admin", "secret")
}

pub fn target(device: &str, interface: &str, vlan: &str) -> TestTarget {
    TestTarget::new(device, interface, VlanId::parse(vlan).unwrap())
}

/// Everything a run test needs to poke at afterwards.
pub struct Harness {
    pub network: Arc<MockNetwork>,
    pub applier: Arc<MockApplier>,
    pub store: Arc<MemorySnapshotStore>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    /// A fleet of `count` switches with every port in VLAN 10.
    pub fn new(count: usize) -> Self {
        let network = MockNetwork::new();
        let inventory = fleet(&network, count);
        Self::with_inventory(network, inventory)
    }

    pub fn with_inventory(network: Arc<MockNetwork>, inventory: Inventory) -> Self {
        let applier = Arc::new(MockApplier::new(Arc::clone(&network)));
        let store = Arc::new(MemorySnapshotStore::new());
        let orchestrator = Orchestrator::new(
            Arc::new(MockAdapter::new(Arc::clone(&network))),
            Arc::clone(&applier) as Arc<dyn ChangeApplier>,
            Arc::clone(&store) as Arc<dyn vlanprobe::state::SnapshotStore>,
            inventory,
            credentials(),
        )
        .with_options(RunOptions::default().with_settle_delay(Duration::ZERO));

        Self {
            network,
            applier,
            store,
            orchestrator,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.orchestrator = self.orchestrator.with_options(options);
        self
    }
}
