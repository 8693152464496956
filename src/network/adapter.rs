//! Device state capture over a CLI session.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::ios;
use crate::connection::{ConnectionError, DeviceSession, SessionFactory, SessionTarget};
use crate::inventory::{Credentials, DeviceEntry};
use crate::state::{DeviceState, PortConfig, UNKNOWN};
use crate::traits::{CaptureError, CapturedDevice, DeviceAdapter};

/// Captures Cisco IOS switches by scraping show command output.
#[derive(Debug, Clone)]
pub struct IosDeviceAdapter {
    factory: Arc<dyn SessionFactory>,
}

impl IosDeviceAdapter {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl DeviceAdapter for IosDeviceAdapter {
    #[instrument(skip(self, device, credentials), fields(host = %device.host))]
    async fn capture(
        &self,
        name: &str,
        device: &DeviceEntry,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<CapturedDevice, CaptureError> {
        let target = SessionTarget::new(&device.host)
            .with_port(device.ssh_port())
            .with_timeout(timeout);

        let session = self
            .factory
            .open(&target, credentials)
            .await
            .map_err(|e| capture_error(&e))?;

        let mut scraper = Scraper {
            session,
            warnings: Vec::new(),
        };
        let result = scraper.device_state(name, device).await;

        if let Err(e) = scraper.session.close().await {
            debug!(device = %name, error = %e, "Error closing session");
        }

        result.map(|state| CapturedDevice {
            state,
            warnings: scraper.warnings,
        })
    }
}

fn capture_error(err: &ConnectionError) -> CaptureError {
    if err.is_unreachable() {
        CaptureError::Unreachable(err.to_string())
    } else {
        CaptureError::ConnectionFailed(err.to_string())
    }
}

/// One capture in progress.
struct Scraper {
    session: Box<dyn DeviceSession>,
    warnings: Vec<String>,
}

impl Scraper {
    /// Runs `command`. A refused or unreadable command becomes a warning and
    /// `None`; a timeout or a dropped session fails the whole capture.
    async fn run(&mut self, command: &str) -> Result<Option<String>, CaptureError> {
        match self.session.send_command(command).await {
            Ok(output) => Ok(Some(output)),
            Err(e @ (ConnectionError::Timeout(_) | ConnectionError::ConnectionClosed)) => {
                Err(capture_error(&e))
            }
            Err(e) => {
                warn!(command = %command, error = %e, "Command failed");
                self.warnings.push(format!("'{command}' failed: {e}"));
                Ok(None)
            }
        }
    }

    async fn device_state(
        &mut self,
        name: &str,
        device: &DeviceEntry,
    ) -> Result<DeviceState, CaptureError> {
        let hostname = self
            .run(ios::SHOW_HOSTNAME)
            .await?
            .and_then(|out| ios::parse_hostname(&out))
            .unwrap_or_else(|| name.to_string());

        let mut state = DeviceState::new(hostname, &device.host, &device.device_type);

        let interfaces = self.discover_interfaces().await?;
        debug!(device = %name, interfaces = interfaces.len(), "Discovered interfaces");

        let portchannels = match self.run(ios::SHOW_ETHERCHANNEL_SUMMARY).await? {
            Some(out) => ios::parse_etherchannel_summary(&out),
            None => BTreeMap::new(),
        };
        // None when CDP could not be read, so every neighbor stays unknown
        let neighbors = self
            .run(ios::SHOW_CDP_NEIGHBORS)
            .await?
            .map(|out| ios::parse_cdp_neighbors(&out));

        for interface in interfaces {
            let mut port = self.port_config(&interface).await?;
            if let Some(neighbors) = &neighbors {
                port.cdp_neighbor = neighbors.get(&interface).cloned();
            }
            if port.portchannel_member.is_none() {
                port.portchannel_member = portchannels
                    .iter()
                    .find(|(_, members)| members.contains(&interface))
                    .map(|(po, _)| po.clone());
            }
            state = state.with_port(port);
        }

        if let Some(out) = self.run(ios::SHOW_VLAN_BRIEF).await? {
            for vlan in ios::parse_vlan_brief(&out) {
                state = state.with_vlan(vlan);
            }
        }
        for (po, members) in portchannels {
            state = state.with_portchannel(po, members);
        }

        Ok(state)
    }

    async fn discover_interfaces(&mut self) -> Result<Vec<String>, CaptureError> {
        for command in ios::DISCOVERY_COMMANDS {
            if let Some(out) = self.run(command).await? {
                return Ok(ios::parse_interface_list(&out));
            }
        }
        self.warnings
            .push("interface discovery failed, no ports captured".to_string());
        Ok(Vec::new())
    }

    async fn port_config(&mut self, interface: &str) -> Result<PortConfig, CaptureError> {
        let mut port = PortConfig::unknown(interface);

        if let Some(out) = self.run(&ios::show_switchport(interface)).await? {
            let info = ios::parse_switchport(&out);
            if let Some(mode) = info.mode {
                port.mode = mode;
            }
            port.access_vlan = info.access_vlan.unwrap_or_else(|| UNKNOWN.to_string());
            port.voice_vlan = info.voice_vlan.unwrap_or_else(|| UNKNOWN.to_string());
        }

        let mut running_speed = None;
        let mut running_duplex = None;
        if let Some(out) = self.run(&ios::show_running_interface(interface)).await? {
            let cfg = ios::parse_running_interface(&out, interface);
            port.description = cfg.description;
            port.portfast = Some(cfg.portfast);
            port.portchannel_member = cfg.channel_group;
            running_speed = Some(cfg.speed);
            running_duplex = Some(cfg.duplex);
            if cfg.shutdown {
                port.admin_status = "down".to_string();
            }
        }

        if let Some(out) = self.run(&ios::show_status(interface)).await? {
            match ios::parse_interface_status(&out, interface) {
                Some(status) => {
                    if port.admin_status == UNKNOWN {
                        port.admin_status = status.admin_status;
                    }
                    port.operational_status = status.operational_status;
                    running_speed = running_speed.or(status.speed);
                    running_duplex = running_duplex.or(status.duplex);
                }
                None => self
                    .warnings
                    .push(format!("{interface}: no status row in output")),
            }
        }

        port.speed = running_speed.unwrap_or_else(|| UNKNOWN.to_string());
        port.duplex = running_duplex.unwrap_or_else(|| UNKNOWN.to_string());
        Ok(port)
    }
}
