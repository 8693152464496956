//! Device inventory and test target file.
//!
//! This module covers everything the run needs to know before it touches a
//! device:
//! - Loading the device inventory (`devices.yml`)
//! - Loading the test target (`targets.yml`)
//! - VLAN id and interface name validation and normalization
//! - Credentials (see [`credentials`])

pub mod credentials;

pub use credentials::{Credentials, CredentialsBuilder, Login};

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default device type tag when inventory leaves it out.
pub const DEFAULT_DEVICE_TYPE: &str = "cisco_ios";

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Short interface prefixes and their canonical long forms.
const INTERFACE_EXPANSIONS: &[(&str, &str)] = &[
    ("Gi", "GigabitEthernet"),
    ("Fa", "FastEthernet"),
    ("Te", "TenGigabitEthernet"),
    ("Et", "Ethernet"),
    ("Po", "Port-channel"),
];

static INTERFACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(GigabitEthernet|FastEthernet|TenGigabitEthernet|Ethernet|Gi|Fa|Te|Et)\d+/\d+(/\d+)?$",
    )
    .expect("Invalid interface regex")
});

// ============================================================================
// VLAN identifiers
// ============================================================================

/// A VLAN id in 1-4094, held in canonical decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "VlanValue", into = "String")]
pub struct VlanId(String);

impl VlanId {
    /// Lowest assignable VLAN.
    pub const MIN: u16 = 1;
    /// Highest assignable VLAN.
    pub const MAX: u16 = 4094;

    /// Parses a VLAN id, stripping leading zeros.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidVlan(value.to_string()));
        }
        let n: u16 = trimmed
            .parse()
            .map_err(|_| Error::InvalidVlan(value.to_string()))?;
        if !(Self::MIN..=Self::MAX).contains(&n) {
            return Err(Error::InvalidVlan(value.to_string()));
        }
        Ok(Self(n.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<VlanId> for String {
    fn from(v: VlanId) -> Self {
        v.0
    }
}

impl TryFrom<VlanValue> for VlanId {
    type Error = Error;

    fn try_from(value: VlanValue) -> Result<Self> {
        VlanId::parse(&value.to_string())
    }
}

/// A VLAN as written in YAML: either `20` or `"20"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VlanValue {
    Number(i64),
    Text(String),
}

impl fmt::Display for VlanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VlanValue::Number(n) => write!(f, "{n}"),
            VlanValue::Text(s) => f.write_str(s),
        }
    }
}

/// Returns true if `vlan` is a valid VLAN id.
pub fn validate_vlan_id(vlan: &str) -> bool {
    VlanId::parse(vlan).is_ok()
}

// ============================================================================
// Interface names
// ============================================================================

/// Returns true if `name` is a recognized Ethernet interface name.
pub fn validate_interface_name(name: &str) -> bool {
    INTERFACE_REGEX.is_match(name)
}

/// Expands a short interface name to its canonical form.
///
/// `Gi0/1` becomes `GigabitEthernet0/1`. Names already in long form, and
/// names with no known prefix, are returned unchanged.
pub fn normalize_interface_name(name: &str) -> String {
    let name = name.trim();
    for (short, long) in INTERFACE_EXPANSIONS {
        if let Some(rest) = strip_prefix_ignore_case(name, short) {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                return format!("{long}{rest}");
            }
        }
        if let Some(rest) = strip_prefix_ignore_case(name, long) {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                return format!("{long}{rest}");
            }
        }
    }
    name.to_string()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

// ============================================================================
// Device inventory
// ============================================================================

/// One device as listed in inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Management address
    pub host: String,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_device_type() -> String {
    DEFAULT_DEVICE_TYPE.to_string()
}

impl DeviceEntry {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            device_type: default_device_type(),
            port: None,
        }
    }

    pub fn ssh_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }
}

/// The fleet, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    devices: IndexMap<String, DeviceEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `devices:` inventory from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::inventory_load(path, e.to_string()))?;
        Self::from_yaml(&content).map_err(|e| Error::inventory_load(path, e.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let inventory: Inventory = serde_yaml::from_str(content)?;
        Ok(inventory)
    }

    pub fn with_device(mut self, name: impl Into<String>, entry: DeviceEntry) -> Self {
        self.devices.insert(name.into(), entry);
        self
    }

    /// Sets `port` on every device that does not name its own.
    pub fn with_default_port(mut self, port: u16) -> Self {
        for entry in self.devices.values_mut() {
            entry.port.get_or_insert(port);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&DeviceEntry> {
        self.devices.get(name)
    }

    /// Like [`get`](Self::get), but a missing device is an error.
    pub fn device(&self, name: &str) -> Result<&DeviceEntry> {
        self.get(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceEntry)> {
        self.devices.iter()
    }
}

// ============================================================================
// Test target
// ============================================================================

/// The `target:` block of a targets file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
}

/// A targets file as written, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(default)]
    pub target: TargetRef,
    #[serde(default)]
    pub test_vlan: Option<VlanValue>,
    #[serde(default)]
    pub voice_vlan: Option<VlanValue>,
}

impl TargetSpec {
    /// Load a targets file from YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::inventory_load(path, e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| Error::inventory_load(path, e.to_string()))
    }

    /// Validates against `inventory` and produces a [`TestTarget`].
    ///
    /// All problems are reported together in [`Error::Prerequisites`].
    pub fn resolve(&self, inventory: &Inventory) -> Result<TestTarget> {
        let problems = validate_prerequisites(inventory, self);
        if !problems.is_empty() {
            return Err(Error::Prerequisites(problems));
        }

        let device = self.target.device.clone().unwrap_or_default();
        let interface = normalize_interface_name(self.target.interface.as_deref().unwrap_or(""));
        let test_vlan = match &self.test_vlan {
            Some(v) => VlanId::try_from(v.clone())?,
            None => return Err(Error::Prerequisites(vec![missing_vlan()])),
        };
        let voice_vlan = self
            .voice_vlan
            .clone()
            .map(VlanId::try_from)
            .transpose()?;

        Ok(TestTarget {
            device,
            interface,
            test_vlan,
            voice_vlan,
        })
    }
}

fn missing_vlan() -> String {
    "Test VLAN not specified in configuration".to_string()
}

/// Lists every reason the target cannot be tested against `inventory`.
pub fn validate_prerequisites(inventory: &Inventory, spec: &TargetSpec) -> Vec<String> {
    let mut errors = Vec::new();

    match spec.target.device.as_deref() {
        None | Some("") => errors.push("Target device not specified in configuration".to_string()),
        Some(device) if !inventory.contains(device) => {
            errors.push(format!(
                "Target device '{device}' not found in device inventory"
            ));
        }
        Some(_) => {}
    }

    match spec.target.interface.as_deref() {
        None | Some("") => {
            errors.push("Target interface not specified in configuration".to_string());
        }
        Some(iface) if !validate_interface_name(iface) => {
            errors.push(format!("Invalid interface name format: '{iface}'"));
        }
        Some(_) => {}
    }

    match &spec.test_vlan {
        None => errors.push(missing_vlan()),
        Some(v) if !validate_vlan_id(&v.to_string()) => {
            errors.push(format!("Invalid VLAN ID: '{v}' (must be 1-4094)"));
        }
        Some(_) => {}
    }

    if let Some(v) = &spec.voice_vlan {
        if !validate_vlan_id(&v.to_string()) {
            errors.push(format!("Invalid voice VLAN ID: '{v}' (must be 1-4094)"));
        }
    }

    errors
}

/// A validated test target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTarget {
    /// Inventory name of the device
    pub device: String,
    /// Canonical interface name
    pub interface: String,
    pub test_vlan: VlanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_vlan: Option<VlanId>,
}

impl TestTarget {
    pub fn new(device: impl Into<String>, interface: &str, test_vlan: VlanId) -> Self {
        Self {
            device: device.into(),
            interface: normalize_interface_name(interface),
            test_vlan,
            voice_vlan: None,
        }
    }

    pub fn with_voice_vlan(mut self, voice_vlan: VlanId) -> Self {
        self.voice_vlan = Some(voice_vlan);
        self
    }
}
