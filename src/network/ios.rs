//! Cisco IOS CLI output parsers.
//!
//! Every function here is pure: raw command text in, structured fields out.
//! Interface names are returned in canonical long form and VLAN ids in
//! canonical decimal form, which is what the differ expects.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::inventory::{normalize_interface_name, validate_interface_name};
use crate::state::{SwitchportMode, VlanRecord, NO_VOICE_VLAN};

// ============================================================================
// Commands
// ============================================================================

pub const SHOW_HOSTNAME: &str = "show running-config | include hostname";
pub const SHOW_VLAN_BRIEF: &str = "show vlan brief";
pub const SHOW_ETHERCHANNEL_SUMMARY: &str = "show etherchannel summary";
pub const SHOW_CDP_NEIGHBORS: &str = "show cdp neighbors";

/// Interface discovery commands, tried in order until one succeeds.
pub const DISCOVERY_COMMANDS: &[&str] = &[
    "show ip interface brief",
    "show interface status",
    "show interface summary",
];

pub fn show_switchport(interface: &str) -> String {
    format!("show interface {interface} switchport")
}

pub fn show_status(interface: &str) -> String {
    format!("show interface {interface} status")
}

pub fn show_running_interface(interface: &str) -> String {
    format!("show running-config interface {interface}")
}

// ============================================================================
// Helpers
// ============================================================================

static PORTCHANNEL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Po(\d+)(\(\w+\))?$").expect("Invalid port-channel regex"));

static MEMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+\d+(?:/\d+)+)\(\w+\)$").expect("Invalid member regex")
});

static VLAN_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i):\s*(\d+|none)\b").expect("Invalid VLAN field regex"));

/// Interface names that are never switch ports.
const VIRTUAL_PREFIXES: &[&str] = &["vlan", "loopback", "tunnel", "mgmt", "port-channel", "null"];

/// Link states printed in the Status column of `show interface status`.
const STATUS_WORDS: &[&str] = &[
    "connected",
    "notconnect",
    "disabled",
    "err-disabled",
    "inactive",
    "monitoring",
    "suspended",
    "sfpAbsent",
    "xcvrAbsent",
    "noOperMem",
    "faulty",
];

/// Abbreviations used in CDP tables, where the number follows a space.
const CDP_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Gig", "GigabitEthernet"),
    ("Fas", "FastEthernet"),
    ("Ten", "TenGigabitEthernet"),
    ("Eth", "Ethernet"),
];

/// Strips leading zeros from a numeric VLAN id; anything else is returned
/// lowercased (`none`, `unknown`).
pub fn canonical_vlan(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<u32>() {
        Ok(n) => n.to_string(),
        Err(_) => raw.to_ascii_lowercase(),
    }
}

fn is_virtual(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    VIRTUAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn as_port_name(token: &str) -> Option<String> {
    if is_virtual(token) || !validate_interface_name(token) {
        return None;
    }
    Some(normalize_interface_name(token))
}

// ============================================================================
// Device-level parsers
// ============================================================================

/// Hostname from `show running-config | include hostname`.
pub fn parse_hostname(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("hostname "))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// Physical switch ports from any of the [`DISCOVERY_COMMANDS`].
///
/// Sorted, de-duplicated, canonical names.
pub fn parse_interface_list(output: &str) -> Vec<String> {
    let mut ports: Vec<String> = output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(as_port_name)
        .collect();
    ports.sort();
    ports.dedup();
    ports
}

/// VLAN table from `show vlan brief`.
pub fn parse_vlan_brief(output: &str) -> Vec<VlanRecord> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(|c: char| c.is_ascii_digit()))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let name = parts.next()?;
            let status = parts.next().unwrap_or("unknown");
            Some(VlanRecord::new(canonical_vlan(id), name, status))
        })
        .collect()
}

/// Port-channel membership from `show etherchannel summary`.
///
/// Keys are `Po<N>`; members are canonical interface names in listed order.
/// Member lists that wrap onto continuation lines are joined.
pub fn parse_etherchannel_summary(output: &str) -> BTreeMap<String, Vec<String>> {
    let mut channels: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("Flags:") || trimmed.starts_with("Group") {
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        if let Some(po) = tokens.iter().find_map(|t| {
            PORTCHANNEL_REGEX
                .captures(t)
                .map(|c| format!("Po{}", &c[1]))
        }) {
            channels.entry(po.clone()).or_default();
            current = Some(po);
        } else if !tokens.iter().all(|t| MEMBER_REGEX.is_match(t)) {
            current = None;
            continue;
        }

        if let Some(po) = &current {
            let members = channels.entry(po.clone()).or_default();
            members.extend(
                tokens
                    .iter()
                    .filter_map(|t| MEMBER_REGEX.captures(t))
                    .map(|c| normalize_interface_name(&c[1])),
            );
        }
    }

    channels
}

/// Local interface to neighbor device id from `show cdp neighbors`.
pub fn parse_cdp_neighbors(output: &str) -> BTreeMap<String, String> {
    let mut neighbors = BTreeMap::new();
    let mut in_table = false;
    let mut pending_id: Option<String> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Device ID") {
            in_table = true;
            continue;
        }
        if !in_table || trimmed.is_empty() || trimmed.starts_with("Total cdp") {
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        // Long device ids are printed alone, with the row on the next line.
        if tokens.len() == 1 {
            pending_id = Some(tokens[0].to_string());
            continue;
        }

        let (device_id, rest) = match pending_id.take() {
            Some(id) if cdp_interface(&tokens).is_some() => (id, &tokens[..]),
            _ => (tokens[0].to_string(), &tokens[1..]),
        };
        if let Some(local) = cdp_interface(rest) {
            neighbors.insert(local, device_id);
        }
    }

    neighbors
}

/// Reads an interface written as `Gig 0/1` or `Gi0/1` from the front of
/// `tokens`.
fn cdp_interface(tokens: &[&str]) -> Option<String> {
    let first = tokens.first()?;
    if let Some(name) = as_port_name(first) {
        return Some(name);
    }
    let number = tokens.get(1)?;
    if !number.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    CDP_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| first.eq_ignore_ascii_case(abbr))
        .map(|(_, long)| format!("{long}{number}"))
}

// ============================================================================
// Port-level parsers
// ============================================================================

/// Fields from `show interface X switchport`; `None` where absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchportInfo {
    pub mode: Option<SwitchportMode>,
    pub access_vlan: Option<String>,
    pub voice_vlan: Option<String>,
}

pub fn parse_switchport(output: &str) -> SwitchportInfo {
    let mut info = SwitchportInfo::default();

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Administrative Mode:") {
            info.mode = rest.parse::<SwitchportMode>().ok();
        } else if line.starts_with("Access Mode VLAN:") {
            info.access_vlan = vlan_field(line);
        } else if line.starts_with("Voice VLAN:") {
            info.voice_vlan = vlan_field(line);
        }
    }

    info
}

fn vlan_field(line: &str) -> Option<String> {
    VLAN_FIELD_REGEX
        .captures(line)
        .map(|c| canonical_vlan(&c[1]))
        .or_else(|| line.split_whitespace().last().map(canonical_vlan))
}

/// Fields from `show interface X status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub operational_status: String,
    pub admin_status: String,
    pub duplex: Option<String>,
    pub speed: Option<String>,
}

/// Finds the row for `interface` and reads its Status/Duplex/Speed columns.
///
/// The Name column is free text, so the row is anchored on the first token
/// that is a known link state rather than on column position.
pub fn parse_interface_status(output: &str, interface: &str) -> Option<InterfaceStatus> {
    let wanted = normalize_interface_name(interface);

    output.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let first = tokens.first()?;
        if normalize_interface_name(first) != wanted {
            return None;
        }
        let idx = tokens.iter().position(|t| STATUS_WORDS.contains(t))?;
        let oper = tokens[idx];
        let admin = if oper == "disabled" { "down" } else { "up" };
        // Status, Vlan, Duplex, Speed, Type
        Some(InterfaceStatus {
            operational_status: oper.to_string(),
            admin_status: admin.to_string(),
            duplex: tokens.get(idx + 2).map(|s| (*s).to_string()),
            speed: tokens.get(idx + 3).map(|s| (*s).to_string()),
        })
    })
}

/// Fields from `show running-config interface X`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningInterfaceConfig {
    pub description: String,
    pub portfast: bool,
    pub speed: String,
    pub duplex: String,
    pub shutdown: bool,
    /// `Po<N>` when a `channel-group` line is present
    pub channel_group: Option<String>,
}

impl Default for RunningInterfaceConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            portfast: false,
            speed: "auto".to_string(),
            duplex: "auto".to_string(),
            shutdown: false,
            channel_group: None,
        }
    }
}

pub fn parse_running_interface(output: &str, interface: &str) -> RunningInterfaceConfig {
    let wanted = normalize_interface_name(interface);
    let mut config = RunningInterfaceConfig::default();
    let mut in_interface = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix("interface ") {
            if in_interface {
                break;
            }
            in_interface = normalize_interface_name(name) == wanted;
            continue;
        }
        if !in_interface {
            continue;
        }
        if trimmed == "end" || (trimmed.starts_with('!') && !line.starts_with(' ')) {
            break;
        }

        if let Some(desc) = trimmed.strip_prefix("description ") {
            config.description = desc.to_string();
        } else if trimmed.starts_with("spanning-tree portfast") && !trimmed.contains("disable") {
            config.portfast = true;
        } else if let Some(speed) = trimmed.strip_prefix("speed ") {
            config.speed = speed.trim().to_string();
        } else if let Some(duplex) = trimmed.strip_prefix("duplex ") {
            config.duplex = duplex.trim().to_string();
        } else if trimmed == "shutdown" {
            config.shutdown = true;
        } else if let Some(rest) = trimmed.strip_prefix("channel-group ") {
            config.channel_group = rest.split_whitespace().next().map(|n| format!("Po{n}"));
        }
    }

    config
}

// ============================================================================
// Change commands
// ============================================================================

/// Configuration lines that make `interface` an access port in `vlan`.
pub fn access_vlan_commands(interface: &str, vlan: &str, voice_vlan: Option<&str>) -> Vec<String> {
    let mut lines = vec![
        format!("default interface {interface}"),
        format!("interface {interface}"),
        "switchport mode access".to_string(),
        format!("switchport access vlan {vlan}"),
    ];
    if let Some(voice) = voice_vlan.filter(|v| *v != NO_VOICE_VLAN) {
        lines.push(format!("switchport voice vlan {voice}"));
    }
    lines.push("spanning-tree portfast".to_string());
    lines.push("no shutdown".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_INT_BRIEF: &str = "\
Interface              IP-Address      OK? Method Status                Protocol
Vlan1                  10.0.0.2        YES NVRAM  up                    up
GigabitEthernet0/2     unassigned      YES unset  down                  down
GigabitEthernet0/1     unassigned      YES unset  up                    up
Loopback0              1.1.1.1         YES NVRAM  up                    up
";

    const SWITCHPORT: &str = "\
Name: Gi0/1
Switchport: Enabled
Administrative Mode: static access
Operational Mode: static access
Access Mode VLAN: 10 (VLAN0010)
Trunking Native Mode VLAN: 1 (default)
Voice VLAN: none
";

    const STATUS: &str = "\
Port      Name               Status       Vlan       Duplex  Speed Type
Gi0/1     Desk 12 phone      connected    10         a-full  a-100 10/100/1000BaseTX
";

    const RUNNING: &str = "\
Building configuration...

Current configuration : 150 bytes
!
interface GigabitEthernet0/1
 description Desk 12 phone
 switchport access vlan 10
 switchport mode access
 spanning-tree portfast edge
 channel-group 3 mode active
end
";

    const VLAN_BRIEF: &str = "\
VLAN Name                             Status    Ports
---- -------------------------------- --------- -------------------------------
1    default                          active    Gi0/3, Gi0/4
10   USERS                            active    Gi0/1
20   VOICE                            active
1002 fddi-default                     act/unsup
";

    const ETHERCHANNEL: &str = "\
Flags:  D - down        P - bundled in port-channel
Number of channel-groups in use: 2
Group  Port-channel  Protocol    Ports
------+-------------+-----------+-----------------------------------------------
1      Po1(SU)         LACP      Gi0/5(P)    Gi0/6(P)
                                 Gi0/7(P)
2      Po2(SD)          -
";

    const CDP: &str = "\
Capability Codes: R - Router, T - Trans Bridge, B - Source Route Bridge
Device ID        Local Intrfce     Holdtme    Capability  Platform  Port ID
core1            Gig 0/24          150             R S I  WS-C3750  Gig 1/0/1
very-long-distribution-switch.example.com
                 Gig 0/23          120             R S I  WS-C3850  Gig 1/0/2

Total cdp entries displayed : 2
";

    #[test]
    fn test_parse_hostname() {
        assert_eq!(parse_hostname("hostname sw1\n").as_deref(), Some("sw1"));
        assert_eq!(parse_hostname("\n"), None);
    }

    #[test]
    fn test_parse_interface_list_skips_virtual() {
        assert_eq!(
            parse_interface_list(IP_INT_BRIEF),
            vec!["GigabitEthernet0/1", "GigabitEthernet0/2"]
        );
    }

    #[test]
    fn test_parse_interface_list_short_names() {
        assert_eq!(parse_interface_list(STATUS), vec!["GigabitEthernet0/1"]);
    }

    #[test]
    fn test_parse_switchport() {
        let info = parse_switchport(SWITCHPORT);
        assert_eq!(info.mode, Some(SwitchportMode::Access));
        assert_eq!(info.access_vlan.as_deref(), Some("10"));
        assert_eq!(info.voice_vlan.as_deref(), Some("none"));
    }

    #[test]
    fn test_parse_switchport_administrative_modes() {
        let mode = |line: &str| parse_switchport(line).mode;
        assert_eq!(mode("Administrative Mode: trunk\n"), Some(SwitchportMode::Trunk));
        assert_eq!(mode("Administrative Mode: dynamic auto\n"), Some(SwitchportMode::Dynamic));
        assert_eq!(mode("Administrative Mode: private-vlan host\n"), Some(SwitchportMode::Unknown));
        assert_eq!(mode("Access Mode VLAN: 10 (VLAN0010)\n"), None);
    }

    #[test]
    fn test_parse_switchport_voice_vlan_id() {
        let info = parse_switchport("Voice VLAN: 0150 (VLAN0150)\n");
        assert_eq!(info.voice_vlan.as_deref(), Some("150"));
        assert_eq!(info.access_vlan, None);
    }

    #[test]
    fn test_parse_interface_status_with_description() {
        let status = parse_interface_status(STATUS, "GigabitEthernet0/1").unwrap();
        assert_eq!(status.operational_status, "connected");
        assert_eq!(status.admin_status, "up");
        assert_eq!(status.duplex.as_deref(), Some("a-full"));
        assert_eq!(status.speed.as_deref(), Some("a-100"));
        assert!(parse_interface_status(STATUS, "GigabitEthernet0/2").is_none());
    }

    #[test]
    fn test_parse_running_interface() {
        let cfg = parse_running_interface(RUNNING, "GigabitEthernet0/1");
        assert_eq!(cfg.description, "Desk 12 phone");
        assert!(cfg.portfast);
        assert_eq!(cfg.speed, "auto");
        assert_eq!(cfg.channel_group.as_deref(), Some("Po3"));
        assert!(!cfg.shutdown);
    }

    #[test]
    fn test_parse_vlan_brief() {
        let vlans = parse_vlan_brief(VLAN_BRIEF);
        assert_eq!(vlans.len(), 4);
        assert_eq!(vlans[1], VlanRecord::new("10", "USERS", "active"));
        assert_eq!(vlans[3].status, "act/unsup");
    }

    #[test]
    fn test_parse_etherchannel_summary() {
        let pos = parse_etherchannel_summary(ETHERCHANNEL);
        assert_eq!(
            pos["Po1"],
            vec![
                "GigabitEthernet0/5",
                "GigabitEthernet0/6",
                "GigabitEthernet0/7"
            ]
        );
        assert!(pos["Po2"].is_empty());
    }

    #[test]
    fn test_parse_cdp_neighbors() {
        let n = parse_cdp_neighbors(CDP);
        assert_eq!(n["GigabitEthernet0/24"], "core1");
        assert_eq!(
            n["GigabitEthernet0/23"],
            "very-long-distribution-switch.example.com"
        );
    }

    #[test]
    fn test_access_vlan_commands() {
        let cmds = access_vlan_commands("GigabitEthernet0/1", "20", Some("150"));
        assert_eq!(cmds[0], "default interface GigabitEthernet0/1");
        assert!(cmds.contains(&"switchport access vlan 20".to_string()));
        assert!(cmds.contains(&"switchport voice vlan 150".to_string()));
        assert_eq!(cmds.last().unwrap(), "no shutdown");

        let cmds = access_vlan_commands("GigabitEthernet0/1", "20", None);
        assert!(!cmds.iter().any(|c| c.contains("voice")));
    }
}
