//! Configuration validation

use super::{Config, PortRole};
use crate::protocol::{Ipv4Cidr, MacAddr};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_logging(config, &mut result);
    validate_timers(config, &mut result);
    validate_gateways(config, &mut result);
    validate_switches(config, &mut result);

    result
}

fn valid_vlan(vlan: u16) -> bool {
    (1..=4094).contains(&vlan)
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    if config.logging.level().is_none() {
        result.warn(format!(
            "logging.level: unknown level '{}', using info",
            config.logging.level
        ));
    }

    if config.logging.format().is_none() {
        result.warn(format!(
            "logging.format: unknown format '{}', using pretty",
            config.logging.format
        ));
    }
}

fn validate_timers(config: &Config, result: &mut ValidationResult) {
    let timers = &config.timers;
    for (name, value) in [
        ("mac_aging_secs", timers.mac_aging_secs),
        ("arp_aging_secs", timers.arp_aging_secs),
        ("aging_sweep_secs", timers.aging_sweep_secs),
        ("keepalive_secs", timers.keepalive_secs),
    ] {
        if value == 0 {
            result.error(format!("timers.{}: must be greater than zero", name));
        }
    }
}

fn validate_gateways(config: &Config, result: &mut ValidationResult) {
    let mut seen = HashSet::new();

    for gw in &config.gateways {
        if !valid_vlan(gw.vlan) {
            result.error(format!("gateways[vlan={}]: VLAN id outside 1..=4094", gw.vlan));
        }

        if !seen.insert(gw.vlan) {
            result.error(format!("gateways[vlan={}]: duplicate gateway VLAN", gw.vlan));
        }

        if gw.mac.parse::<MacAddr>().is_err() {
            result.error(format!(
                "gateways[vlan={}]: invalid MAC address '{}'",
                gw.vlan, gw.mac
            ));
        }

        match gw.subnet.parse::<Ipv4Cidr>() {
            Ok(subnet) if !subnet.contains(gw.ip) => {
                result.error(format!(
                    "gateways[vlan={}]: gateway {} outside subnet {}",
                    gw.vlan, gw.ip, subnet
                ));
            }
            Ok(_) => {}
            Err(e) => {
                result.error(format!(
                    "gateways[vlan={}]: invalid subnet '{}': {}",
                    gw.vlan, gw.subnet, e
                ));
            }
        }
    }
}

fn validate_switches(config: &Config, result: &mut ValidationResult) {
    if config.switches.is_empty() {
        result.warn("switches: none configured, every port falls back to VLAN 1");
    }

    let gateway_vlans: HashSet<u16> = config.gateways.iter().map(|g| g.vlan).collect();
    let mut dpids = HashSet::new();

    for switch in &config.switches {
        if !dpids.insert(switch.dpid) {
            result.error(format!("switches[dpid={}]: duplicate dpid", switch.dpid));
        }

        let mut ports = HashSet::new();
        for port in &switch.ports {
            let prefix = format!("switches[dpid={}].port {}", switch.dpid, port.port);

            if !ports.insert(port.port) {
                result.error(format!("{}: duplicate port", prefix));
            }

            match (port.role, port.vlan) {
                (PortRole::Access, None) => {
                    result.error(format!("{}: access port requires a vlan", prefix));
                }
                (PortRole::Access, Some(vlan)) if !valid_vlan(vlan) => {
                    result.error(format!("{}: VLAN {} outside 1..=4094", prefix, vlan));
                }
                (PortRole::Access, Some(vlan)) if !gateway_vlans.contains(&vlan) => {
                    result.warn(format!(
                        "{}: VLAN {} has no gateway, hosts cannot leave it",
                        prefix, vlan
                    ));
                }
                (PortRole::Trunk, Some(vlan)) => {
                    result.warn(format!(
                        "{}: vlan {} ignored on trunk port",
                        prefix, vlan
                    ));
                }
                _ => {}
            }
        }
    }
}
