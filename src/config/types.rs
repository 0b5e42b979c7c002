//! Configuration types

use crate::telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Controller configuration (flowgate.toml)
///
/// Every table is optional; `Config::default()` is the three-switch lab
/// layout with VLAN 10 and VLAN 20 gateways.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub timers: TimerConfig,
    #[serde(default)]
    pub tables: TableConfig,
    #[serde(default)]
    pub gateways: Vec<GatewayConfig>,
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// OpenFlow listen address
    pub listen: SocketAddr,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 6653)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimerConfig {
    pub mac_aging_secs: u64,
    pub arp_aging_secs: u64,
    pub aging_sweep_secs: u64,
    pub keepalive_secs: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            mac_aging_secs: 300,
            arp_aging_secs: 240,
            aging_sweep_secs: 60,
            keepalive_secs: 10,
        }
    }
}

/// Learning table capacity; 0 means unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TableConfig {
    pub max_mac_entries: usize,
    pub max_arp_entries: usize,
}

/// Simulated gateway for one VLAN
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayConfig {
    pub vlan: u16,
    pub ip: Ipv4Addr,
    /// "aa:bb:cc:dd:ee:ff"
    pub mac: String,
    /// "10.0.10.0/24"
    pub subnet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SwitchConfig {
    pub dpid: u64,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PortConfig {
    pub port: u32,
    pub role: PortRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
}

impl PortConfig {
    pub fn access(port: u32, vlan: u16) -> Self {
        Self {
            port,
            role: PortRole::Access,
            vlan: Some(vlan),
        }
    }

    pub fn trunk(port: u32) -> Self {
        Self {
            port,
            role: PortRole::Trunk,
            vlan: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    Access,
    Trunk,
}

impl Default for Config {
    fn default() -> Self {
        let access_switch = |dpid: u64, vlan: u16| SwitchConfig {
            dpid,
            ports: vec![
                PortConfig::access(1, vlan),
                PortConfig::access(2, vlan),
                PortConfig::access(3, vlan),
                PortConfig::trunk(4),
                PortConfig::trunk(5),
            ],
        };

        Self {
            controller: ControllerConfig::default(),
            logging: LogConfig::default(),
            timers: TimerConfig::default(),
            tables: TableConfig::default(),
            gateways: vec![
                GatewayConfig {
                    vlan: 10,
                    ip: Ipv4Addr::new(10, 0, 10, 254),
                    mac: "00:00:00:00:01:0a".into(),
                    subnet: "10.0.10.0/24".into(),
                },
                GatewayConfig {
                    vlan: 20,
                    ip: Ipv4Addr::new(10, 0, 20, 254),
                    mac: "00:00:00:00:01:14".into(),
                    subnet: "10.0.20.0/24".into(),
                },
            ],
            switches: vec![
                access_switch(1, 10),
                SwitchConfig {
                    dpid: 2,
                    ports: (1..=4).map(PortConfig::trunk).collect(),
                },
                access_switch(3, 20),
            ],
        }
    }
}
