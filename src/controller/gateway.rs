//! Simulated per-VLAN gateways

use crate::config::GatewayConfig;
use crate::protocol::{Ipv4Cidr, MacAddr};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gateway {
    pub vlan: u16,
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub subnet: Ipv4Cidr,
}

impl Gateway {
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let mac = config
            .mac
            .parse::<MacAddr>()
            .map_err(|e| Error::Config(format!("gateway VLAN {}: {}", config.vlan, e)))?;
        let subnet = config
            .subnet
            .parse::<Ipv4Cidr>()
            .map_err(|e| Error::Config(format!("gateway VLAN {}: {}", config.vlan, e)))?;

        Ok(Self {
            vlan: config.vlan,
            ip: config.ip,
            mac,
            subnet,
        })
    }
}

/// Gateways keyed by VLAN
#[derive(Debug, Clone, Default)]
pub struct Gateways {
    by_vlan: BTreeMap<u16, Gateway>,
}

impl Gateways {
    pub fn new(gateways: impl IntoIterator<Item = Gateway>) -> Self {
        Self {
            by_vlan: gateways.into_iter().map(|g| (g.vlan, g)).collect(),
        }
    }

    pub fn from_config(configs: &[GatewayConfig]) -> Result<Self> {
        let gateways = configs
            .iter()
            .map(Gateway::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(gateways))
    }

    pub fn for_vlan(&self, vlan: u16) -> Option<&Gateway> {
        self.by_vlan.get(&vlan)
    }

    /// Gateway answering for `ip`, preferring the one on `vlan`
    pub fn owning_ip(&self, ip: Ipv4Addr, vlan: u16) -> Option<&Gateway> {
        self.for_vlan(vlan)
            .filter(|g| g.ip == ip)
            .or_else(|| self.by_vlan.values().find(|g| g.ip == ip))
    }

    /// VLAN whose subnet contains `ip`
    pub fn vlan_of(&self, ip: Ipv4Addr) -> Option<u16> {
        self.by_vlan
            .values()
            .find(|g| g.subnet.contains(ip))
            .map(|g| g.vlan)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gateway> {
        self.by_vlan.values()
    }

    pub fn len(&self) -> usize {
        self.by_vlan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_vlan.is_empty()
    }
}
