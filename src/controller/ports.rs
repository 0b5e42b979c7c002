//! Static per-switch port layout: VLAN classification, flood sets and trunk tagging

use crate::config::{PortConfig, PortRole, SwitchConfig};
use crate::protocol::openflow::Action;
use crate::protocol::VlanTag;
use std::collections::BTreeMap;

/// Port number on a switch
pub type PortId = u32;

/// VLAN for untagged frames on unconfigured or trunk ports
pub const DEFAULT_VLAN: u16 = 1;

/// Port roles for one switch, ordered by port number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMap {
    ports: BTreeMap<PortId, PortConfig>,
}

impl PortMap {
    pub fn new(ports: impl IntoIterator<Item = PortConfig>) -> Self {
        Self {
            ports: ports.into_iter().map(|p| (p.port, p)).collect(),
        }
    }

    pub fn from_config(switch: &SwitchConfig) -> Self {
        Self::new(switch.ports.iter().copied())
    }

    pub fn get(&self, port: PortId) -> Option<&PortConfig> {
        self.ports.get(&port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// VLAN of a frame: its 802.1Q VID, else the ingress access VLAN, else VLAN 1
    pub fn classify_vlan(&self, in_port: PortId, tag: Option<VlanTag>) -> u16 {
        match tag {
            Some(tag) if tag.vid != 0 => tag.vid,
            _ => self
                .ports
                .get(&in_port)
                .and_then(|p| p.vlan)
                .unwrap_or(DEFAULT_VLAN),
        }
    }

    pub fn is_trunk(&self, port: PortId) -> bool {
        self.ports
            .get(&port)
            .is_some_and(|p| p.role == PortRole::Trunk)
    }

    pub fn trunk_ports(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports
            .values()
            .filter(|p| p.role == PortRole::Trunk)
            .map(|p| p.port)
    }

    /// Access ports of `vlan` plus every trunk, minus `exclude`, ascending
    pub fn flood_ports(&self, vlan: u16, exclude: Option<PortId>) -> Vec<PortId> {
        self.ports
            .values()
            .filter(|p| Some(p.port) != exclude)
            .filter(|p| match p.role {
                PortRole::Access => p.vlan == Some(vlan),
                PortRole::Trunk => true,
            })
            .map(|p| p.port)
            .collect()
    }

    /// Actions delivering a frame of `vlan` out `port`
    ///
    /// `tagged` says whether the frame already carries an 802.1Q header:
    /// trunks then only rewrite its VID and access ports strip it.
    pub fn output_actions(&self, port: PortId, vlan: u16, tagged: bool) -> Vec<Action> {
        let mut actions = Vec::with_capacity(3);
        match (self.is_trunk(port), tagged) {
            (true, false) => {
                actions.push(Action::push_vlan());
                actions.push(Action::set_vlan_vid(vlan));
            }
            (true, true) => actions.push(Action::set_vlan_vid(vlan)),
            (false, true) => actions.push(Action::pop_vlan()),
            (false, false) => {}
        }
        actions.push(Action::output(port));
        actions
    }

    /// Actions flooding a frame of `vlan` to `ports`
    ///
    /// The untagged group goes first and the tag is then added or removed
    /// once for the other group: an untagged frame reaches access ports
    /// before a single push + set, a tagged one reaches trunks before a
    /// single pop.
    pub fn flood_actions(&self, ports: &[PortId], vlan: u16, tagged: bool) -> Vec<Action> {
        let (trunks, access): (Vec<PortId>, Vec<PortId>) =
            ports.iter().partition(|&&port| self.is_trunk(port));

        let mut actions = Vec::with_capacity(ports.len() + 2);
        if tagged {
            if !trunks.is_empty() {
                actions.push(Action::set_vlan_vid(vlan));
                actions.extend(trunks.into_iter().map(Action::output));
            }
            if !access.is_empty() {
                actions.push(Action::pop_vlan());
                actions.extend(access.into_iter().map(Action::output));
            }
        } else {
            actions.extend(access.into_iter().map(Action::output));
            if !trunks.is_empty() {
                actions.push(Action::push_vlan());
                actions.push(Action::set_vlan_vid(vlan));
                actions.extend(trunks.into_iter().map(Action::output));
            }
        }
        actions
    }
}
