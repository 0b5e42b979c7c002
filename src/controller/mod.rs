//! VLAN-aware learning switch and inter-VLAN gateway logic
//!
//! `Controller` owns the static layout (gateways, port roles per dpid) and
//! the live switch sessions. All decisions are made synchronously:
//! `handle_packet_in` returns the OpenFlow messages to send, and the caller
//! decides how they reach the switch.

mod arp_engine;
pub mod arp_table;
mod decode;
pub mod gateway;
mod ipv4_engine;
mod l2;
pub mod mac_table;
mod pipeline;
pub mod ports;
mod routing;
pub mod session;

#[cfg(test)]
mod fixtures;

pub use arp_table::{ArpEntry, ArpTable};
pub use gateway::{Gateway, Gateways};
pub use mac_table::{MacEntry, MacTable};
pub use ports::{PortId, PortMap};
pub use session::{LearningTables, Switch};

use crate::config::{Config, TableConfig, TimerConfig};
use crate::protocol::ethernet::Frame;
use crate::protocol::openflow::{Message, PacketIn};
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use pipeline::Pipeline;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Entries removed by one aging sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub mac_removed: usize,
    pub arp_removed: usize,
}

pub struct Controller {
    gateways: Gateways,
    layouts: HashMap<u64, Arc<PortMap>>,
    timers: TimerConfig,
    limits: TableConfig,
    sessions: RwLock<HashMap<u64, Arc<Switch>>>,
    metrics: Arc<MetricsRegistry>,
}

impl Controller {
    pub fn new(config: &Config, metrics: Arc<MetricsRegistry>) -> Result<Self> {
        let gateways = Gateways::from_config(&config.gateways)?;
        let layouts = config
            .switches
            .iter()
            .map(|s| (s.dpid, Arc::new(PortMap::from_config(s))))
            .collect();

        Ok(Self {
            gateways,
            layouts,
            timers: config.timers,
            limits: config.tables,
            sessions: RwLock::new(HashMap::new()),
            metrics,
        })
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn timers(&self) -> &TimerConfig {
        &self.timers
    }

    pub fn gateways(&self) -> &Gateways {
        &self.gateways
    }

    /// Register a switch that completed the handshake
    ///
    /// Returns the session and the setup messages (config, flow wipe, base
    /// flows). A reconnecting dpid replaces its previous session and starts
    /// with empty tables.
    pub fn connect(&self, dpid: u64) -> (Arc<Switch>, Vec<Message>) {
        let ports = match self.layouts.get(&dpid) {
            Some(ports) => Arc::clone(ports),
            None => {
                warn!(
                    "switch {} has no port configuration, every frame classifies to VLAN 1",
                    dpid
                );
                Arc::new(PortMap::default())
            }
        };

        let switch = Arc::new(Switch::new(
            dpid,
            ports,
            LearningTables::new(&self.timers, &self.limits),
        ));

        let connected = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            if sessions.insert(dpid, Arc::clone(&switch)).is_some() {
                info!("switch {} reconnected, previous session replaced", dpid);
            }
            sessions.len()
        };

        self.metrics.register_switch(dpid);
        self.metrics.set_switches_connected(connected);

        let messages = session::setup_messages(&self.gateways);
        for message in &messages {
            if let Message::FlowMod(_) = message {
                self.metrics.record_flow_mod(dpid);
            }
        }
        info!(
            "switch {} connected ({} ports, {} trunks)",
            dpid,
            switch.ports().len(),
            switch.ports().trunk_ports().count()
        );

        (switch, messages)
    }

    /// Drop a session; a newer session for the same dpid is left alone
    pub fn disconnect(&self, switch: &Arc<Switch>) {
        let dpid = switch.dpid();
        let connected = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(&dpid) {
                Some(current) if Arc::ptr_eq(current, switch) => {
                    sessions.remove(&dpid);
                }
                _ => return,
            }
            sessions.len()
        };

        self.metrics.set_switches_connected(connected);
        info!("switch {} disconnected", dpid);
    }

    pub fn session(&self, dpid: u64) -> Option<Arc<Switch>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&dpid)
            .cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Decide what to do with a packet-in
    ///
    /// Frames that do not parse as Ethernet are ignored.
    pub fn handle_packet_in(
        &self,
        dpid: u64,
        packet_in: &PacketIn,
        now: Instant,
    ) -> Result<Vec<Message>> {
        let switch = self.session(dpid).ok_or(Error::UnknownSwitch { dpid })?;
        self.metrics.packets_in.inc();
        self.metrics.record_packet_in(dpid);

        let in_port = packet_in
            .in_port()
            .ok_or_else(|| Error::InvalidPacket("packet-in without IN_PORT".into()))?;

        let frame = match Frame::parse(&packet_in.data) {
            Ok(frame) => frame,
            Err(e) => {
                trace!("switch {} port {}: dropping frame: {}", dpid, in_port, e);
                return Ok(Vec::new());
            }
        };
        let vlan = switch.ports().classify_vlan(in_port, frame.vlan_tag());

        let messages = {
            let mut tables = switch.tables();
            Pipeline::new(
                dpid,
                switch.ports(),
                &self.gateways,
                &mut tables,
                &self.metrics,
                packet_in,
                in_port,
                vlan,
                frame.vlan_tag().is_some(),
                now,
            )
            .process(&frame)
        };

        self.record_outbound(dpid, &messages);
        Ok(messages)
    }

    /// LLDP keepalive packet-outs for a connected switch
    pub fn keepalive(&self, dpid: u64) -> Result<Vec<Message>> {
        let switch = self.session(dpid).ok_or(Error::UnknownSwitch { dpid })?;
        let messages = session::keepalive_frames(dpid, switch.ports());
        self.record_outbound(dpid, &messages);
        trace!("switch {}: {} keepalive frames", dpid, messages.len());
        Ok(messages)
    }

    /// Age out MAC and ARP entries on every live switch
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let sessions: Vec<Arc<Switch>> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut report = SweepReport::default();
        let mut mac_size = 0;
        let mut arp_size = 0;
        for switch in sessions {
            let mut tables = switch.tables();
            report.mac_removed += tables.mac.age_out(now);
            report.arp_removed += tables.arp.age_out(now);
            mac_size += tables.mac.len();
            arp_size += tables.arp.len();
        }

        self.metrics.mac_entries_aged.add(report.mac_removed as u64);
        self.metrics.arp_entries_aged.add(report.arp_removed as u64);
        self.metrics.set_mac_table_size(mac_size);
        self.metrics.set_arp_table_size(arp_size);

        if report.mac_removed > 0 || report.arp_removed > 0 {
            debug!(
                "aging sweep removed {} MAC and {} ARP entries",
                report.mac_removed, report.arp_removed
            );
        }
        report
    }

    fn record_outbound(&self, dpid: u64, messages: &[Message]) {
        for message in messages {
            match message {
                Message::PacketOut(_) => self.metrics.record_packet_out(dpid),
                Message::FlowMod(_) => self.metrics.record_flow_mod(dpid),
                _ => {}
            }
        }
    }
}
