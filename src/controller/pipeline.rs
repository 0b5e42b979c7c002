//! Per-packet decision pipeline
//!
//! One `Pipeline` lives for a single packet-in. It holds the switch's tables
//! locked, walks the frame through learning and the ARP / IPv4 / L2 engines,
//! and collects the OpenFlow messages to send back.

use super::decode::{self, Packet};
use super::gateway::Gateways;
use super::ports::{PortId, PortMap};
use super::session::LearningTables;
use crate::protocol::ethernet::Frame;
use crate::protocol::openflow::{Action, FlowMod, Message, PacketIn, PacketOut};
use crate::telemetry::MetricsRegistry;
use std::time::Instant;
use tracing::trace;

pub(super) struct Pipeline<'a> {
    pub(super) dpid: u64,
    pub(super) ports: &'a PortMap,
    pub(super) gateways: &'a Gateways,
    pub(super) tables: &'a mut LearningTables,
    pub(super) metrics: &'a MetricsRegistry,
    pub(super) packet_in: &'a PacketIn,
    pub(super) in_port: PortId,
    /// VLAN the frame was classified into
    pub(super) vlan: u16,
    /// The original frame carries an 802.1Q header
    pub(super) tagged: bool,
    pub(super) now: Instant,
    out: Vec<Message>,
}

impl<'a> Pipeline<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        dpid: u64,
        ports: &'a PortMap,
        gateways: &'a Gateways,
        tables: &'a mut LearningTables,
        metrics: &'a MetricsRegistry,
        packet_in: &'a PacketIn,
        in_port: PortId,
        vlan: u16,
        tagged: bool,
        now: Instant,
    ) -> Self {
        Self {
            dpid,
            ports,
            gateways,
            tables,
            metrics,
            packet_in,
            in_port,
            vlan,
            tagged,
            now,
            out: Vec::new(),
        }
    }

    pub(super) fn process(mut self, frame: &Frame<'_>) -> Vec<Message> {
        let packet = decode::classify(frame);

        // Discovery frames are neither learned nor forwarded
        if let Packet::Lldp = packet {
            trace!(
                "switch {} port {}: LLDP from {} ignored",
                self.dpid,
                self.in_port,
                frame.src_mac()
            );
            return self.out;
        }

        self.tables
            .mac
            .learn(frame.src_mac(), self.in_port, self.vlan, self.now);
        trace!(
            "switch {}: learned {} on port {} VLAN {}",
            self.dpid,
            frame.src_mac(),
            self.in_port,
            self.vlan
        );

        match packet {
            Packet::Arp(arp) => self.handle_arp(&arp),
            Packet::Ipv4 { header, kind } => self.handle_ipv4(frame, &header, kind),
            Packet::Lldp | Packet::Other => self.forward_l2(frame),
        }

        self.out
    }

    pub(super) fn install_flow(&mut self, flow: FlowMod) {
        self.metrics.flows_installed.inc();
        self.out.push(Message::FlowMod(flow));
    }

    /// Packet-out of a frame built by the controller; such frames are untagged
    pub(super) fn send_synthesized(&mut self, data: Vec<u8>, actions: Vec<Action>) {
        self.out
            .push(Message::PacketOut(PacketOut::synthesized(data, actions)));
    }

    /// Packet-out of the frame the switch sent up
    pub(super) fn forward_original(&mut self, actions: Vec<Action>) {
        self.out.push(Message::PacketOut(PacketOut::forward(
            self.packet_in,
            self.in_port,
            actions,
        )));
    }

    /// Flood the original frame within its VLAN, never back out the ingress port
    pub(super) fn flood_original(&mut self) {
        let ports = self.ports.flood_ports(self.vlan, Some(self.in_port));
        if ports.is_empty() {
            self.metrics.packets_dropped.inc();
            trace!(
                "switch {}: nothing to flood to in VLAN {}",
                self.dpid,
                self.vlan
            );
            return;
        }

        let actions = self.ports.flood_actions(&ports, self.vlan, self.tagged);
        self.metrics.packets_flooded.inc();
        trace!(
            "switch {}: flood VLAN {} to {:?}",
            self.dpid,
            self.vlan,
            ports
        );
        self.forward_original(actions);
    }
}
