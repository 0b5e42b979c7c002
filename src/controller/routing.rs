//! Inter-VLAN forwarding of IPv4 packets through the gateways

use super::pipeline::Pipeline;
use crate::protocol::arp::ArpPacket;
use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::ipv4::{Ipv4Header, Ipv4Packet};
use crate::protocol::openflow::{FlowMod, Match};
use crate::protocol::{EtherType, MacAddr};
use tracing::{debug, trace};

const ROUTE_PRIORITY: u16 = 100;
const ROUTE_IDLE_TIMEOUT: u16 = 60;

impl Pipeline<'_> {
    /// Route `header` into `dst_vlan`, soliciting the destination when unresolved
    pub(super) fn route(&mut self, header: &Ipv4Header<'_>, dst_vlan: u16) {
        let dst = header.dst_addr();
        let entry = self
            .tables
            .arp
            .lookup(&dst)
            .filter(|e| e.vlan == dst_vlan)
            .copied();

        let Some(entry) = entry else {
            self.solicit(dst, dst_vlan);
            return;
        };

        let mut packet = match Ipv4Packet::from_bytes(header.datagram()) {
            Ok(packet) => packet,
            Err(e) => {
                trace!("switch {}: cannot rewrite {}: {}", self.dpid, dst, e);
                self.metrics.packets_dropped.inc();
                return;
            }
        };
        if !packet.decrement_ttl() {
            self.metrics.ttl_expired.inc();
            return;
        }

        let src_mac = self
            .gateways
            .for_vlan(self.vlan)
            .or_else(|| self.gateways.for_vlan(dst_vlan))
            .map(|g| g.mac)
            .unwrap_or(MacAddr::ZERO);

        let actions = self.ports.output_actions(entry.port, dst_vlan, false);
        let flow = FlowMod::add(
            ROUTE_PRIORITY,
            Match::any()
                .eth_type(EtherType::Ipv4)
                .ipv4_src(header.src_addr())
                .ipv4_dst(dst),
            actions.clone(),
        )
        .idle_timeout(ROUTE_IDLE_TIMEOUT);
        self.install_flow(flow);

        let frame = FrameBuilder::new()
            .dst_mac(entry.mac)
            .src_mac(src_mac)
            .ethertype(EtherType::Ipv4)
            .payload(&packet.into_bytes())
            .build();

        debug!(
            "switch {}: route {} -> {} VLAN {} -> {} via port {}",
            self.dpid,
            header.src_addr(),
            dst,
            self.vlan,
            dst_vlan,
            entry.port
        );
        self.metrics.packets_routed.inc();
        self.send_synthesized(frame, actions);
    }

    /// Broadcast an ARP request for `target` from the destination VLAN's gateway
    ///
    /// The triggering packet is dropped; the sender's retry finds the binding.
    fn solicit(&mut self, target: std::net::Ipv4Addr, dst_vlan: u16) {
        self.metrics.packets_dropped.inc();

        let Some(gateway) = self.gateways.for_vlan(dst_vlan).copied() else {
            return;
        };
        let ports = self.ports.flood_ports(dst_vlan, None);
        if ports.is_empty() {
            trace!(
                "switch {}: no ports in VLAN {} to resolve {}",
                self.dpid,
                dst_vlan,
                target
            );
            return;
        }

        let request = ArpPacket::request(gateway.mac, gateway.ip, target);
        let frame = FrameBuilder::new()
            .dst_mac(MacAddr::BROADCAST)
            .src_mac(gateway.mac)
            .ethertype(EtherType::Arp)
            .payload(&request.to_bytes())
            .build();

        debug!(
            "switch {}: who-has {} tell {} on VLAN {}",
            self.dpid, target, gateway.ip, dst_vlan
        );
        self.metrics.arp_requests_sent.inc();
        let actions = self.ports.flood_actions(&ports, dst_vlan, false);
        self.send_synthesized(frame, actions);
    }
}
