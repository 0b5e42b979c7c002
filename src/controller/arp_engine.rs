//! Gateway proxy-ARP and ARP learning

use super::gateway::Gateway;
use super::pipeline::Pipeline;
use crate::protocol::arp::ArpPacket;
use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::EtherType;
use tracing::debug;

impl Pipeline<'_> {
    /// Learn the sender binding, answer requests for gateway IPs, flood the rest
    pub(super) fn handle_arp(&mut self, arp: &ArpPacket) {
        self.tables.arp.learn(
            arp.sender_ip,
            arp.sender_mac,
            self.in_port,
            self.vlan,
            self.now,
        );

        if arp.is_request() {
            if let Some(gateway) = self.gateways.owning_ip(arp.target_ip, self.vlan).copied() {
                self.send_proxy_reply(arp, &gateway);
                return;
            }
        }

        self.flood_original();
    }

    fn send_proxy_reply(&mut self, request: &ArpPacket, gateway: &Gateway) {
        let reply = request.proxy_reply(gateway.mac);
        let frame = FrameBuilder::new()
            .dst_mac(request.sender_mac)
            .src_mac(gateway.mac)
            .ethertype(EtherType::Arp)
            .payload(&reply.to_bytes())
            .build();

        debug!(
            "switch {}: proxy ARP {} is-at {} for {} (VLAN {} -> gateway VLAN {})",
            self.dpid, gateway.ip, gateway.mac, request.sender_ip, self.vlan, gateway.vlan
        );
        self.metrics.arp_proxied.inc();
        let actions = self.ports.output_actions(self.in_port, self.vlan, false);
        self.send_synthesized(frame, actions);
    }
}
