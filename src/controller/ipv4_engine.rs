//! IPv4 dispatch: TTL check, gateway echo replies, hand-off to routing or L2

use super::decode::Ipv4Kind;
use super::gateway::Gateway;
use super::pipeline::Pipeline;
use crate::protocol::ethernet::{Frame, FrameBuilder};
use crate::protocol::icmp::{build_echo_reply, IcmpPacket};
use crate::protocol::ipv4::{Ipv4Builder, Ipv4Header, Protocol};
use crate::protocol::EtherType;
use tracing::debug;

/// TTL of controller-originated IPv4 packets
const REPLY_TTL: u8 = 64;

impl Pipeline<'_> {
    pub(super) fn handle_ipv4(
        &mut self,
        frame: &Frame<'_>,
        header: &Ipv4Header<'_>,
        kind: Ipv4Kind<'_>,
    ) {
        if header.ttl() <= 1 {
            self.metrics.ttl_expired.inc();
            debug!(
                "switch {}: TTL expired {} -> {}",
                self.dpid,
                header.src_addr(),
                header.dst_addr()
            );
            return;
        }

        if let Ipv4Kind::IcmpEchoRequest(icmp) = &kind {
            let own_gateway = self
                .gateways
                .for_vlan(self.vlan)
                .filter(|g| g.ip == header.dst_addr())
                .copied();
            if let Some(gateway) = own_gateway {
                self.send_echo_reply(frame, header, icmp, &gateway);
                return;
            }

            let dst_vlan = self
                .gateways
                .vlan_of(header.dst_addr())
                .filter(|&vlan| vlan != self.vlan);
            if let Some(dst_vlan) = dst_vlan {
                self.route(header, dst_vlan);
                return;
            }
        }

        self.forward_l2(frame);
    }

    fn send_echo_reply(
        &mut self,
        frame: &Frame<'_>,
        header: &Ipv4Header<'_>,
        request: &IcmpPacket<'_>,
        gateway: &Gateway,
    ) {
        let icmp = build_echo_reply(request);
        let ip = Ipv4Builder::new()
            .ttl(REPLY_TTL)
            .protocol(Protocol::Icmp)
            .src_addr(gateway.ip)
            .dst_addr(header.src_addr())
            .payload(&icmp)
            .build();
        let reply = FrameBuilder::new()
            .dst_mac(frame.src_mac())
            .src_mac(gateway.mac)
            .ethertype(EtherType::Ipv4)
            .payload(&ip)
            .build();

        debug!(
            "switch {}: echo reply {} -> {} (id {}, seq {})",
            self.dpid,
            gateway.ip,
            header.src_addr(),
            request.identifier(),
            request.sequence()
        );
        self.metrics.icmp_echo_replies.inc();
        let actions = self.ports.output_actions(self.in_port, self.vlan, false);
        self.send_synthesized(reply, actions);
    }
}
