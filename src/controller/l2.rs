//! Learning-switch forwarding within a VLAN

use super::pipeline::Pipeline;
use crate::protocol::ethernet::Frame;
use crate::protocol::openflow::{FlowMod, Match};
use tracing::debug;

const L2_PRIORITY: u16 = 50;
const L2_IDLE_TIMEOUT: u16 = 180;

impl Pipeline<'_> {
    /// Unicast to a learned port in the same VLAN and install a flow, else flood
    pub(super) fn forward_l2(&mut self, frame: &Frame<'_>) {
        let dst = frame.dst_mac();
        let known = self
            .tables
            .mac
            .lookup(&dst)
            .filter(|e| e.vlan == self.vlan && e.port != self.in_port)
            .copied();

        let Some(entry) = known else {
            self.flood_original();
            return;
        };

        // The flow only matches frames that carry the tag
        let flow = FlowMod::add(
            L2_PRIORITY,
            Match::any().eth_dst(dst).vlan(self.vlan),
            self.ports.output_actions(entry.port, self.vlan, true),
        )
        .idle_timeout(L2_IDLE_TIMEOUT);

        debug!(
            "switch {}: {} VLAN {} -> port {}",
            self.dpid, dst, self.vlan, entry.port
        );
        self.install_flow(flow);
        let actions = self.ports.output_actions(entry.port, self.vlan, self.tagged);
        self.forward_original(actions);
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use crate::protocol::openflow::{Action, OxmField, VID_PRESENT};

    #[test]
    fn test_known_unicast_installs_flow() {
        let lab = Lab::new();
        lab.packet_in(1, 2, udp_packet(HOST_10_B, HOST_10_A, IP_10_B, IP_10_A));

        let packet = udp_packet(HOST_10_A, HOST_10_B, IP_10_A, IP_10_B);
        let messages = lab.packet_in(1, 1, packet.clone());

        let flows = flow_mods(&messages);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].priority, 50);
        assert_eq!(flows[0].idle_timeout, 180);
        assert_eq!(
            flows[0].match_fields.fields(),
            &[
                OxmField::EthDst(HOST_10_B),
                OxmField::VlanVid(VID_PRESENT | 10),
            ]
        );
        assert_eq!(flows[0].actions, vec![Action::pop_vlan(), Action::output(2)]);

        let outs = packet_outs(&messages);
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].actions, vec![Action::output(2)]);
        assert_eq!(outs[0].in_port, 1);
        assert_eq!(outs[0].data, packet);
    }

    #[test]
    fn test_known_unicast_over_trunk_is_tagged() {
        let lab = Lab::new();
        lab.packet_in(
            1,
            5,
            tagged(udp_packet(HOST_10_B, HOST_10_A, IP_10_B, IP_10_A), 10),
        );

        let messages = lab.packet_in(1, 1, udp_packet(HOST_10_A, HOST_10_B, IP_10_A, IP_10_B));
        assert_eq!(
            flow_mods(&messages)[0].actions,
            vec![Action::set_vlan_vid(10), Action::output(5)]
        );
        assert_eq!(
            packet_outs(&messages)[0].actions,
            vec![
                Action::push_vlan(),
                Action::set_vlan_vid(10),
                Action::output(5)
            ]
        );
    }

    #[test]
    fn test_tagged_unicast_to_access_is_untagged() {
        let lab = Lab::new();
        lab.packet_in(1, 2, udp_packet(HOST_10_B, HOST_10_A, IP_10_B, IP_10_A));

        let messages = lab.packet_in(
            1,
            4,
            tagged(udp_packet(HOST_10_A, HOST_10_B, IP_10_A, IP_10_B), 10),
        );
        assert_eq!(
            packet_outs(&messages)[0].actions,
            vec![Action::pop_vlan(), Action::output(2)]
        );
    }

    #[test]
    fn test_unknown_destination_floods() {
        let lab = Lab::new();
        let messages = lab.packet_in(1, 2, udp_packet(HOST_10_A, HOST_10_B, IP_10_A, IP_10_B));

        assert!(flow_mods(&messages).is_empty());
        let outs = packet_outs(&messages);
        assert_eq!(outs.len(), 1);
        // Access ports untagged, then one tag ahead of the trunks
        assert_eq!(
            outs[0].actions,
            vec![
                Action::output(1),
                Action::output(3),
                Action::push_vlan(),
                Action::set_vlan_vid(10),
                Action::output(4),
                Action::output(5),
            ]
        );
        assert_eq!(lab.controller.metrics().packets_flooded.get(), 1);
    }

    #[test]
    fn test_tagged_flood_from_trunk() {
        let lab = Lab::new();
        let packet = tagged(udp_packet(HOST_10_A, HOST_10_B, IP_10_A, IP_10_B), 10);
        let messages = lab.packet_in(1, 4, packet.clone());

        let outs = packet_outs(&messages);
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].data, packet);
        // The other trunk keeps the single tag, access ports get it stripped
        assert_eq!(
            outs[0].actions,
            vec![
                Action::set_vlan_vid(10),
                Action::output(5),
                Action::pop_vlan(),
                Action::output(1),
                Action::output(2),
                Action::output(3),
            ]
        );
        assert!(!outs[0].actions.contains(&Action::push_vlan()));
    }

    #[test]
    fn test_destination_in_other_vlan_floods() {
        let lab = Lab::new();
        // HOST_20_A learned in VLAN 20 via the trunk
        lab.packet_in(
            1,
            4,
            tagged(udp_packet(HOST_20_A, HOST_10_A, IP_20_A, IP_10_A), 20),
        );

        let messages = lab.packet_in(1, 1, udp_packet(HOST_10_A, HOST_20_A, IP_10_A, IP_20_A));
        assert!(flow_mods(&messages).is_empty());
        assert_eq!(output_ports(&packet_outs(&messages)[0].actions), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_destination_on_ingress_port_floods() {
        let lab = Lab::new();
        lab.packet_in(1, 1, udp_packet(HOST_10_B, HOST_10_A, IP_10_B, IP_10_A));

        let messages = lab.packet_in(1, 1, udp_packet(HOST_10_A, HOST_10_B, IP_10_A, IP_10_B));
        assert!(flow_mods(&messages).is_empty());
        assert_eq!(output_ports(&packet_outs(&messages)[0].actions), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_lone_port_drops() {
        let lab = Lab::with_config(single_port_config());
        let messages = lab.packet_in(9, 1, udp_packet(HOST_10_A, HOST_10_B, IP_10_A, IP_10_B));

        assert!(messages.is_empty());
        assert_eq!(lab.controller.metrics().packets_dropped.get(), 1);
    }
}
