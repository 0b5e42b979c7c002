//! Classify the Ethernet payload of a packet-in

use crate::protocol::arp::ArpPacket;
use crate::protocol::ethernet::Frame;
use crate::protocol::icmp::IcmpPacket;
use crate::protocol::ipv4::{Ipv4Header, Protocol};
use crate::protocol::EtherType;
use tracing::trace;

/// What the decision engine sees in a frame
#[derive(Debug)]
pub enum Packet<'a> {
    Lldp,
    Arp(ArpPacket),
    Ipv4 {
        header: Ipv4Header<'a>,
        kind: Ipv4Kind<'a>,
    },
    /// Anything else, including ARP or IPv4 payloads that fail to parse
    Other,
}

#[derive(Debug)]
pub enum Ipv4Kind<'a> {
    IcmpEchoRequest(IcmpPacket<'a>),
    IcmpOther,
    Other,
}

pub fn classify<'a>(frame: &Frame<'a>) -> Packet<'a> {
    match EtherType::from_u16(frame.ethertype()) {
        Some(EtherType::Lldp) => Packet::Lldp,
        Some(EtherType::Arp) => match ArpPacket::parse(frame.payload()) {
            Ok(arp) => Packet::Arp(arp),
            Err(e) => {
                trace!("unparsable ARP payload: {}", e);
                Packet::Other
            }
        },
        Some(EtherType::Ipv4) => match Ipv4Header::parse(frame.payload()) {
            Ok(header) => {
                let kind = classify_ipv4(&header);
                Packet::Ipv4 { header, kind }
            }
            Err(e) => {
                trace!("unparsable IPv4 payload: {}", e);
                Packet::Other
            }
        },
        _ => Packet::Other,
    }
}

fn classify_ipv4<'a>(header: &Ipv4Header<'a>) -> Ipv4Kind<'a> {
    if header.protocol() != Protocol::Icmp as u8 {
        return Ipv4Kind::Other;
    }

    match IcmpPacket::parse(header.payload()) {
        Ok(icmp) if icmp.is_echo_request() => Ipv4Kind::IcmpEchoRequest(icmp),
        _ => Ipv4Kind::IcmpOther,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ethernet::FrameBuilder;
    use crate::protocol::ipv4::Ipv4Builder;
    use crate::protocol::{MacAddr, VlanTag};
    use std::net::Ipv4Addr;

    fn ipv4_frame(protocol: Protocol, payload: &[u8]) -> Vec<u8> {
        let ip = Ipv4Builder::new()
            .protocol(protocol)
            .src_addr(Ipv4Addr::new(10, 0, 10, 1))
            .dst_addr(Ipv4Addr::new(10, 0, 20, 1))
            .payload(payload)
            .build();
        FrameBuilder::new()
            .dst_mac(MacAddr([0, 0, 0, 0, 0, 2]))
            .src_mac(MacAddr([0, 0, 0, 0, 0, 1]))
            .ethertype(EtherType::Ipv4)
            .payload(&ip)
            .build()
    }

    #[test]
    fn test_echo_request() {
        let data = ipv4_frame(Protocol::Icmp, &[8, 0, 0xf7, 0xfe, 0, 1, 0, 0]);
        let frame = Frame::parse(&data).unwrap();

        match classify(&frame) {
            Packet::Ipv4 {
                header,
                kind: Ipv4Kind::IcmpEchoRequest(icmp),
            } => {
                assert_eq!(header.dst_addr(), Ipv4Addr::new(10, 0, 20, 1));
                assert_eq!(icmp.identifier(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_icmp_other_and_udp() {
        let data = ipv4_frame(Protocol::Icmp, &[0, 0, 0, 0, 0, 1, 0, 0]);
        let frame = Frame::parse(&data).unwrap();
        assert!(matches!(
            classify(&frame),
            Packet::Ipv4 {
                kind: Ipv4Kind::IcmpOther,
                ..
            }
        ));

        let data = ipv4_frame(Protocol::Udp, &[0; 8]);
        let frame = Frame::parse(&data).unwrap();
        assert!(matches!(
            classify(&frame),
            Packet::Ipv4 {
                kind: Ipv4Kind::Other,
                ..
            }
        ));
    }

    #[test]
    fn test_tagged_arp_and_lldp() {
        let arp = crate::protocol::arp::ArpPacket::request(
            MacAddr([0, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(10, 0, 10, 1),
            Ipv4Addr::new(10, 0, 10, 254),
        );
        let data = FrameBuilder::new()
            .dst_mac(MacAddr::BROADCAST)
            .src_mac(MacAddr([0, 0, 0, 0, 0, 1]))
            .vlan_tag(VlanTag::new(10))
            .ethertype(EtherType::Arp)
            .payload(&arp.to_bytes())
            .build();
        let frame = Frame::parse(&data).unwrap();
        assert!(matches!(classify(&frame), Packet::Arp(p) if p == arp));

        let data = FrameBuilder::new()
            .dst_mac(MacAddr::LLDP_MULTICAST)
            .src_mac(MacAddr([0, 0, 0, 0, 0, 1]))
            .ethertype(EtherType::Lldp)
            .build();
        let frame = Frame::parse(&data).unwrap();
        assert!(matches!(classify(&frame), Packet::Lldp));
    }

    #[test]
    fn test_truncated_arp_is_other() {
        let data = FrameBuilder::new()
            .dst_mac(MacAddr::BROADCAST)
            .src_mac(MacAddr([0, 0, 0, 0, 0, 1]))
            .ethertype(EtherType::Arp)
            .payload(&[0, 1, 8, 0])
            .build();
        let frame = Frame::parse(&data).unwrap();
        assert!(matches!(classify(&frame), Packet::Other));
    }
}
