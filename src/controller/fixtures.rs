//! Lab topology and frame builders shared by the controller tests

use super::Controller;
use crate::config::{Config, PortConfig, SwitchConfig};
use crate::protocol::arp::{ArpOp, ArpPacket};
use crate::protocol::ethernet::{Frame, FrameBuilder};
use crate::protocol::ipv4::{checksum, Ipv4Builder, Protocol};
use crate::protocol::openflow::{Action, FlowMod, Message, PacketIn, PacketOut};
use crate::protocol::{EtherType, MacAddr, VlanTag};
use crate::telemetry::MetricsRegistry;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

pub const HOST_10_A: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x10, 0x01]);
pub const HOST_10_B: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x10, 0x02]);
pub const HOST_20_A: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x20, 0x01]);

pub const IP_10_A: Ipv4Addr = Ipv4Addr::new(10, 0, 10, 1);
pub const IP_10_B: Ipv4Addr = Ipv4Addr::new(10, 0, 10, 2);
pub const IP_20_A: Ipv4Addr = Ipv4Addr::new(10, 0, 20, 1);

pub const GW_10_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 10, 254);
pub const GW_20_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 20, 254);
pub const GW_10_MAC: MacAddr = MacAddr([0x00, 0x00, 0x00, 0x00, 0x01, 0x0a]);
pub const GW_20_MAC: MacAddr = MacAddr([0x00, 0x00, 0x00, 0x00, 0x01, 0x14]);

pub const ECHO_ID: u16 = 0x1234;
pub const ECHO_SEQ: u16 = 7;
pub const ECHO_DATA: &[u8] = b"flowgate ping";

/// Controller with every configured switch connected
pub struct Lab {
    pub controller: Controller,
    pub now: Instant,
}

impl Lab {
    /// Default three-switch layout
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let controller = Controller::new(&config, Arc::new(MetricsRegistry::new())).unwrap();
        for switch in &config.switches {
            controller.connect(switch.dpid);
        }
        Self {
            controller,
            now: Instant::now(),
        }
    }

    pub fn packet_in(&self, dpid: u64, port: u32, data: Vec<u8>) -> Vec<Message> {
        self.packet_in_at(dpid, port, data, self.now)
    }

    pub fn packet_in_at(&self, dpid: u64, port: u32, data: Vec<u8>, now: Instant) -> Vec<Message> {
        self.controller
            .handle_packet_in(dpid, &PacketIn::new(port, data), now)
            .unwrap()
    }
}

/// Lab gateways plus one switch (dpid 9) with a single access port
pub fn single_port_config() -> Config {
    Config {
        switches: vec![SwitchConfig {
            dpid: 9,
            ports: vec![PortConfig::access(1, 10)],
        }],
        ..Config::default()
    }
}

pub fn packet_outs(messages: &[Message]) -> Vec<&PacketOut> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::PacketOut(out) => Some(out),
            _ => None,
        })
        .collect()
}

pub fn flow_mods(messages: &[Message]) -> Vec<&FlowMod> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::FlowMod(flow) => Some(flow),
            _ => None,
        })
        .collect()
}

/// Output ports of an action list, in order
pub fn output_ports(actions: &[Action]) -> Vec<u32> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Output { port, .. } => Some(*port),
            _ => None,
        })
        .collect()
}

pub fn arp_request(mac: MacAddr, ip: Ipv4Addr, target: Ipv4Addr) -> Vec<u8> {
    FrameBuilder::new()
        .dst_mac(MacAddr::BROADCAST)
        .src_mac(mac)
        .ethertype(EtherType::Arp)
        .payload(&ArpPacket::request(mac, ip, target).to_bytes())
        .build()
}

pub fn arp_reply(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    let reply = ArpPacket {
        operation: ArpOp::Reply,
        sender_mac,
        sender_ip,
        target_mac,
        target_ip,
    };
    FrameBuilder::new()
        .dst_mac(target_mac)
        .src_mac(sender_mac)
        .ethertype(EtherType::Arp)
        .payload(&reply.to_bytes())
        .build()
}

pub fn icmp_echo(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ttl: u8,
) -> Vec<u8> {
    let mut icmp = vec![8, 0, 0, 0];
    icmp.extend_from_slice(&ECHO_ID.to_be_bytes());
    icmp.extend_from_slice(&ECHO_SEQ.to_be_bytes());
    icmp.extend_from_slice(ECHO_DATA);
    let sum = checksum(&icmp);
    icmp[2..4].copy_from_slice(&sum.to_be_bytes());

    ipv4_frame(src_mac, dst_mac, src_ip, dst_ip, ttl, Protocol::Icmp, &icmp)
}

/// UDP datagram with a zero checksum
pub fn udp_packet(src_mac: MacAddr, dst_mac: MacAddr, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Vec<u8> {
    let data = b"hello";
    let mut udp = Vec::with_capacity(8 + data.len());
    udp.extend_from_slice(&40000u16.to_be_bytes());
    udp.extend_from_slice(&9u16.to_be_bytes());
    udp.extend_from_slice(&((8 + data.len()) as u16).to_be_bytes());
    udp.extend_from_slice(&[0, 0]);
    udp.extend_from_slice(data);

    ipv4_frame(src_mac, dst_mac, src_ip, dst_ip, 64, Protocol::Udp, &udp)
}

fn ipv4_frame(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ttl: u8,
    protocol: Protocol,
    payload: &[u8],
) -> Vec<u8> {
    let ip = Ipv4Builder::new()
        .ttl(ttl)
        .protocol(protocol)
        .src_addr(src_ip)
        .dst_addr(dst_ip)
        .payload(payload)
        .build();
    FrameBuilder::new()
        .dst_mac(dst_mac)
        .src_mac(src_mac)
        .ethertype(EtherType::Ipv4)
        .payload(&ip)
        .build()
}

/// Insert an 802.1Q tag after the MAC addresses
pub fn tagged(mut frame: Vec<u8>, vlan: u16) -> Vec<u8> {
    let mut tag = (EtherType::Vlan as u16).to_be_bytes().to_vec();
    tag.extend_from_slice(&VlanTag::new(vlan).to_bytes());
    frame.splice(12..12, tag);
    frame
}

/// Whether `data` is an ARP request asking for `target`
pub fn is_arp_request_for(data: &[u8], target: Ipv4Addr) -> bool {
    let Ok(frame) = Frame::parse(data) else {
        return false;
    };
    if frame.ethertype() != EtherType::Arp as u16 {
        return false;
    }
    ArpPacket::parse(frame.payload())
        .map(|arp| arp.is_request() && arp.target_ip == target)
        .unwrap_or(false)
}
