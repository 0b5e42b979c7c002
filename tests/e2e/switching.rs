//! Packet-in handling over a live connection
//!
//! Topology (edge switch, dpid 1):
//! ```text
//!   host A (10.0.10.1) -- port 1 --+
//!                                   |-- switch --- port 3 (trunk)
//!   host B (10.0.10.2) -- port 2 --+
//! ```

use super::fake_switch::{edge_config, FakeSwitch, RunningController};
use flowgate::protocol::arp::{ArpOp, ArpPacket};
use flowgate::protocol::ethernet::{Frame, FrameBuilder};
use flowgate::protocol::openflow::{Action, Message, PacketIn, PacketOut};
use flowgate::protocol::{EtherType, MacAddr};
use std::net::Ipv4Addr;

const HOST_A: MacAddr = MacAddr([0x02, 0, 0, 0, 0x10, 0x01]);
const HOST_B: MacAddr = MacAddr([0x02, 0, 0, 0, 0x10, 0x02]);
const IP_A: Ipv4Addr = Ipv4Addr::new(10, 0, 10, 1);
const IP_B: Ipv4Addr = Ipv4Addr::new(10, 0, 10, 2);
const GW_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 10, 254);
const GW_MAC: MacAddr = MacAddr([0, 0, 0, 0, 0x01, 0x0a]);

async fn ready_switch(lab: &RunningController) -> FakeSwitch {
    let mut switch = FakeSwitch::connect(lab.addr).await;
    switch.handshake(1, 5).await;
    switch.recv().await; // keepalive on the trunk
    switch
}

fn arp_frame(arp: &ArpPacket, dst: MacAddr) -> Vec<u8> {
    FrameBuilder::new()
        .dst_mac(dst)
        .src_mac(arp.sender_mac)
        .ethertype(EtherType::Arp)
        .payload(&arp.to_bytes())
        .build()
}

async fn expect_packet_out(switch: &mut FakeSwitch) -> PacketOut {
    match switch.recv().await.1 {
        Message::PacketOut(out) => out,
        other => panic!("expected packet-out, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gateway_arp_is_proxied() {
    let lab = RunningController::start(&edge_config(1, 3600)).await;
    let mut switch = ready_switch(&lab).await;

    let request = ArpPacket::request(HOST_A, IP_A, GW_IP);
    switch
        .send(&Message::PacketIn(PacketIn::new(
            1,
            arp_frame(&request, MacAddr::BROADCAST),
        )))
        .await;

    let out = expect_packet_out(&mut switch).await;
    assert_eq!(out.actions, vec![Action::output(1)]);

    let frame = Frame::parse(&out.data).unwrap();
    assert_eq!(frame.dst_mac(), HOST_A);
    assert_eq!(frame.src_mac(), GW_MAC);
    let reply = ArpPacket::parse(frame.payload()).unwrap();
    assert_eq!(reply.operation, ArpOp::Reply);
    assert_eq!(reply.sender_ip, GW_IP);
    assert_eq!(reply.sender_mac, GW_MAC);
    assert_eq!(reply.target_ip, IP_A);

    assert_eq!(lab.controller.metrics().arp_proxied.get(), 1);
}

#[tokio::test]
async fn test_learned_host_gets_flow() {
    let lab = RunningController::start(&edge_config(1, 3600)).await;
    let mut switch = ready_switch(&lab).await;

    // A asks for B: flooded to port 2 and the trunk
    let request = ArpPacket::request(HOST_A, IP_A, IP_B);
    switch
        .send(&Message::PacketIn(PacketIn::new(
            1,
            arp_frame(&request, MacAddr::BROADCAST),
        )))
        .await;
    let flood = expect_packet_out(&mut switch).await;
    assert_eq!(
        flood.actions,
        vec![
            Action::output(2),
            Action::push_vlan(),
            Action::set_vlan_vid(10),
            Action::output(3),
        ]
    );

    // B answers: A is known on port 1, but ARP replies are flooded too
    let reply = ArpPacket {
        operation: ArpOp::Reply,
        sender_mac: HOST_B,
        sender_ip: IP_B,
        target_mac: HOST_A,
        target_ip: IP_A,
    };
    switch
        .send(&Message::PacketIn(PacketIn::new(2, arp_frame(&reply, HOST_A))))
        .await;
    expect_packet_out(&mut switch).await;

    // Unicast A -> B installs a flow ahead of the packet-out
    let data = FrameBuilder::new()
        .dst_mac(HOST_B)
        .src_mac(HOST_A)
        .ethertype(EtherType::Ipv6)
        .payload(&[0u8; 40])
        .build();
    switch
        .send(&Message::PacketIn(PacketIn::new(1, data.clone())))
        .await;

    let Message::FlowMod(flow) = switch.recv().await.1 else {
        panic!("expected flow-mod");
    };
    assert_eq!(flow.priority, 50);
    // The flow matches tagged frames only, so access egress strips the tag
    assert_eq!(flow.actions, vec![Action::pop_vlan(), Action::output(2)]);

    let out = expect_packet_out(&mut switch).await;
    assert_eq!(out.actions, vec![Action::output(2)]);
    assert_eq!(out.data, data);
}
