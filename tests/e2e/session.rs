//! Connection lifecycle: handshake, echo, keepalive, disconnect

use super::fake_switch::{edge_config, FakeSwitch, RunningController};
use flowgate::protocol::ethernet::Frame;
use flowgate::protocol::lldp::LldpPdu;
use flowgate::protocol::openflow::{Action, FlowModCommand, Message, CML_NO_BUFFER};
use flowgate::protocol::MacAddr;
use std::time::Duration;

#[tokio::test]
async fn test_handshake_installs_base_flows() {
    let lab = RunningController::start(&edge_config(1, 3600)).await;
    let mut switch = FakeSwitch::connect(lab.addr).await;

    let setup = switch.handshake(1, 5).await;

    assert_eq!(
        setup[0],
        Message::SetConfig {
            flags: 0,
            miss_send_len: CML_NO_BUFFER
        }
    );
    let flows: Vec<_> = setup[1..]
        .iter()
        .map(|m| match m {
            Message::FlowMod(flow) => flow.clone(),
            other => panic!("expected flow-mod, got {:?}", other),
        })
        .collect();

    assert_eq!(flows[0].command, FlowModCommand::Delete);
    let installed: Vec<(u16, u16)> = flows[1..]
        .iter()
        .map(|f| (f.priority, f.idle_timeout))
        .collect();
    assert_eq!(installed, vec![(0, 0), (100, 0), (60, 300), (60, 300), (70, 180)]);
    assert!(flows[1..].iter().all(|f| f.command == FlowModCommand::Add));
    assert_eq!(lab.controller.session_count(), 1);
}

#[tokio::test]
async fn test_echo_request_answered() {
    let lab = RunningController::start(&edge_config(1, 3600)).await;
    let mut switch = FakeSwitch::connect(lab.addr).await;
    switch.recv().await;
    switch.recv().await;

    switch
        .send_with_xid(42, &Message::EchoRequest(b"ping".to_vec()))
        .await;

    let (header, reply) = switch.recv().await;
    assert_eq!(header.xid, 42);
    assert_eq!(reply, Message::EchoReply(b"ping".to_vec()));
}

#[tokio::test]
async fn test_keepalive_lldp_on_trunks() {
    let lab = RunningController::start(&edge_config(5, 1)).await;
    let mut switch = FakeSwitch::connect(lab.addr).await;
    switch.handshake(5, 5).await;

    // First tick fires immediately, the second one a period later
    for _ in 0..2 {
        let (_, message) = switch.recv().await;
        let Message::PacketOut(out) = message else {
            panic!("expected packet-out, got {:?}", message);
        };
        assert_eq!(out.actions, vec![Action::output(3)]);

        let frame = Frame::parse(&out.data).unwrap();
        assert_eq!(frame.dst_mac(), MacAddr::LLDP_MULTICAST);
        let lldp = LldpPdu::parse(frame.payload()).unwrap();
        assert_eq!(lldp.chassis_id, "5");
        assert_eq!(lldp.port_id, "3");
        assert_eq!(lldp.ttl_secs, 120);
    }
}

#[tokio::test]
async fn test_disconnect_removes_session() {
    let lab = RunningController::start(&edge_config(1, 3600)).await;
    let mut switch = FakeSwitch::connect(lab.addr).await;
    switch.handshake(1, 5).await;
    assert!(lab.controller.session(1).is_some());

    drop(switch);

    for _ in 0..100 {
        if lab.controller.session_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session still registered after disconnect");
}

#[tokio::test]
async fn test_undecodable_message_keeps_connection() {
    let lab = RunningController::start(&edge_config(1, 3600)).await;
    let mut switch = FakeSwitch::connect(lab.addr).await;
    switch.handshake(1, 5).await;
    switch.recv().await; // keepalive

    // PACKET_IN whose body stops after the buffer id
    switch
        .send_raw(&[0x04, 10, 0x00, 0x0c, 0, 0, 0, 9, 0xff, 0xff, 0xff, 0xff])
        .await;
    switch
        .send_with_xid(7, &Message::EchoRequest(Vec::new()))
        .await;

    let (header, reply) = switch.recv().await;
    assert_eq!(header.xid, 7);
    assert_eq!(reply, Message::EchoReply(Vec::new()));
    assert_eq!(lab.controller.session_count(), 1);
}
