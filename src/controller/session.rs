//! Per-switch state and the messages sent when a switch comes up

use super::arp_table::ArpTable;
use super::gateway::Gateways;
use super::mac_table::MacTable;
use super::ports::PortMap;
use crate::config::{TableConfig, TimerConfig};
use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::ipv4::Protocol;
use crate::protocol::lldp::LldpPdu;
use crate::protocol::openflow::{port, Action, FlowMod, Match, Message, PacketOut, CML_NO_BUFFER};
use crate::protocol::{EtherType, MacAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Source MAC of keepalive LLDP frames
const KEEPALIVE_SRC: MacAddr = MacAddr([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
/// TTL advertised in keepalive LLDP frames
const KEEPALIVE_TTL_SECS: u16 = 120;

/// MAC and ARP tables of one switch, locked together per packet
#[derive(Debug, Default)]
pub struct LearningTables {
    pub mac: MacTable,
    pub arp: ArpTable,
}

impl LearningTables {
    pub fn new(timers: &TimerConfig, limits: &TableConfig) -> Self {
        Self {
            mac: MacTable::new(
                Duration::from_secs(timers.mac_aging_secs),
                limits.max_mac_entries,
            ),
            arp: ArpTable::new(
                Duration::from_secs(timers.arp_aging_secs),
                limits.max_arp_entries,
            ),
        }
    }
}

/// A connected switch
#[derive(Debug)]
pub struct Switch {
    dpid: u64,
    ports: Arc<PortMap>,
    tables: Mutex<LearningTables>,
}

impl Switch {
    pub fn new(dpid: u64, ports: Arc<PortMap>, tables: LearningTables) -> Self {
        Self {
            dpid,
            ports,
            tables: Mutex::new(tables),
        }
    }

    pub fn dpid(&self) -> u64 {
        self.dpid
    }

    pub fn ports(&self) -> &PortMap {
        &self.ports
    }

    /// Lock the learning tables
    ///
    /// A panic while holding the lock leaves the tables usable, so poisoning
    /// is ignored.
    pub fn tables(&self) -> MutexGuard<'_, LearningTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Flows every switch carries from the moment it connects
///
/// Order: table-miss, ARP to controller, one entry per gateway IP, ICMP to
/// controller.
pub fn base_flows(gateways: &Gateways) -> Vec<FlowMod> {
    let to_controller = || vec![Action::output(port::CONTROLLER)];

    let mut flows = vec![
        FlowMod::add(0, Match::any(), to_controller()),
        FlowMod::add(100, Match::any().eth_type(EtherType::Arp), to_controller()),
    ];
    flows.extend(gateways.iter().map(|gw| {
        FlowMod::add(
            60,
            Match::any().eth_type(EtherType::Ipv4).ipv4_dst(gw.ip),
            to_controller(),
        )
        .idle_timeout(300)
    }));
    flows.push(
        FlowMod::add(
            70,
            Match::any()
                .eth_type(EtherType::Ipv4)
                .ip_proto(Protocol::Icmp as u8),
            to_controller(),
        )
        .idle_timeout(180),
    );
    flows
}

/// Messages sent after the features reply: config, wipe, base flows
pub fn setup_messages(gateways: &Gateways) -> Vec<Message> {
    let mut messages = vec![
        Message::SetConfig {
            flags: 0,
            miss_send_len: CML_NO_BUFFER,
        },
        Message::FlowMod(FlowMod::delete_all()),
    ];
    messages.extend(base_flows(gateways).into_iter().map(Message::FlowMod));
    messages
}

/// One LLDP packet-out per trunk port of the switch
pub fn keepalive_frames(dpid: u64, ports: &PortMap) -> Vec<Message> {
    ports
        .trunk_ports()
        .map(|port| {
            let lldp = LldpPdu::new(dpid.to_string(), port.to_string(), KEEPALIVE_TTL_SECS);
            let frame = FrameBuilder::new()
                .dst_mac(MacAddr::LLDP_MULTICAST)
                .src_mac(KEEPALIVE_SRC)
                .ethertype(EtherType::Lldp)
                .payload(&lldp.to_bytes())
                .build();
            Message::PacketOut(PacketOut::synthesized(frame, vec![Action::output(port)]))
        })
        .collect()
}
