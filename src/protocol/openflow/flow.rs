//! Match, action and flow-table message bodies

use super::reader::Reader;
use super::{port, CML_NO_BUFFER, GROUP_ANY, NO_BUFFER, TABLE_ALL, VID_PRESENT};
use crate::protocol::{EtherType, MacAddr};
use crate::{Error, Result};
use std::net::Ipv4Addr;

const OFPMT_OXM: u16 = 1;
const OXM_CLASS_BASIC: u16 = 0x8000;
const OFPIT_APPLY_ACTIONS: u16 = 4;

const OFPAT_OUTPUT: u16 = 0;
const OFPAT_PUSH_VLAN: u16 = 17;
const OFPAT_POP_VLAN: u16 = 18;
const OFPAT_SET_FIELD: u16 = 25;

/// OXM basic-class field codes
mod oxm {
    pub const IN_PORT: u8 = 0;
    pub const ETH_DST: u8 = 3;
    pub const ETH_SRC: u8 = 4;
    pub const ETH_TYPE: u8 = 5;
    pub const VLAN_VID: u8 = 6;
    pub const IP_PROTO: u8 = 10;
    pub const IPV4_SRC: u8 = 11;
    pub const IPV4_DST: u8 = 12;
}

fn pad_to_8(buf: &mut Vec<u8>, len: usize) {
    buf.resize(buf.len() + (8 - len % 8) % 8, 0);
}

/// A single exact-match OXM field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OxmField {
    InPort(u32),
    EthDst(MacAddr),
    EthSrc(MacAddr),
    EthType(u16),
    /// VID including the `VID_PRESENT` bit
    VlanVid(u16),
    IpProto(u8),
    Ipv4Src(Ipv4Addr),
    Ipv4Dst(Ipv4Addr),
}

impl OxmField {
    fn code(&self) -> u8 {
        match self {
            OxmField::InPort(_) => oxm::IN_PORT,
            OxmField::EthDst(_) => oxm::ETH_DST,
            OxmField::EthSrc(_) => oxm::ETH_SRC,
            OxmField::EthType(_) => oxm::ETH_TYPE,
            OxmField::VlanVid(_) => oxm::VLAN_VID,
            OxmField::IpProto(_) => oxm::IP_PROTO,
            OxmField::Ipv4Src(_) => oxm::IPV4_SRC,
            OxmField::Ipv4Dst(_) => oxm::IPV4_DST,
        }
    }

    fn value(&self) -> Vec<u8> {
        match self {
            OxmField::InPort(port) => port.to_be_bytes().to_vec(),
            OxmField::EthDst(mac) | OxmField::EthSrc(mac) => mac.0.to_vec(),
            OxmField::EthType(ethertype) => ethertype.to_be_bytes().to_vec(),
            OxmField::VlanVid(vid) => vid.to_be_bytes().to_vec(),
            OxmField::IpProto(proto) => vec![*proto],
            OxmField::Ipv4Src(addr) | OxmField::Ipv4Dst(addr) => addr.octets().to_vec(),
        }
    }

    /// Encoded TLV length (4 byte header + value)
    fn wire_len(&self) -> usize {
        4 + self.value().len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        let value = self.value();
        buf.extend_from_slice(&OXM_CLASS_BASIC.to_be_bytes());
        buf.push(self.code() << 1);
        buf.push(value.len() as u8);
        buf.extend_from_slice(&value);
    }

    /// Decode one TLV; unknown classes, fields and masked entries yield `None`
    fn decode(r: &mut Reader<'_>) -> Result<Option<Self>> {
        let class = r.u16()?;
        let field_and_mask = r.u8()?;
        let len = r.u8()? as usize;
        let value = r.bytes(len)?;

        if class != OXM_CLASS_BASIC || field_and_mask & 1 == 1 {
            return Ok(None);
        }

        let field = match (field_and_mask >> 1, value) {
            (oxm::IN_PORT, [a, b, c, d]) => OxmField::InPort(u32::from_be_bytes([*a, *b, *c, *d])),
            (oxm::ETH_DST, v) if v.len() == 6 => {
                OxmField::EthDst(MacAddr::from_slice(v).ok_or_else(bad_oxm)?)
            }
            (oxm::ETH_SRC, v) if v.len() == 6 => {
                OxmField::EthSrc(MacAddr::from_slice(v).ok_or_else(bad_oxm)?)
            }
            (oxm::ETH_TYPE, [a, b]) => OxmField::EthType(u16::from_be_bytes([*a, *b])),
            (oxm::VLAN_VID, [a, b]) => OxmField::VlanVid(u16::from_be_bytes([*a, *b])),
            (oxm::IP_PROTO, [p]) => OxmField::IpProto(*p),
            (oxm::IPV4_SRC, [a, b, c, d]) => OxmField::Ipv4Src(Ipv4Addr::new(*a, *b, *c, *d)),
            (oxm::IPV4_DST, [a, b, c, d]) => OxmField::Ipv4Dst(Ipv4Addr::new(*a, *b, *c, *d)),
            _ => return Ok(None),
        };

        Ok(Some(field))
    }
}

fn bad_oxm() -> Error {
    Error::Protocol("malformed OXM field".into())
}

/// OXM flow match; an empty match is the table-miss wildcard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    fields: Vec<OxmField>,
}

impl Match {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: OxmField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn eth_type(self, ethertype: EtherType) -> Self {
        self.with(OxmField::EthType(ethertype as u16))
    }

    pub fn eth_dst(self, mac: MacAddr) -> Self {
        self.with(OxmField::EthDst(mac))
    }

    /// Match frames tagged with `vlan`
    pub fn vlan(self, vlan: u16) -> Self {
        self.with(OxmField::VlanVid(VID_PRESENT | vlan))
    }

    pub fn ip_proto(self, proto: u8) -> Self {
        self.with(OxmField::IpProto(proto))
    }

    pub fn ipv4_src(self, addr: Ipv4Addr) -> Self {
        self.with(OxmField::Ipv4Src(addr))
    }

    pub fn ipv4_dst(self, addr: Ipv4Addr) -> Self {
        self.with(OxmField::Ipv4Dst(addr))
    }

    pub fn fields(&self) -> &[OxmField] {
        &self.fields
    }

    pub fn in_port(&self) -> Option<u32> {
        self.fields.iter().find_map(|f| match f {
            OxmField::InPort(port) => Some(*port),
            _ => None,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        let len = 4 + self.fields.iter().map(OxmField::wire_len).sum::<usize>();
        buf.extend_from_slice(&OFPMT_OXM.to_be_bytes());
        buf.extend_from_slice(&(len as u16).to_be_bytes());
        for field in &self.fields {
            field.encode(buf);
        }
        pad_to_8(buf, len);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let match_type = r.u16()?;
        let len = r.u16()? as usize;
        if match_type != OFPMT_OXM || len < 4 {
            return Err(Error::Protocol(format!(
                "unsupported match type {} length {}",
                match_type, len
            )));
        }

        let mut fields_reader = Reader::new(r.bytes(len - 4)?);
        let mut fields = Vec::new();
        while fields_reader.remaining() > 0 {
            if let Some(field) = OxmField::decode(&mut fields_reader)? {
                fields.push(field);
            }
        }
        r.skip((8 - len % 8) % 8)?;

        Ok(Self { fields })
    }
}

/// Apply-actions entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Output { port: u32, max_len: u16 },
    PushVlan { ethertype: u16 },
    PopVlan,
    SetField(OxmField),
}

impl Action {
    /// Output to `port`; frames sent to the controller are not truncated
    pub fn output(port: u32) -> Self {
        let max_len = if port == port::CONTROLLER {
            CML_NO_BUFFER
        } else {
            0
        };
        Action::Output { port, max_len }
    }

    /// Push an 802.1Q header
    pub fn push_vlan() -> Self {
        Action::PushVlan {
            ethertype: EtherType::Vlan as u16,
        }
    }

    /// Strip the outermost 802.1Q header
    pub fn pop_vlan() -> Self {
        Action::PopVlan
    }

    /// Set the VID of the outermost tag
    pub fn set_vlan_vid(vlan: u16) -> Self {
        Action::SetField(OxmField::VlanVid(VID_PRESENT | vlan))
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Action::Output { port, max_len } => {
                buf.extend_from_slice(&OFPAT_OUTPUT.to_be_bytes());
                buf.extend_from_slice(&16u16.to_be_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
                buf.extend_from_slice(&max_len.to_be_bytes());
                buf.extend_from_slice(&[0u8; 6]);
            }
            Action::PushVlan { ethertype } => {
                buf.extend_from_slice(&OFPAT_PUSH_VLAN.to_be_bytes());
                buf.extend_from_slice(&8u16.to_be_bytes());
                buf.extend_from_slice(&ethertype.to_be_bytes());
                buf.extend_from_slice(&[0u8; 2]);
            }
            Action::PopVlan => {
                buf.extend_from_slice(&OFPAT_POP_VLAN.to_be_bytes());
                buf.extend_from_slice(&8u16.to_be_bytes());
                buf.extend_from_slice(&[0u8; 4]);
            }
            Action::SetField(field) => {
                let len = 4 + field.wire_len();
                let padded = len + (8 - len % 8) % 8;
                buf.extend_from_slice(&OFPAT_SET_FIELD.to_be_bytes());
                buf.extend_from_slice(&(padded as u16).to_be_bytes());
                field.encode(buf);
                pad_to_8(buf, len);
            }
        }
    }

    fn encode_list(actions: &[Action]) -> Vec<u8> {
        let mut buf = Vec::new();
        for action in actions {
            action.encode(&mut buf);
        }
        buf
    }

    fn decode_list(bytes: &[u8]) -> Result<Vec<Action>> {
        let mut r = Reader::new(bytes);
        let mut actions = Vec::new();

        while r.remaining() > 0 {
            let action_type = r.u16()?;
            let len = r.u16()? as usize;
            if len < 8 {
                return Err(Error::Protocol(format!("action length {} too short", len)));
            }
            let mut body = Reader::new(r.bytes(len - 4)?);

            match action_type {
                OFPAT_OUTPUT => actions.push(Action::Output {
                    port: body.u32()?,
                    max_len: body.u16()?,
                }),
                OFPAT_PUSH_VLAN => actions.push(Action::PushVlan {
                    ethertype: body.u16()?,
                }),
                OFPAT_POP_VLAN => actions.push(Action::PopVlan),
                OFPAT_SET_FIELD => {
                    if let Some(field) = OxmField::decode(&mut body)? {
                        actions.push(Action::SetField(field));
                    }
                }
                _ => {}
            }
        }

        Ok(actions)
    }
}

/// Flow-mod command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlowModCommand {
    Add = 0,
    Delete = 3,
}

impl FlowModCommand {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FlowModCommand::Add),
            3 => Ok(FlowModCommand::Delete),
            other => Err(Error::Protocol(format!("unsupported flow-mod command {}", other))),
        }
    }
}

/// OFPT_FLOW_MOD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub flags: u16,
    pub match_fields: Match,
    /// Apply-actions list; empty means no instruction (drop)
    pub actions: Vec<Action>,
}

impl FlowMod {
    /// Add a flow to table 0
    pub fn add(priority: u16, match_fields: Match, actions: Vec<Action>) -> Self {
        Self {
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            command: FlowModCommand::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority,
            buffer_id: NO_BUFFER,
            out_port: port::ANY,
            out_group: GROUP_ANY,
            flags: 0,
            match_fields,
            actions,
        }
    }

    /// Remove every flow from every table
    pub fn delete_all() -> Self {
        Self {
            table_id: TABLE_ALL,
            command: FlowModCommand::Delete,
            priority: 0,
            ..Self::add(0, Match::any(), Vec::new())
        }
    }

    pub fn idle_timeout(mut self, secs: u16) -> Self {
        self.idle_timeout = secs;
        self
    }

    pub(super) fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.cookie.to_be_bytes());
        buf.extend_from_slice(&self.cookie_mask.to_be_bytes());
        buf.push(self.table_id);
        buf.push(self.command as u8);
        buf.extend_from_slice(&self.idle_timeout.to_be_bytes());
        buf.extend_from_slice(&self.hard_timeout.to_be_bytes());
        buf.extend_from_slice(&self.priority.to_be_bytes());
        buf.extend_from_slice(&self.buffer_id.to_be_bytes());
        buf.extend_from_slice(&self.out_port.to_be_bytes());
        buf.extend_from_slice(&self.out_group.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&[0u8; 2]);
        self.match_fields.encode(buf);

        if !self.actions.is_empty() {
            let actions = Action::encode_list(&self.actions);
            buf.extend_from_slice(&OFPIT_APPLY_ACTIONS.to_be_bytes());
            buf.extend_from_slice(&((8 + actions.len()) as u16).to_be_bytes());
            buf.extend_from_slice(&[0u8; 4]);
            buf.extend_from_slice(&actions);
        }
    }

    pub(super) fn decode_body(r: &mut Reader<'_>) -> Result<Self> {
        let cookie = r.u64()?;
        let cookie_mask = r.u64()?;
        let table_id = r.u8()?;
        let command = FlowModCommand::from_u8(r.u8()?)?;
        let idle_timeout = r.u16()?;
        let hard_timeout = r.u16()?;
        let priority = r.u16()?;
        let buffer_id = r.u32()?;
        let out_port = r.u32()?;
        let out_group = r.u32()?;
        let flags = r.u16()?;
        r.skip(2)?;
        let match_fields = Match::decode(r)?;

        let mut actions = Vec::new();
        while r.remaining() > 0 {
            let inst_type = r.u16()?;
            let len = r.u16()? as usize;
            if len < 8 {
                return Err(Error::Protocol(format!("instruction length {} too short", len)));
            }
            let body = r.bytes(len - 4)?;
            if inst_type == OFPIT_APPLY_ACTIONS {
                actions.extend(Action::decode_list(&body[4..])?);
            }
        }

        Ok(Self {
            cookie,
            cookie_mask,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id,
            out_port,
            out_group,
            flags,
            match_fields,
            actions,
        })
    }
}

/// OFPT_PACKET_IN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: u8,
    pub table_id: u8,
    pub cookie: u64,
    pub match_fields: Match,
    pub data: Vec<u8>,
}

impl PacketIn {
    /// Unbuffered packet-in for `data` received on `in_port`
    pub fn new(in_port: u32, data: Vec<u8>) -> Self {
        Self {
            buffer_id: NO_BUFFER,
            total_len: data.len() as u16,
            reason: 0,
            table_id: 0,
            cookie: 0,
            match_fields: Match::any().with(OxmField::InPort(in_port)),
            data,
        }
    }

    pub fn in_port(&self) -> Option<u32> {
        self.match_fields.in_port()
    }

    pub(super) fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.buffer_id.to_be_bytes());
        buf.extend_from_slice(&self.total_len.to_be_bytes());
        buf.push(self.reason);
        buf.push(self.table_id);
        buf.extend_from_slice(&self.cookie.to_be_bytes());
        self.match_fields.encode(buf);
        buf.extend_from_slice(&[0u8; 2]);
        buf.extend_from_slice(&self.data);
    }

    pub(super) fn decode_body(r: &mut Reader<'_>) -> Result<Self> {
        let buffer_id = r.u32()?;
        let total_len = r.u16()?;
        let reason = r.u8()?;
        let table_id = r.u8()?;
        let cookie = r.u64()?;
        let match_fields = Match::decode(r)?;
        r.skip(2)?;

        Ok(Self {
            buffer_id,
            total_len,
            reason,
            table_id,
            cookie,
            match_fields,
            data: r.rest().to_vec(),
        })
    }
}

/// OFPT_PACKET_OUT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
}

impl PacketOut {
    /// Controller-originated frame
    pub fn synthesized(data: Vec<u8>, actions: Vec<Action>) -> Self {
        Self {
            buffer_id: NO_BUFFER,
            in_port: port::CONTROLLER,
            actions,
            data,
        }
    }

    /// Send back a packet-in, referencing the switch buffer when there is one
    pub fn forward(packet_in: &PacketIn, in_port: u32, actions: Vec<Action>) -> Self {
        let data = if packet_in.buffer_id == NO_BUFFER {
            packet_in.data.clone()
        } else {
            Vec::new()
        };

        Self {
            buffer_id: packet_in.buffer_id,
            in_port,
            actions,
            data,
        }
    }

    pub(super) fn encode_body(&self, buf: &mut Vec<u8>) {
        let actions = Action::encode_list(&self.actions);
        buf.extend_from_slice(&self.buffer_id.to_be_bytes());
        buf.extend_from_slice(&self.in_port.to_be_bytes());
        buf.extend_from_slice(&(actions.len() as u16).to_be_bytes());
        buf.extend_from_slice(&[0u8; 6]);
        buf.extend_from_slice(&actions);
        buf.extend_from_slice(&self.data);
    }

    pub(super) fn decode_body(r: &mut Reader<'_>) -> Result<Self> {
        let buffer_id = r.u32()?;
        let in_port = r.u32()?;
        let actions_len = r.u16()? as usize;
        r.skip(6)?;
        let actions = Action::decode_list(r.bytes(actions_len)?)?;

        Ok(Self {
            buffer_id,
            in_port,
            actions,
            data: r.rest().to_vec(),
        })
    }
}
