//! OpenFlow 1.3 wire protocol (controller subset)
//!
//! Covers the handshake, keepalive, packet-in/packet-out and flow-mod
//! messages. Messages are symmetric: everything the controller encodes can
//! be decoded again, which the switch-side test harness relies on.

mod flow;
mod reader;

pub use flow::{Action, FlowMod, FlowModCommand, Match, OxmField, PacketIn, PacketOut};

use crate::{Error, Result};
use reader::Reader;

/// Wire version byte for OpenFlow 1.3
pub const OFP_VERSION: u8 = 0x04;
/// Common header size
pub const HEADER_SIZE: usize = 8;
/// No switch-side buffer
pub const NO_BUFFER: u32 = 0xffff_ffff;
/// `max_len` asking the switch to send the whole frame to the controller
pub const CML_NO_BUFFER: u16 = 0xffff;
/// OXM VLAN_VID flag marking a tag as present
pub const VID_PRESENT: u16 = 0x1000;
/// Flow-mod table id covering all tables
pub const TABLE_ALL: u8 = 0xff;
/// Wildcard group for flow deletion
pub const GROUP_ANY: u32 = 0xffff_ffff;

/// Reserved port numbers
pub mod port {
    pub const IN_PORT: u32 = 0xffff_fff8;
    pub const CONTROLLER: u32 = 0xffff_fffd;
    pub const ANY: u32 = 0xffff_ffff;
}

/// Message type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    SetConfig = 9,
    PacketIn = 10,
    PacketOut = 13,
    FlowMod = 14,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageType::Hello),
            1 => Some(MessageType::Error),
            2 => Some(MessageType::EchoRequest),
            3 => Some(MessageType::EchoReply),
            5 => Some(MessageType::FeaturesRequest),
            6 => Some(MessageType::FeaturesReply),
            9 => Some(MessageType::SetConfig),
            10 => Some(MessageType::PacketIn),
            13 => Some(MessageType::PacketOut),
            14 => Some(MessageType::FlowMod),
            _ => None,
        }
    }
}

/// OpenFlow common header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

impl Header {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buffer);
        let header = Self {
            version: r.u8()?,
            msg_type: r.u8()?,
            length: r.u16()?,
            xid: r.u32()?,
        };

        if (header.length as usize) < HEADER_SIZE {
            return Err(Error::Protocol(format!(
                "message length {} below header size",
                header.length
            )));
        }

        Ok(header)
    }

    /// Body length following the header
    pub fn body_len(&self) -> usize {
        self.length as usize - HEADER_SIZE
    }
}

/// Switch features (datapath identity)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturesReply {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub auxiliary_id: u8,
    pub capabilities: u32,
}

/// Decoded OpenFlow message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello,
    Error { err_type: u16, code: u16, data: Vec<u8> },
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    FeaturesRequest,
    FeaturesReply(FeaturesReply),
    SetConfig { flags: u16, miss_send_len: u16 },
    PacketIn(PacketIn),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    /// Any message type this controller does not interpret
    Other { msg_type: u8, body: Vec<u8> },
}

impl Message {
    pub fn msg_type(&self) -> u8 {
        match self {
            Message::Hello => MessageType::Hello as u8,
            Message::Error { .. } => MessageType::Error as u8,
            Message::EchoRequest(_) => MessageType::EchoRequest as u8,
            Message::EchoReply(_) => MessageType::EchoReply as u8,
            Message::FeaturesRequest => MessageType::FeaturesRequest as u8,
            Message::FeaturesReply(_) => MessageType::FeaturesReply as u8,
            Message::SetConfig { .. } => MessageType::SetConfig as u8,
            Message::PacketIn(_) => MessageType::PacketIn as u8,
            Message::PacketOut(_) => MessageType::PacketOut as u8,
            Message::FlowMod(_) => MessageType::FlowMod as u8,
            Message::Other { msg_type, .. } => *msg_type,
        }
    }

    /// Serialize with a full header
    pub fn encode(&self, xid: u32) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];

        match self {
            Message::Hello | Message::FeaturesRequest => {}
            Message::Error {
                err_type,
                code,
                data,
            } => {
                buf.extend_from_slice(&err_type.to_be_bytes());
                buf.extend_from_slice(&code.to_be_bytes());
                buf.extend_from_slice(data);
            }
            Message::EchoRequest(data) | Message::EchoReply(data) => {
                buf.extend_from_slice(data);
            }
            Message::FeaturesReply(features) => {
                buf.extend_from_slice(&features.datapath_id.to_be_bytes());
                buf.extend_from_slice(&features.n_buffers.to_be_bytes());
                buf.push(features.n_tables);
                buf.push(features.auxiliary_id);
                buf.extend_from_slice(&[0, 0]);
                buf.extend_from_slice(&features.capabilities.to_be_bytes());
                buf.extend_from_slice(&0u32.to_be_bytes());
            }
            Message::SetConfig {
                flags,
                miss_send_len,
            } => {
                buf.extend_from_slice(&flags.to_be_bytes());
                buf.extend_from_slice(&miss_send_len.to_be_bytes());
            }
            Message::PacketIn(packet_in) => packet_in.encode_body(&mut buf),
            Message::PacketOut(packet_out) => packet_out.encode_body(&mut buf),
            Message::FlowMod(flow_mod) => flow_mod.encode_body(&mut buf),
            Message::Other { body, .. } => buf.extend_from_slice(body),
        }

        let length = buf.len() as u16;
        buf[0] = OFP_VERSION;
        buf[1] = self.msg_type();
        buf[2..4].copy_from_slice(&length.to_be_bytes());
        buf[4..8].copy_from_slice(&xid.to_be_bytes());
        buf
    }

    /// Decode a message body given its already parsed header
    pub fn decode(header: &Header, body: &[u8]) -> Result<Self> {
        let mut r = Reader::new(body);

        let message = match MessageType::from_u8(header.msg_type) {
            // Hello elements (version bitmaps) are not needed for a single-version controller
            Some(MessageType::Hello) => Message::Hello,
            Some(MessageType::Error) => Message::Error {
                err_type: r.u16()?,
                code: r.u16()?,
                data: r.rest().to_vec(),
            },
            Some(MessageType::EchoRequest) => Message::EchoRequest(body.to_vec()),
            Some(MessageType::EchoReply) => Message::EchoReply(body.to_vec()),
            Some(MessageType::FeaturesRequest) => Message::FeaturesRequest,
            Some(MessageType::FeaturesReply) => {
                let datapath_id = r.u64()?;
                let n_buffers = r.u32()?;
                let n_tables = r.u8()?;
                let auxiliary_id = r.u8()?;
                r.skip(2)?;
                let capabilities = r.u32()?;
                Message::FeaturesReply(FeaturesReply {
                    datapath_id,
                    n_buffers,
                    n_tables,
                    auxiliary_id,
                    capabilities,
                })
            }
            Some(MessageType::SetConfig) => Message::SetConfig {
                flags: r.u16()?,
                miss_send_len: r.u16()?,
            },
            Some(MessageType::PacketIn) => Message::PacketIn(PacketIn::decode_body(&mut r)?),
            Some(MessageType::PacketOut) => Message::PacketOut(PacketOut::decode_body(&mut r)?),
            Some(MessageType::FlowMod) => Message::FlowMod(FlowMod::decode_body(&mut r)?),
            None => Message::Other {
                msg_type: header.msg_type,
                body: body.to_vec(),
            },
        };

        Ok(message)
    }

    /// Decode one complete message (header + body) from `buffer`
    pub fn decode_frame(buffer: &[u8]) -> Result<(Header, Self)> {
        let header = Header::parse(buffer)?;
        let body = buffer
            .get(HEADER_SIZE..header.length as usize)
            .ok_or_else(|| Error::Protocol("message truncated".into()))?;
        let message = Self::decode(&header, body)?;
        Ok((header, message))
    }
}
