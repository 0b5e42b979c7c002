//! Ethernet frame parsing and construction

use super::{EtherType, MacAddr, VlanTag};
use crate::{Error, Result};

/// Untagged Ethernet header length
pub const HEADER_SIZE: usize = 14;
/// Ethernet header length with one 802.1Q tag
pub const TAGGED_HEADER_SIZE: usize = 18;
/// Maximum Ethernet frame size (without FCS, with VLAN tag)
pub const MAX_FRAME_SIZE: usize = 1522;

/// Parsed Ethernet frame (zero-copy reference)
#[derive(Debug)]
pub struct Frame<'a> {
    buffer: &'a [u8],
    dst_mac: MacAddr,
    src_mac: MacAddr,
    vlan_tag: Option<VlanTag>,
    ethertype: u16,
    payload_offset: usize,
}

impl<'a> Frame<'a> {
    /// Parse an Ethernet frame, reading through a single 802.1Q tag
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::Parse("frame too short".into()));
        }

        let dst_mac = MacAddr::from_slice(&buffer[0..6])
            .ok_or_else(|| Error::Parse("frame too short".into()))?;
        let src_mac = MacAddr::from_slice(&buffer[6..12])
            .ok_or_else(|| Error::Parse("frame too short".into()))?;
        let outer_type = u16::from_be_bytes([buffer[12], buffer[13]]);

        let (vlan_tag, ethertype, payload_offset) = if outer_type == EtherType::Vlan as u16 {
            if buffer.len() < TAGGED_HEADER_SIZE {
                return Err(Error::Parse("VLAN frame too short".into()));
            }
            let tag = VlanTag::from_bytes([buffer[14], buffer[15]]);
            let inner = u16::from_be_bytes([buffer[16], buffer[17]]);
            (Some(tag), inner, TAGGED_HEADER_SIZE)
        } else {
            (None, outer_type, HEADER_SIZE)
        };

        Ok(Self {
            buffer,
            dst_mac,
            src_mac,
            vlan_tag,
            ethertype,
            payload_offset,
        })
    }

    pub fn dst_mac(&self) -> MacAddr {
        self.dst_mac
    }

    pub fn src_mac(&self) -> MacAddr {
        self.src_mac
    }

    /// EtherType of the payload (inner type for tagged frames)
    pub fn ethertype(&self) -> u16 {
        self.ethertype
    }

    pub fn vlan_tag(&self) -> Option<VlanTag> {
        self.vlan_tag
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buffer[self.payload_offset..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.buffer
    }
}

/// Builder for constructing Ethernet frames
pub struct FrameBuilder {
    buffer: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_SIZE),
        }
    }

    pub fn dst_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn vlan_tag(mut self, tag: VlanTag) -> Self {
        self.buffer
            .extend_from_slice(&(EtherType::Vlan as u16).to_be_bytes());
        self.buffer.extend_from_slice(&tag.to_bytes());
        self
    }

    pub fn ethertype(mut self, ethertype: EtherType) -> Self {
        self.buffer
            .extend_from_slice(&(ethertype as u16).to_be_bytes());
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.buffer.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
