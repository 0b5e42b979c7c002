//! LLDP (IEEE 802.1AB) - minimal chassis/port/TTL frames

use crate::{Error, Result};

/// TLV types
pub mod tlv {
    pub const END: u8 = 0;
    pub const CHASSIS_ID: u8 = 1;
    pub const PORT_ID: u8 = 2;
    pub const TTL: u8 = 3;
}

/// Chassis ID subtype "locally assigned"
pub const CHASSIS_SUBTYPE_LOCAL: u8 = 7;
/// Port ID subtype "locally assigned"
pub const PORT_SUBTYPE_LOCAL: u8 = 7;

/// The three mandatory LLDP TLVs, with locally assigned string identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LldpPdu {
    pub chassis_id: String,
    pub port_id: String,
    pub ttl_secs: u16,
}

impl LldpPdu {
    pub fn new(chassis_id: impl Into<String>, port_id: impl Into<String>, ttl_secs: u16) -> Self {
        Self {
            chassis_id: chassis_id.into(),
            port_id: port_id.into(),
            ttl_secs,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.chassis_id.len() + self.port_id.len());

        let mut value = vec![CHASSIS_SUBTYPE_LOCAL];
        value.extend_from_slice(self.chassis_id.as_bytes());
        push_tlv(&mut buf, tlv::CHASSIS_ID, &value);

        let mut value = vec![PORT_SUBTYPE_LOCAL];
        value.extend_from_slice(self.port_id.as_bytes());
        push_tlv(&mut buf, tlv::PORT_ID, &value);

        push_tlv(&mut buf, tlv::TTL, &self.ttl_secs.to_be_bytes());
        push_tlv(&mut buf, tlv::END, &[]);

        buf
    }

    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let mut chassis_id = None;
        let mut port_id = None;
        let mut ttl_secs = None;
        let mut rest = buffer;

        while rest.len() >= 2 {
            let header = u16::from_be_bytes([rest[0], rest[1]]);
            let tlv_type = (header >> 9) as u8;
            let len = (header & 0x01FF) as usize;
            let value = rest
                .get(2..2 + len)
                .ok_or_else(|| Error::Parse("LLDP TLV truncated".into()))?;

            match tlv_type {
                tlv::END => break,
                tlv::CHASSIS_ID if !value.is_empty() => {
                    chassis_id = Some(String::from_utf8_lossy(&value[1..]).into_owned());
                }
                tlv::PORT_ID if !value.is_empty() => {
                    port_id = Some(String::from_utf8_lossy(&value[1..]).into_owned());
                }
                tlv::TTL if value.len() == 2 => {
                    ttl_secs = Some(u16::from_be_bytes([value[0], value[1]]));
                }
                _ => {}
            }

            rest = &rest[2 + len..];
        }

        match (chassis_id, port_id, ttl_secs) {
            (Some(chassis_id), Some(port_id), Some(ttl_secs)) => Ok(Self {
                chassis_id,
                port_id,
                ttl_secs,
            }),
            _ => Err(Error::Parse("LLDP missing mandatory TLV".into())),
        }
    }
}

fn push_tlv(buf: &mut Vec<u8>, tlv_type: u8, value: &[u8]) {
    let header = ((tlv_type as u16) << 9) | (value.len() as u16 & 0x01FF);
    buf.extend_from_slice(&header.to_be_bytes());
    buf.extend_from_slice(value);
}
