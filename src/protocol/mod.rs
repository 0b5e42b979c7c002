//! Network protocol implementations
//!
//! Frame codecs the controller parses out of packet-ins and synthesizes for
//! packet-outs, plus the OpenFlow 1.3 wire protocol itself. All implemented
//! from scratch.

pub mod arp;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod lldp;
pub mod openflow;
pub mod types;

pub use types::*;
