//! Flowgate - OpenFlow VLAN controller
//!
//! Drives OpenFlow 1.3 switches as a multi-VLAN learning switch with a
//! minimal inter-VLAN router: gateway proxy-ARP, ICMP echo termination and
//! reactive flow installation. Wire formats are implemented in-crate.

pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod server;
pub mod telemetry;

pub use error::{Error, Result};
