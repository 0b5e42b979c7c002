//! ARP table (IP to MAC/port/VLAN binding) for one switch

use super::ports::PortId;
use crate::protocol::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// Default aging time in seconds
pub const DEFAULT_ARP_AGING_SECS: u64 = 240;

/// ARP table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpEntry {
    pub mac: MacAddr,
    pub port: PortId,
    pub vlan: u16,
    pub last_seen: Instant,
}

/// ARP bindings learned from requests and replies
#[derive(Debug)]
pub struct ArpTable {
    entries: HashMap<Ipv4Addr, ArpEntry>,
    max_age: Duration,
    capacity: usize,
}

impl Default for ArpTable {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_ARP_AGING_SECS), 0)
    }
}

impl ArpTable {
    /// `capacity` 0 means unbounded
    pub fn new(max_age: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_age,
            capacity,
        }
    }

    /// Insert or update a binding
    pub fn learn(&mut self, ip: Ipv4Addr, mac: MacAddr, port: PortId, vlan: u16, now: Instant) {
        if self.capacity > 0
            && self.entries.len() >= self.capacity
            && !self.entries.contains_key(&ip)
        {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(ip, _)| *ip);
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            ip,
            ArpEntry {
                mac,
                port,
                vlan,
                last_seen: now,
            },
        );
    }

    pub fn lookup(&self, ip: &Ipv4Addr) -> Option<&ArpEntry> {
        self.entries.get(ip)
    }

    /// Drop bindings older than the aging time; returns the number removed
    pub fn age_out(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let max_age = self.max_age;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.last_seen) < max_age);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
