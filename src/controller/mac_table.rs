//! MAC learning table for one switch
//!
//! Keyed by MAC alone: a host seen on a new port or VLAN simply moves.
//! Time is passed in by the caller so aging can be driven deterministically.

use super::ports::PortId;
use crate::protocol::MacAddr;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default aging time in seconds
pub const DEFAULT_MAC_AGING_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacEntry {
    pub port: PortId,
    pub vlan: u16,
    pub last_seen: Instant,
}

#[derive(Debug)]
pub struct MacTable {
    entries: HashMap<MacAddr, MacEntry>,
    max_age: Duration,
    /// 0 = unbounded
    capacity: usize,
}

impl Default for MacTable {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_MAC_AGING_SECS), 0)
    }
}

impl MacTable {
    pub fn new(max_age: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_age,
            capacity,
        }
    }

    /// Record `mac` as seen on `port` in `vlan` at `now`
    pub fn learn(&mut self, mac: MacAddr, port: PortId, vlan: u16, now: Instant) {
        if self.capacity > 0
            && self.entries.len() >= self.capacity
            && !self.entries.contains_key(&mac)
        {
            self.evict_oldest();
        }

        self.entries.insert(
            mac,
            MacEntry {
                port,
                vlan,
                last_seen: now,
            },
        );
    }

    pub fn lookup(&self, mac: &MacAddr) -> Option<&MacEntry> {
        self.entries.get(mac)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_seen)
            .map(|(mac, _)| *mac);
        if let Some(mac) = oldest {
            self.entries.remove(&mac);
        }
    }

    /// Remove entries not refreshed for the aging time; returns the number removed
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
