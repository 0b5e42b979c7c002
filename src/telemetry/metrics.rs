//! Metrics collection for controller decisions.
//!
//! Provides thread-safe counters for the decision engine and the aging
//! sweeper, plus per-switch OpenFlow message statistics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-switch OpenFlow message statistics.
#[derive(Debug, Default)]
pub struct SwitchStats {
    /// Packet-in messages received.
    pub packet_ins: Counter,
    /// Packet-out messages sent.
    pub packet_outs: Counter,
    /// Flow-mod messages sent.
    pub flow_mods: Counter,
    /// Messages that failed to decode or handle.
    pub errors: Counter,
}

impl SwitchStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Global metrics registry for the controller.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Per-switch statistics keyed by datapath id.
    switches: RwLock<HashMap<u64, SwitchStats>>,

    /// Packet-ins accepted by the decision engine.
    pub packets_in: Counter,

    // ARP
    /// Gateway ARP requests answered by the controller.
    pub arp_proxied: Counter,
    /// ARP requests originated for unresolved routing destinations.
    pub arp_requests_sent: Counter,

    // IPv4 / ICMP
    /// ICMP echo replies sent on behalf of a gateway.
    pub icmp_echo_replies: Counter,
    /// Packets rewritten and sent across VLANs.
    pub packets_routed: Counter,
    /// IPv4 packets dropped for TTL <= 1.
    pub ttl_expired: Counter,

    // Forwarding
    /// Flow entries installed reactively.
    pub flows_installed: Counter,
    /// Packets flooded within a VLAN.
    pub packets_flooded: Counter,
    /// Packets dropped for any other reason (no egress, unresolved route).
    pub packets_dropped: Counter,

    // Aging
    /// MAC entries removed by the sweeper.
    pub mac_entries_aged: Counter,
    /// ARP entries removed by the sweeper.
    pub arp_entries_aged: Counter,

    // Gauges
    /// Connected switches.
    pub switches_connected: AtomicU64,
    /// MAC entries across all switches.
    pub mac_table_size: AtomicU64,
    /// ARP entries across all switches.
    pub arp_table_size: AtomicU64,
}

impl MetricsRegistry {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a switch; existing statistics are kept across reconnects.
    pub fn register_switch(&self, dpid: u64) {
        let mut switches = self
            .switches
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        switches.entry(dpid).or_default();
    }

    fn with_switch(&self, dpid: u64, f: impl FnOnce(&SwitchStats)) {
        let switches = self.switches.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(stats) = switches.get(&dpid) {
            f(stats);
        }
    }

    pub fn record_packet_in(&self, dpid: u64) {
        self.with_switch(dpid, |s| s.packet_ins.inc());
    }

    pub fn record_packet_out(&self, dpid: u64) {
        self.with_switch(dpid, |s| s.packet_outs.inc());
    }

    pub fn record_flow_mod(&self, dpid: u64) {
        self.with_switch(dpid, |s| s.flow_mods.inc());
    }

    pub fn record_error(&self, dpid: u64) {
        self.with_switch(dpid, |s| s.errors.inc());
    }

    pub fn set_switches_connected(&self, count: usize) {
        self.switches_connected
            .store(count as u64, Ordering::Relaxed);
    }

    pub fn set_mac_table_size(&self, size: usize) {
        self.mac_table_size.store(size as u64, Ordering::Relaxed);
    }

    pub fn set_arp_table_size(&self, size: usize) {
        self.arp_table_size.store(size as u64, Ordering::Relaxed);
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("packets_in".into(), self.packets_in.get()),
            ("arp_proxied".into(), self.arp_proxied.get()),
            ("arp_requests_sent".into(), self.arp_requests_sent.get()),
            ("icmp_echo_replies".into(), self.icmp_echo_replies.get()),
            ("packets_routed".into(), self.packets_routed.get()),
            ("ttl_expired".into(), self.ttl_expired.get()),
            ("flows_installed".into(), self.flows_installed.get()),
            ("packets_flooded".into(), self.packets_flooded.get()),
            ("packets_dropped".into(), self.packets_dropped.get()),
            ("mac_entries_aged".into(), self.mac_entries_aged.get()),
            ("arp_entries_aged".into(), self.arp_entries_aged.get()),
            (
                "switches_connected".into(),
                self.switches_connected.load(Ordering::Relaxed),
            ),
            (
                "mac_table_size".into(),
                self.mac_table_size.load(Ordering::Relaxed),
            ),
            (
                "arp_table_size".into(),
                self.arp_table_size.load(Ordering::Relaxed),
            ),
        ];

        let switches = self.switches.read().unwrap_or_else(PoisonError::into_inner);
        let mut dpids: Vec<_> = switches.keys().copied().collect();
        dpids.sort_unstable();
        for dpid in dpids {
            let stats = &switches[&dpid];
            result.extend([
                (format!("switch{}_packet_ins", dpid), stats.packet_ins.get()),
                (format!("switch{}_packet_outs", dpid), stats.packet_outs.get()),
                (format!("switch{}_flow_mods", dpid), stats.flow_mods.get()),
                (format!("switch{}_errors", dpid), stats.errors.get()),
            ]);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_basic() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);

        counter.inc();
        assert_eq!(counter.get(), 1);

        counter.add(10);
        assert_eq!(counter.get(), 11);
    }

    #[test]
    fn test_unregistered_switch_is_ignored() {
        let registry = MetricsRegistry::new();
        registry.record_packet_in(9);

        assert!(!registry
            .export()
            .iter()
            .any(|(name, _)| name.starts_with("switch9")));
    }

    #[test]
    fn test_metrics_registry() {
        let registry = MetricsRegistry::new();

        registry.register_switch(1);
        registry.register_switch(3);

        registry.record_packet_in(1);
        registry.record_packet_in(1);
        registry.record_flow_mod(3);

        registry.packets_routed.inc();
        registry.arp_requests_sent.add(5);
        registry.set_switches_connected(2);

        let metrics = registry.export();

        assert!(metrics.contains(&("packets_routed".into(), 1)));
        assert!(metrics.contains(&("arp_requests_sent".into(), 5)));
        assert!(metrics.contains(&("switches_connected".into(), 2)));

        assert!(metrics.contains(&("switch1_packet_ins".into(), 2)));
        assert!(metrics.contains(&("switch3_flow_mods".into(), 1)));
        assert!(metrics.contains(&("switch3_packet_ins".into(), 0)));
    }
}
