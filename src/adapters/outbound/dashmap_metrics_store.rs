//! DashMap Metrics Store
//!
//! Implements MetricsStore using DashMap for lock-free concurrent access.

use crate::domain::ports::{ChannelCounters, MetricsStore};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single outbound channel.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Records delivered successfully
    pub sent_records: AtomicU64,
    /// Batches whose call failed
    pub failed_batches: AtomicU64,
    /// Records discarded with a failed batch
    pub lost_records: AtomicU64,
}

/// DashMap-backed metrics store.
///
/// Each channel gets its own entry on first use.
pub struct DashMapMetricsStore {
    channels: DashMap<String, ChannelMetrics>,
    no_route: AtomicU64,
}

impl DashMapMetricsStore {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            no_route: AtomicU64::new(0),
        }
    }

    /// Names of every channel with recorded activity.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for DashMapMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore for DashMapMetricsStore {
    fn record_sent(&self, channel: &str, records: usize) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .sent_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    fn record_send_failure(&self, channel: &str, records: usize) {
        let entry = self.channels.entry(channel.to_string()).or_default();
        entry.failed_batches.fetch_add(1, Ordering::Relaxed);
        entry.lost_records.fetch_add(records as u64, Ordering::Relaxed);
    }

    fn record_no_route(&self) {
        self.no_route.fetch_add(1, Ordering::Relaxed);
    }

    fn channel_counters(&self, channel: &str) -> ChannelCounters {
        self.channels
            .get(channel)
            .map(|m| ChannelCounters {
                sent_records: m.sent_records.load(Ordering::Relaxed),
                failed_batches: m.failed_batches.load(Ordering::Relaxed),
                lost_records: m.lost_records.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    fn no_route_count(&self) -> u64 {
        self.no_route.load(Ordering::Relaxed)
    }
}
