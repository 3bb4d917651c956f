//! Metrics Store Port
//!
//! Defines the interface for counting what the relay sent, lost and dropped.

/// Snapshot of the counters kept for one outbound channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounters {
    /// Records delivered successfully
    pub sent_records: u64,
    /// Batches whose call failed
    pub failed_batches: u64,
    /// Records discarded with a failed batch
    pub lost_records: u64,
}

/// Store for runtime counters.
///
/// Channels are identified by the sender name (collector or peer address).
pub trait MetricsStore: Send + Sync {
    /// Record a batch that was delivered.
    fn record_sent(&self, channel: &str, records: usize);

    /// Record a batch that failed and was discarded.
    fn record_send_failure(&self, channel: &str, records: usize);

    /// Record a record dropped because no node could take it.
    fn record_no_route(&self);

    /// Counters for a channel (zeroes if never seen).
    fn channel_counters(&self, channel: &str) -> ChannelCounters;

    /// Total records dropped for lack of a route.
    fn no_route_count(&self) -> u64;
}
