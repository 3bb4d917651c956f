//! Logging Sink
//!
//! AggregationSink that only logs and counts what reaches this node.
//! Stands in for the aggregation layer, which lives outside this crate.

use crate::domain::entities::RoutableRecord;
use crate::domain::ports::AggregationSink;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct LoggingSink {
    accepted: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records accepted since start.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AggregationSink for LoggingSink {
    async fn accept(&self, records: Vec<RoutableRecord>) {
        let total = self.accepted.fetch_add(records.len() as u64, Ordering::Relaxed) + records.len() as u64;
        for record in &records {
            tracing::debug!(
                key = %record.key,
                created_at_ms = record.record.created_at_ms,
                bytes = record.record.payload.len(),
                "record accepted for aggregation"
            );
        }
        tracing::trace!(batch = records.len(), total, "aggregation batch accepted");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::Record;

    #[tokio::test]
    async fn test_accept_counts_records() {
        let sink = LoggingSink::new();
        sink.accept(vec![
            RoutableRecord::new("a", Record::new(b"1".to_vec())),
            RoutableRecord::new("b", Record::new(b"2".to_vec())),
        ])
        .await;
        sink.accept(Vec::new()).await;
        assert_eq!(sink.accepted(), 2);
    }
}
