//! Aggregation Sink Port
//!
//! Where records forwarded to this node end up.

use crate::domain::entities::RoutableRecord;
use async_trait::async_trait;

#[async_trait]
pub trait AggregationSink: Send + Sync {
    async fn accept(&self, records: Vec<RoutableRecord>);
}
