//! Routing Dispatcher - Inbound record routing use case
//!
//! For each inbound record: take a pool snapshot, let the installed selector
//! pick the responsible node, and queue the record on that node's forward
//! path. A record that cannot be routed is dropped and counted; nothing here
//! fails the caller.

use crate::domain::entities::RoutableRecord;
use crate::domain::ports::{MetricsStore, Transport};
use crate::domain::services::{NodeSelector, RoutingError};
use crate::domain::value_objects::NodeAddress;
use crate::infrastructure::client_pool::{ClientPool, RemoteClient};
use std::sync::Arc;

/// Outcome of dispatching a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub routed: usize,
    pub dropped: usize,
}

pub struct RoutingDispatcher<C> {
    pool: Arc<ClientPool<C>>,
    selector: Box<dyn NodeSelector<Arc<RemoteClient<C>>>>,
    metrics: Arc<dyn MetricsStore>,
}

impl<C> RoutingDispatcher<C>
where
    C: Transport + 'static,
{
    /// Create a dispatcher with exactly one active selector.
    pub fn new(
        pool: Arc<ClientPool<C>>,
        selector: Box<dyn NodeSelector<Arc<RemoteClient<C>>>>,
        metrics: Arc<dyn MetricsStore>,
    ) -> Self {
        tracing::info!(selector = selector.name(), "routing dispatcher ready");
        Self {
            pool,
            selector,
            metrics,
        }
    }

    pub fn selector_name(&self) -> &'static str {
        self.selector.name()
    }

    /// Route one record. Returns the address it was queued for.
    pub fn dispatch(&self, record: RoutableRecord) -> Result<NodeAddress, RoutingError> {
        let snapshot = self.pool.snapshot();

        match self.selector.select(&snapshot, &record.key) {
            Ok(client) => {
                if client.push(record) {
                    tracing::trace!(peer = %client.address(), "forward queue full, oldest record dropped");
                }
                Ok(client.address().clone())
            }
            Err(e) => {
                tracing::error!("dropping record: {}", e);
                self.metrics.record_no_route();
                Err(e)
            }
        }
    }

    /// Route every record in `records`, one snapshot per record.
    pub fn dispatch_batch(&self, records: Vec<RoutableRecord>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for record in records {
            match self.dispatch(record) {
                Ok(_) => summary.routed += 1,
                Err(_) => summary.dropped += 1,
            }
        }
        tracing::debug!(routed = summary.routed, dropped = summary.dropped, "batch dispatched");
        summary
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapMetricsStore;
    use crate::config::QueueConfig;
    use crate::domain::entities::Record;
    use crate::domain::services::{DeterministicKeySelector, FixedPrimarySelector, SelectorKind};
    use crate::infrastructure::channel_manager::tests::MockTransport;
    use crate::infrastructure::client_pool::tests::MockConnector;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn setup(
        selector: Box<dyn NodeSelector<Arc<RemoteClient<Arc<MockTransport>>>>>,
    ) -> (
        RoutingDispatcher<Arc<MockTransport>>,
        Arc<ClientPool<Arc<MockTransport>>>,
        Arc<DashMapMetricsStore>,
    ) {
        let metrics = Arc::new(DashMapMetricsStore::new());
        let pool = Arc::new(
            ClientPool::new(
                Arc::new(MockConnector::new()),
                QueueConfig {
                    capacity: 100,
                    batch_size: 100,
                    // long enough that records stay queued for inspection
                    drain_interval: Duration::from_secs(60),
                },
                Duration::from_secs(60),
                metrics.clone(),
            )
            .unwrap(),
        );
        let dispatcher = RoutingDispatcher::new(pool.clone(), selector, metrics.clone());
        (dispatcher, pool, metrics)
    }

    fn record(key: &str) -> RoutableRecord {
        RoutableRecord::new(key, Record::new(b"m".to_vec()))
    }

    #[tokio::test]
    #[traced_test]
    async fn test_empty_pool_drops_with_one_no_route() {
        let (dispatcher, _pool, metrics) = setup(Box::new(DeterministicKeySelector));

        let result = dispatcher.dispatch(record("svc-42"));
        assert_eq!(result, Err(RoutingError::NoRoute("svc-42".into())));
        assert_eq!(metrics.no_route_count(), 1);
        assert!(logs_contain("no route for key svc-42"));
    }

    #[tokio::test]
    async fn test_fixed_primary_routes_to_first() {
        let (dispatcher, pool, _) = setup(Box::new(FixedPrimarySelector));
        pool.update(vec!["a:1".into(), "b:1".into()]).await.unwrap();

        for key in ["x", "y", "z"] {
            assert_eq!(dispatcher.dispatch(record(key)), Ok(NodeAddress::from("a:1")));
        }
        assert_eq!(pool.snapshot()[0].pending(), 3);
        assert_eq!(pool.snapshot()[1].pending(), 0);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_deterministic_key_routing_is_stable() {
        let (dispatcher, pool, _) = setup(SelectorKind::DeterministicKey.build());
        pool.update(vec!["a:1".into(), "b:1".into(), "c:1".into()])
            .await
            .unwrap();

        let first = dispatcher.dispatch(record("svc-42")).unwrap();
        for _ in 0..20 {
            assert_eq!(dispatcher.dispatch(record("svc-42")).unwrap(), first);
        }

        let target = pool
            .snapshot()
            .iter()
            .find(|c| c.address() == &first)
            .cloned()
            .unwrap();
        assert_eq!(target.pending(), 21);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_dispatch_batch_summary() {
        let (dispatcher, pool, metrics) = setup(Box::new(FixedPrimarySelector));

        let summary = dispatcher.dispatch_batch(vec![record("a"), record("b")]);
        assert_eq!(summary, DispatchSummary { routed: 0, dropped: 2 });
        assert_eq!(metrics.no_route_count(), 2);

        pool.update(vec!["a:1".into()]).await.unwrap();
        let summary = dispatcher.dispatch_batch(vec![record("a"), record("b"), record("c")]);
        assert_eq!(summary, DispatchSummary { routed: 3, dropped: 0 });
        pool.close().await;
    }

    #[tokio::test]
    async fn test_selector_name_exposed() {
        let (dispatcher, _, _) = setup(SelectorKind::FixedPrimary.build());
        assert_eq!(dispatcher.selector_name(), "fixed-primary");
    }
}
