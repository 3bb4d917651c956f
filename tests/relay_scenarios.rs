//! End-to-end scenarios for the relay core
//!
//! Drives the public API with in-memory channels and calls: buffering under
//! overflow, sending only while connected, routing across membership changes,
//! and dropping records when there is nowhere to route them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry_relay::adapters::outbound::DashMapMetricsStore;
use telemetry_relay::domain::ports::{
    CallFactory, ChannelListener, OutboundCall, PeerConnector, SendError, Transport,
    TransportError,
};
use telemetry_relay::infrastructure::CycleOutcome;
use telemetry_relay::{
    BackpressureQueue, ChannelStatus, ClientPool, ConnectionHealthTracker,
    DeterministicKeySelector, FixedPrimarySelector, Lifecycle, MetricsStore, NodeAddress,
    NodeSelector, QueueConfig, Record, RoutableRecord, RoutingDispatcher, RoutingError,
    RoutingKey, StreamingSender,
};

// ===== In-memory collaborators =====

#[derive(Default)]
struct LoopbackChannel {
    alive: AtomicBool,
}

#[async_trait]
impl Transport for LoopbackChannel {
    async fn connect(&self, _addr: &NodeAddress) -> Result<(), TransportError> {
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct CollectingCall {
    batches: Mutex<Vec<Vec<RoutableRecord>>>,
}

#[async_trait]
impl OutboundCall<RoutableRecord> for CollectingCall {
    async fn send(&self, batch: Vec<RoutableRecord>) -> Result<(), SendError> {
        self.batches.lock().push(batch);
        Ok(())
    }
}

struct CollectingFactory(Arc<CollectingCall>);

impl<C> CallFactory<C, RoutableRecord> for CollectingFactory {
    fn build(&self, _channel: &C) -> Arc<dyn OutboundCall<RoutableRecord>> {
        self.0.clone()
    }
}

struct LoopbackConnector {
    call: Arc<CollectingCall>,
}

impl PeerConnector<Arc<LoopbackChannel>> for LoopbackConnector {
    fn channel(&self, _addr: &NodeAddress) -> Arc<LoopbackChannel> {
        Arc::new(LoopbackChannel::default())
    }

    fn call_factory(&self) -> Arc<dyn CallFactory<Arc<LoopbackChannel>, RoutableRecord>> {
        Arc::new(CollectingFactory(self.call.clone()))
    }
}

fn record(key: &str, n: u8) -> RoutableRecord {
    RoutableRecord::new(key, Record::with_timestamp(n as u64, vec![n]))
}

fn queue_config() -> QueueConfig {
    QueueConfig {
        capacity: 100,
        batch_size: 100,
        drain_interval: Duration::from_secs(60),
    }
}

fn pool(metrics: Arc<DashMapMetricsStore>) -> Arc<ClientPool<Arc<LoopbackChannel>>> {
    let connector = Arc::new(LoopbackConnector {
        call: Arc::new(CollectingCall::default()),
    });
    Arc::new(ClientPool::new(connector, queue_config(), Duration::from_secs(60), metrics).unwrap())
}

// ===== Scenario A: overflow keeps the newest records =====

#[test]
fn test_scenario_a_capacity_three_keeps_r3_to_r5() {
    let queue = BackpressureQueue::new(3).unwrap();
    for n in 1..=5 {
        queue.offer(record("svc", n));
    }

    let drained: Vec<u8> = queue
        .drain(10)
        .iter()
        .map(|r| r.record.payload[0])
        .collect();
    assert_eq!(drained, vec![3, 4, 5]);
    assert_eq!(queue.evicted(), 2);
}

// ===== Scenario B: sends only while connected =====

#[tokio::test]
async fn test_scenario_b_send_waits_for_connection() {
    let tracker = Arc::new(ConnectionHealthTracker::new(Arc::new(LoopbackChannel::default())));
    let queue = Arc::new(BackpressureQueue::new(10).unwrap());
    let call = Arc::new(CollectingCall::default());
    let sender = StreamingSender::new(
        "agent",
        queue.clone(),
        tracker.clone(),
        Arc::new(CollectingFactory(call.clone())),
        Arc::new(DashMapMetricsStore::new()),
        &queue_config(),
    )
    .unwrap();
    sender.prepare().await.unwrap();

    queue.offer(record("svc", 1));
    queue.offer(record("svc", 2));

    assert_eq!(tracker.status(), ChannelStatus::Disconnected);
    assert_eq!(sender.run_cycle().await, CycleOutcome::Skipped);
    assert_eq!(queue.len(), 2);
    assert!(call.batches.lock().is_empty());

    tracker.set_status(ChannelStatus::Connected);
    assert_eq!(sender.run_cycle().await, CycleOutcome::Sent(2));
    assert!(queue.is_empty());
    assert_eq!(call.batches.lock()[0].len(), 2);
}

// ===== Scenario C: routing across a membership change =====

#[tokio::test]
async fn test_scenario_c_membership_change_keeps_selection_pure() {
    let pool = pool(Arc::new(DashMapMetricsStore::new()));
    let selector = DeterministicKeySelector;
    let key = RoutingKey::from("svc-42");

    pool.update(vec!["a:1".into(), "b:1".into()]).await.unwrap();
    let before = pool.snapshot();
    let first = selector.select(before.as_slice(), &key).unwrap().address().clone();
    assert!(before.iter().any(|c| c.address() == &first));

    pool.update(vec!["a:1".into(), "b:1".into(), "c:1".into()])
        .await
        .unwrap();
    let after = pool.snapshot();
    assert_eq!(after.len(), 3);

    let p1 = selector.select(after.as_slice(), &key).unwrap();
    let p2 = selector.select(after.as_slice(), &key).unwrap();
    assert!(Arc::ptr_eq(p1, p2));
    assert!(after.iter().any(|c| Arc::ptr_eq(c, p1)));

    // B survived the update untouched
    let b_before = before.iter().find(|c| c.address().as_str() == "b:1").unwrap();
    let b_after = after.iter().find(|c| c.address().as_str() == "b:1").unwrap();
    assert!(Arc::ptr_eq(b_before, b_after));

    pool.close().await;
}

// ===== Scenario D: empty pool drops with one no-route =====

#[tokio::test]
async fn test_scenario_d_empty_pool_drops_record() {
    let metrics = Arc::new(DashMapMetricsStore::new());
    let pool = pool(metrics.clone());
    let dispatcher = RoutingDispatcher::new(pool, Box::new(FixedPrimarySelector), metrics.clone());

    let result = dispatcher.dispatch(record("svc-42", 1));
    assert_eq!(result, Err(RoutingError::NoRoute(RoutingKey::from("svc-42"))));
    assert_eq!(metrics.no_route_count(), 1);
}

// ===== Tracker event counting =====

#[derive(Default)]
struct EdgeCounter {
    reconnects: AtomicUsize,
}

impl ChannelListener<()> for EdgeCounter {
    fn on_reconnect(&self, _channel: &()) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_tracker_reconnect_event_counts() {
    let tracker = ConnectionHealthTracker::new(());
    let counter = Arc::new(EdgeCounter::default());
    tracker.subscribe(counter.clone());

    tracker.set_status(ChannelStatus::Disconnected);
    assert_eq!(counter.reconnects.load(Ordering::SeqCst), 0);
    tracker.set_status(ChannelStatus::Connected);
    assert_eq!(counter.reconnects.load(Ordering::SeqCst), 1);
    tracker.set_status(ChannelStatus::Connected);
    assert_eq!(counter.reconnects.load(Ordering::SeqCst), 1);
    tracker.set_status(ChannelStatus::Disconnected);
    tracker.set_status(ChannelStatus::Connected);
    assert_eq!(counter.reconnects.load(Ordering::SeqCst), 2);
}

// ===== Dispatcher to peer forwarding =====

#[tokio::test]
async fn test_dispatched_records_reach_peer_call() {
    let metrics = Arc::new(DashMapMetricsStore::new());
    let call = Arc::new(CollectingCall::default());
    let connector = Arc::new(LoopbackConnector { call: call.clone() });
    let pool: Arc<ClientPool<Arc<LoopbackChannel>>> = Arc::new(
        ClientPool::new(
            connector,
            QueueConfig {
                capacity: 100,
                batch_size: 100,
                drain_interval: Duration::from_millis(10),
            },
            Duration::from_millis(20),
            metrics.clone(),
        )
        .unwrap(),
    );
    pool.update(vec!["a:1".into(), "b:1".into()]).await.unwrap();
    let dispatcher = RoutingDispatcher::new(
        pool.clone(),
        Box::new(DeterministicKeySelector),
        metrics.clone(),
    );

    let summary = dispatcher.dispatch_batch((0..10).map(|n| record(&format!("svc-{}", n), n)).collect());
    assert_eq!(summary.routed, 10);

    for _ in 0..50 {
        let forwarded: usize = call.batches.lock().iter().map(|b| b.len()).sum();
        if forwarded == 10 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let forwarded: usize = call.batches.lock().iter().map(|b| b.len()).sum();
    assert_eq!(forwarded, 10);

    let sent: u64 = pool
        .addresses()
        .iter()
        .map(|a| metrics.channel_counters(a.as_str()).sent_records)
        .sum();
    assert_eq!(sent, 10);
    pool.close().await;
}
