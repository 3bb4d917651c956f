//! Client Pool
//!
//! Backend-side registry of peer nodes. Each peer is a `RemoteClient` owning
//! its own health tracker, reconnect policy, forward queue and sender.
//!
//! The pool publishes an immutable ordered snapshot through `ArcSwap`:
//! readers never lock and always see either the whole old list or the whole
//! new one. Updates are serialized and build the next list off to the side
//! before a single atomic store.

use crate::application::lifecycle::Lifecycle;
use crate::config::{ConfigError, QueueConfig};
use crate::domain::entities::RoutableRecord;
use crate::domain::ports::{MetricsStore, PeerConnector, Transport};
use crate::domain::value_objects::{ChannelStatus, NodeAddress};
use crate::infrastructure::backpressure_queue::BackpressureQueue;
use crate::infrastructure::channel_manager::ChannelManager;
use crate::infrastructure::health_tracker::ConnectionHealthTracker;
use crate::infrastructure::streaming_sender::StreamingSender;
use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One addressable peer node.
pub struct RemoteClient<C> {
    address: NodeAddress,
    manager: ChannelManager<C>,
    sender: StreamingSender<C, RoutableRecord>,
}

impl<C> RemoteClient<C>
where
    C: Transport + 'static,
{
    /// Wire a client for `address`. Performs no network I/O.
    pub fn new(
        address: NodeAddress,
        connector: &dyn PeerConnector<C>,
        queue: &QueueConfig,
        reconnect_interval: Duration,
        metrics: Arc<dyn MetricsStore>,
    ) -> Result<Self, ConfigError> {
        let name = address.to_string();
        let tracker = Arc::new(ConnectionHealthTracker::new(connector.channel(&address)));
        let manager = ChannelManager::new(
            name.clone(),
            vec![address.clone()],
            tracker.clone(),
            reconnect_interval,
        )?;
        let forward_queue = Arc::new(BackpressureQueue::new(queue.capacity)?);
        let sender = StreamingSender::new(
            name,
            forward_queue,
            tracker,
            connector.call_factory(),
            metrics,
            queue,
        )?
        .with_error_reporter(manager.error_reporter());

        Ok(Self {
            address,
            manager,
            sender,
        })
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn tracker(&self) -> &Arc<ConnectionHealthTracker<C>> {
        self.manager.tracker()
    }

    pub fn status(&self) -> ChannelStatus {
        self.tracker().status()
    }

    /// Queue a record for forwarding. Never blocks.
    ///
    /// Returns true if an older record was evicted to make room.
    pub fn push(&self, record: RoutableRecord) -> bool {
        self.sender.queue().offer(record)
    }

    /// Records waiting to be forwarded.
    pub fn pending(&self) -> usize {
        self.sender.queue().len()
    }

    pub fn sender(&self) -> &StreamingSender<C, RoutableRecord> {
        &self.sender
    }

    pub fn manager(&self) -> &ChannelManager<C> {
        &self.manager
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        self.manager.prepare().await?;
        self.sender.prepare().await
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.manager.start().await?;
        self.sender.start().await
    }

    async fn stop(&self) {
        self.sender.stop().await;
        self.manager.stop().await;
    }
}

impl<C> std::fmt::Debug for RemoteClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("address", &self.address)
            .finish()
    }
}

/// What an update changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolChange {
    pub added: Vec<NodeAddress>,
    pub removed: Vec<NodeAddress>,
    pub retained: usize,
}

impl PoolChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub type PoolSnapshot<C> = Arc<Vec<Arc<RemoteClient<C>>>>;

pub struct ClientPool<C> {
    connector: Arc<dyn PeerConnector<C>>,
    clients: ArcSwap<Vec<Arc<RemoteClient<C>>>>,
    update_lock: tokio::sync::Mutex<()>,
    queue: QueueConfig,
    reconnect_interval: Duration,
    metrics: Arc<dyn MetricsStore>,
}

impl<C> ClientPool<C>
where
    C: Transport + 'static,
{
    /// Create an empty pool. Client settings are validated here so that
    /// later updates cannot fail on configuration.
    pub fn new(
        connector: Arc<dyn PeerConnector<C>>,
        queue: QueueConfig,
        reconnect_interval: Duration,
        metrics: Arc<dyn MetricsStore>,
    ) -> Result<Self, ConfigError> {
        queue.validate()?;
        if reconnect_interval.is_zero() {
            return Err(ConfigError::NonPositive("reconnect interval"));
        }

        Ok(Self {
            connector,
            clients: ArcSwap::from_pointee(Vec::new()),
            update_lock: tokio::sync::Mutex::new(()),
            queue,
            reconnect_interval,
            metrics,
        })
    }

    /// Current immutable ordered view of the pool.
    pub fn snapshot(&self) -> PoolSnapshot<C> {
        self.clients.load_full()
    }

    pub fn addresses(&self) -> Vec<NodeAddress> {
        self.clients
            .load()
            .iter()
            .map(|c| c.address().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.load().is_empty()
    }

    /// Replace the membership with `addresses`.
    ///
    /// Order follows `addresses` (duplicates ignored). Clients for unchanged
    /// addresses are kept as they are; new ones are created and started
    /// before the swap; removed ones are stopped after it.
    pub async fn update(&self, addresses: Vec<NodeAddress>) -> anyhow::Result<PoolChange> {
        let _guard = self.update_lock.lock().await;
        let current = self.clients.load_full();

        let mut seen = HashSet::with_capacity(addresses.len());
        let mut next = Vec::with_capacity(addresses.len());
        let mut started: Vec<Arc<RemoteClient<C>>> = Vec::new();

        for address in addresses {
            if !seen.insert(address.clone()) {
                continue;
            }
            if let Some(existing) = current.iter().find(|c| c.address() == &address) {
                next.push(existing.clone());
                continue;
            }
            match self.spawn_client(address.clone()).await {
                Ok(client) => {
                    started.push(client.clone());
                    next.push(client);
                }
                Err(e) => {
                    for client in &started {
                        client.stop().await;
                    }
                    return Err(e.context(format!("failed to add peer {}", address)));
                }
            }
        }

        let removed: Vec<Arc<RemoteClient<C>>> = current
            .iter()
            .filter(|c| !seen.contains(c.address()))
            .cloned()
            .collect();

        let change = PoolChange {
            added: started.iter().map(|c| c.address().clone()).collect(),
            removed: removed.iter().map(|c| c.address().clone()).collect(),
            retained: next.len() - started.len(),
        };

        self.clients.store(Arc::new(next));

        for client in &removed {
            client.stop().await;
        }

        if !change.is_empty() {
            tracing::info!(
                added = change.added.len(),
                removed = change.removed.len(),
                retained = change.retained,
                "client pool updated"
            );
        }
        Ok(change)
    }

    /// Stop every client and publish an empty pool.
    pub async fn close(&self) {
        let _guard = self.update_lock.lock().await;
        let old = self.clients.swap(Arc::new(Vec::new()));
        for client in old.iter() {
            client.stop().await;
        }
        tracing::info!(clients = old.len(), "client pool closed");
    }

    async fn spawn_client(&self, address: NodeAddress) -> anyhow::Result<Arc<RemoteClient<C>>> {
        let client = Arc::new(RemoteClient::new(
            address,
            self.connector.as_ref(),
            &self.queue,
            self.reconnect_interval,
            self.metrics.clone(),
        )?);
        client.prepare().await?;
        client.start().await?;
        tracing::debug!(peer = %client.address(), "remote client started");
        Ok(client)
    }
}
