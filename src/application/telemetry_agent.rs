//! Telemetry Agent - producer side of the relay
//!
//! Bundles what an instrumented process needs to ship records: a bounded
//! queue its call sites offer into, a reconnecting channel to the collector
//! servers, and the periodic sender between them.

use crate::application::lifecycle::Lifecycle;
use crate::config::{ConfigError, QueueConfig};
use crate::domain::entities::RoutableRecord;
use crate::domain::ports::{CallFactory, MetricsStore, Transport};
use crate::domain::value_objects::{ChannelStatus, NodeAddress};
use crate::infrastructure::backpressure_queue::BackpressureQueue;
use crate::infrastructure::channel_manager::ChannelManager;
use crate::infrastructure::health_tracker::ConnectionHealthTracker;
use crate::infrastructure::streaming_sender::{CycleOutcome, StreamingSender};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub struct TelemetryAgent<C> {
    name: String,
    queue: Arc<BackpressureQueue<RoutableRecord>>,
    manager: ChannelManager<C>,
    sender: StreamingSender<C, RoutableRecord>,
}

impl<C> TelemetryAgent<C>
where
    C: Transport + 'static,
{
    pub fn new(
        name: impl Into<String>,
        servers: Vec<NodeAddress>,
        channel: C,
        factory: Arc<dyn CallFactory<C, RoutableRecord>>,
        metrics: Arc<dyn MetricsStore>,
        queue: &QueueConfig,
        reconnect_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let tracker = Arc::new(ConnectionHealthTracker::new(channel));
        let manager = ChannelManager::new(name.clone(), servers, tracker.clone(), reconnect_interval)?;
        let buffer = Arc::new(BackpressureQueue::new(queue.capacity)?);
        let sender = StreamingSender::new(
            name.clone(),
            buffer.clone(),
            tracker,
            factory,
            metrics,
            queue,
        )?
        .with_error_reporter(manager.error_reporter());

        Ok(Self {
            name,
            queue: buffer,
            manager,
            sender,
        })
    }

    /// Hand a record to the agent. Never blocks; may evict the oldest record.
    pub fn offer(&self, record: RoutableRecord) -> bool {
        self.queue.offer(record)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn status(&self) -> ChannelStatus {
        self.manager.tracker().status()
    }

    /// Run one reconnect check followed by one send cycle.
    pub async fn flush(&self) -> CycleOutcome {
        self.manager.check().await;
        self.sender.run_cycle().await
    }

    pub fn manager(&self) -> &ChannelManager<C> {
        &self.manager
    }
}

#[async_trait]
impl<C> Lifecycle for TelemetryAgent<C>
where
    C: Transport + 'static,
{
    fn name(&self) -> &str {
        &self.name
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
