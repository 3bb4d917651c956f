//! Streaming Sender
//!
//! Periodic drain-and-send loop for one channel. Each cycle:
//!
//! 1. skip unless the tracker reports CONNECTED and a call handle is held
//! 2. drain up to `batch_size` records from the queue
//! 3. push them through one outbound call
//!
//! A failed batch is logged, counted and discarded; it is never re-queued.
//! The call handle is rebuilt from the tracker's channel on every
//! DISCONNECTED -> CONNECTED edge.

use crate::application::lifecycle::Lifecycle;
use crate::config::{ConfigError, QueueConfig};
use crate::domain::ports::{CallFactory, ChannelListener, ErrorReporter, MetricsStore, OutboundCall};
use crate::infrastructure::backpressure_queue::BackpressureQueue;
use crate::infrastructure::health_tracker::ConnectionHealthTracker;
use crate::infrastructure::shutdown::ShutdownController;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Result of a single send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Channel not connected or handle released; queue untouched.
    Skipped,
    /// Connected, but nothing was queued.
    Idle,
    /// Batch of this many records delivered.
    Sent(usize),
    /// Batch of this many records failed and was discarded.
    Failed(usize),
}

/// Holder of the current outbound call handle.
struct HandleSlot<C, R> {
    factory: Arc<dyn CallFactory<C, R>>,
    call: RwLock<Option<Arc<dyn OutboundCall<R>>>>,
    released: AtomicBool,
    rebuilds: AtomicU64,
}

impl<C, R> HandleSlot<C, R> {
    fn rebuild(&self, channel: &C) {
        // `released` is checked and the slot written under the same lock as `release`
        let mut slot = self.call.write();
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        *slot = Some(self.factory.build(channel));
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    fn current(&self) -> Option<Arc<dyn OutboundCall<R>>> {
        self.call.read().clone()
    }

    fn release(&self) {
        let mut slot = self.call.write();
        self.released.store(true, Ordering::SeqCst);
        slot.take();
    }
}

impl<C, R> ChannelListener<C> for HandleSlot<C, R>
where
    C: Send + Sync,
    R: Send,
{
    fn on_reconnect(&self, channel: &C) {
        self.rebuild(channel);
    }
}

struct SenderCore<C, R> {
    name: String,
    batch_size: usize,
    interval: Duration,
    queue: Arc<BackpressureQueue<R>>,
    tracker: Arc<ConnectionHealthTracker<C>>,
    handle: Arc<HandleSlot<C, R>>,
    metrics: Arc<dyn MetricsStore>,
    reporter: RwLock<Option<Arc<dyn ErrorReporter>>>,
}

impl<C, R> SenderCore<C, R>
where
    C: Send + Sync,
    R: Send,
{
    async fn run_cycle(&self) -> CycleOutcome {
        if !self.tracker.is_connected() {
            tracing::trace!(sender = %self.name, "channel not connected, skipping cycle");
            return CycleOutcome::Skipped;
        }
        let Some(call) = self.handle.current() else {
            tracing::trace!(sender = %self.name, "no call handle, skipping cycle");
            return CycleOutcome::Skipped;
        };

        let batch = self.queue.drain(self.batch_size);
        if batch.is_empty() {
            return CycleOutcome::Idle;
        }
        let count = batch.len();

        match call.send(batch).await {
            Ok(()) => {
                self.metrics.record_sent(&self.name, count);
                tracing::debug!(sender = %self.name, records = count, "batch sent");
                CycleOutcome::Sent(count)
            }
            Err(e) => {
                tracing::warn!(sender = %self.name, records = count, "send failed, batch dropped: {}", e);
                self.metrics.record_send_failure(&self.name, count);
                let reporter = self.reporter.read().clone();
                if let Some(reporter) = reporter {
                    reporter.report_error(&e);
                }
                CycleOutcome::Failed(count)
            }
        }
    }
}

pub struct StreamingSender<C, R> {
    core: Arc<SenderCore<C, R>>,
    subscribed: AtomicBool,
    shutdown: ShutdownController,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C, R> StreamingSender<C, R>
where
    C: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Build a sender draining `queue` over `tracker`'s channel.
    ///
    /// Fails if the batch size or drain interval in `config` is not positive.
    pub fn new(
        name: impl Into<String>,
        queue: Arc<BackpressureQueue<R>>,
        tracker: Arc<ConnectionHealthTracker<C>>,
        factory: Arc<dyn CallFactory<C, R>>,
        metrics: Arc<dyn MetricsStore>,
        config: &QueueConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            core: Arc::new(SenderCore {
                name: name.into(),
                batch_size: config.batch_size,
                interval: config.drain_interval,
                queue,
                tracker,
                handle: Arc::new(HandleSlot {
                    factory,
                    call: RwLock::new(None),
                    released: AtomicBool::new(false),
                    rebuilds: AtomicU64::new(0),
                }),
                metrics,
                reporter: RwLock::new(None),
            }),
            subscribed: AtomicBool::new(false),
            shutdown: ShutdownController::new(),
            task: Mutex::new(None),
        })
    }

    /// Report call failures to the channel owner.
    pub fn with_error_reporter(self, reporter: Arc<dyn ErrorReporter>) -> Self {
        *self.core.reporter.write() = Some(reporter);
        self
    }

    /// Run one drain/send cycle now.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.core.run_cycle().await
    }

    pub fn has_handle(&self) -> bool {
        self.core.handle.current().is_some()
    }

    /// Number of times the call handle has been (re)built.
    pub fn handle_builds(&self) -> u64 {
        self.core.handle.rebuilds.load(Ordering::Relaxed)
    }

    pub fn queue(&self) -> &Arc<BackpressureQueue<R>> {
        &self.core.queue
    }
}

#[async_trait]
impl<C, R> Lifecycle for StreamingSender<C, R>
where
    C: Send + Sync + 'static,
    R: Send + 'static,
{
    fn name(&self) -> &str {
        &self.core.name
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        if !self.subscribed.swap(true, Ordering::SeqCst) {
            self.core.tracker.subscribe(self.core.handle.clone());
            self.core.handle.rebuild(self.core.tracker.channel());
        }
        Ok(())
    }

    async fn start(&self) -> anyhow::Result<()> {
        let core = self.core.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(core.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {}
                }
                core.run_cycle().await;
            }
            tracing::debug!(sender = %core.name, "send loop exited");
        });

        *self.task.lock() = Some(handle);
        tracing::info!(
            sender = %self.core.name,
            interval_ms = self.core.interval.as_millis() as u64,
            batch_size = self.core.batch_size,
            "streaming sender started"
        );
        Ok(())
    }

    async fn stop(&self) {
        self.shutdown.shutdown();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.core.handle.release();
        tracing::info!(sender = %self.core.name, "streaming sender stopped");
    }
}
