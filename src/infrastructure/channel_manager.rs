//! Channel Manager
//!
//! Reconnect policy for one logical channel. A periodic check keeps the
//! channel's `ConnectionHealthTracker` in line with reality:
//!
//! - reconnect pending: pick a server (random when there are several),
//!   connect, and report CONNECTED on success or DISCONNECTED on failure
//! - no reconnect pending but the channel is dead: report DISCONNECTED and
//!   schedule a reconnect for the next check
//!
//! Senders feed call failures back through `ErrorReporter`; network-class
//! failures schedule a reconnect right away.

use crate::application::lifecycle::Lifecycle;
use crate::config::ConfigError;
use crate::domain::ports::{ErrorReporter, SendError, Transport};
use crate::domain::value_objects::{ChannelStatus, NodeAddress};
use crate::infrastructure::health_tracker::ConnectionHealthTracker;
use crate::infrastructure::shutdown::ShutdownController;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct ManagerState<C> {
    name: String,
    servers: Vec<NodeAddress>,
    tracker: Arc<ConnectionHealthTracker<C>>,
    reconnect: AtomicBool,
    selected: Mutex<Option<usize>>,
    checking: tokio::sync::Mutex<()>,
}

impl<C: Transport> ManagerState<C> {
    async fn check(&self) -> ChannelStatus {
        // one check at a time; a second connect would replace the connection
        // the first one announced
        let _checking = self.checking.lock().await;

        if !self.reconnect.load(Ordering::SeqCst) {
            if self.tracker.channel().is_alive() {
                self.tracker.set_status(ChannelStatus::Connected);
                return ChannelStatus::Connected;
            }
            tracing::info!(channel = %self.name, "channel lost, scheduling reconnect");
            self.reconnect.store(true, Ordering::SeqCst);
            self.tracker.set_status(ChannelStatus::Disconnected);
        }

        let index = self.pick_server();
        let server = &self.servers[index];

        match self.tracker.channel().connect(server).await {
            Ok(()) => {
                *self.selected.lock() = Some(index);
                self.reconnect.store(false, Ordering::SeqCst);
                tracing::info!(channel = %self.name, server = %server, "channel connected");
                self.tracker.set_status(ChannelStatus::Connected);
                ChannelStatus::Connected
            }
            Err(e) => {
                tracing::warn!(channel = %self.name, server = %server, "connect failed: {}", e);
                self.tracker.set_status(ChannelStatus::Disconnected);
                ChannelStatus::Disconnected
            }
        }
    }

    fn pick_server(&self) -> usize {
        if self.servers.len() == 1 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.servers.len())
        }
    }
}

impl<C: Send + Sync> ErrorReporter for ManagerState<C> {
    fn report_error(&self, error: &SendError) {
        if error.is_network() {
            tracing::debug!(channel = %self.name, "network failure reported: {}", error);
            self.reconnect.store(true, Ordering::SeqCst);
            self.tracker.set_status(ChannelStatus::Disconnected);
        }
    }
}

/// Owner of a channel's connection lifecycle.
pub struct ChannelManager<C> {
    state: Arc<ManagerState<C>>,
    check_interval: Duration,
    shutdown: ShutdownController,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C> ChannelManager<C>
where
    C: Transport + 'static,
{
    /// Create a manager for `tracker`'s channel.
    ///
    /// Rejects an empty server list and a zero check interval.
    pub fn new(
        name: impl Into<String>,
        servers: Vec<NodeAddress>,
        tracker: Arc<ConnectionHealthTracker<C>>,
        check_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if servers.is_empty() {
            return Err(ConfigError::MissingServers);
        }
        if check_interval.is_zero() {
            return Err(ConfigError::NonPositive("reconnect interval"));
        }

        Ok(Self {
            state: Arc::new(ManagerState {
                name: name.into(),
                servers,
                tracker,
                reconnect: AtomicBool::new(true),
                selected: Mutex::new(None),
                checking: tokio::sync::Mutex::new(()),
            }),
            check_interval,
            shutdown: ShutdownController::new(),
            task: Mutex::new(None),
        })
    }

    /// Run one check immediately.
    pub async fn check(&self) -> ChannelStatus {
        self.state.check().await
    }

    pub fn tracker(&self) -> &Arc<ConnectionHealthTracker<C>> {
        &self.state.tracker
    }

    /// Reporter to hand to the senders using this channel.
    pub fn error_reporter(&self) -> Arc<dyn ErrorReporter> {
        self.state.clone()
    }

    /// Server the channel is connected to, if any.
    pub fn selected_server(&self) -> Option<NodeAddress> {
        self.state
            .selected
            .lock()
            .map(|i| self.state.servers[i].clone())
    }

    pub fn reconnect_pending(&self) -> bool {
        self.state.reconnect.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C> Lifecycle for ChannelManager<C>
where
    C: Transport + 'static,
{
    fn name(&self) -> &str {
        &self.state.name
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start(&self) -> anyhow::Result<()> {
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        let period = self.check_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {}
                }
                state.check().await;
            }
        });

        *self.task.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.shutdown.shutdown();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let _checking = self.state.checking.lock().await;
        self.state.tracker.channel().close();
        self.state.tracker.set_status(ChannelStatus::Disconnected);
        tracing::info!(channel = %self.state.name, "channel manager stopped");
    }
}
