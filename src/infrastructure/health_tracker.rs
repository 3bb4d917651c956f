//! Connection Health Tracker
//!
//! Owns the status of one logical channel and tells subscribers about edges.
//!
//! Transition rules:
//! - same status: no-op
//! - DISCONNECTED -> CONNECTED: every listener gets `on_reconnect` once, then
//!   the status is published
//! - CONNECTED -> DISCONNECTED: the status is published, then listeners get
//!   `on_disconnect`
//!
//! Transitions are serialized by the listener lock, so at most one reconnect
//! event fires per edge even when the transport reports CONNECTED repeatedly
//! from several threads.

use crate::domain::ports::ChannelListener;
use crate::domain::value_objects::ChannelStatus;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

pub struct ConnectionHealthTracker<C> {
    channel: C,
    status: AtomicU8,
    listeners: Mutex<Vec<Arc<dyn ChannelListener<C>>>>,
}

impl<C> ConnectionHealthTracker<C> {
    /// Create a tracker for `channel`, initially DISCONNECTED.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            status: AtomicU8::new(ChannelStatus::Disconnected.as_u8()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Current status (latest write wins).
    pub fn status(&self) -> ChannelStatus {
        ChannelStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// The logical channel this tracker watches.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Register a listener. Listeners are notified in registration order.
    pub fn subscribe(&self, listener: Arc<dyn ChannelListener<C>>) {
        self.listeners.lock().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Apply a status reported by the transport.
    ///
    /// Returns true if this call fired a reconnect event.
    pub fn set_status(&self, new: ChannelStatus) -> bool {
        let listeners = self.listeners.lock();
        let old = self.status();

        match (old, new) {
            (ChannelStatus::Disconnected, ChannelStatus::Connected) => {
                for listener in listeners.iter() {
                    listener.on_reconnect(&self.channel);
                }
                self.status.store(new.as_u8(), Ordering::SeqCst);
                tracing::debug!(listeners = listeners.len(), "channel reconnected");
                true
            }
            (ChannelStatus::Connected, ChannelStatus::Disconnected) => {
                self.status.store(new.as_u8(), Ordering::SeqCst);
                for listener in listeners.iter() {
                    listener.on_disconnect();
                }
                tracing::debug!("channel disconnected");
                false
            }
            _ => false,
        }
    }
}

impl<C: Clone> ConnectionHealthTracker<C> {
    /// A handle to the live channel.
    pub fn current_channel(&self) -> C {
        self.channel.clone()
    }
}
