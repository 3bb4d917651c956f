//! Backpressure Queue
//!
//! Fixed-capacity buffer between producers and a single draining sender.
//! When full, the oldest record is evicted so the newest `capacity` records
//! are the ones kept. Producers never block and never see an error.

use crate::config::ConfigError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bound on slots reserved up front; the buffer grows past it on demand.
const PREALLOCATE_LIMIT: usize = 1024;

/// Bounded drop-oldest queue.
///
/// Any thread may `offer`; exactly one consumer is expected to `drain`.
pub struct BackpressureQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    evicted: AtomicU64,
}

impl<T> BackpressureQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::NonPositive("queue capacity"));
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(PREALLOCATE_LIMIT))),
            capacity,
            evicted: AtomicU64::new(0),
        })
    }

    /// Admit an item, evicting the oldest one if the queue is full.
    ///
    /// Returns true if an item was evicted to make room.
    pub fn offer(&self, item: T) -> bool {
        let mut items = self.items.lock();
        let evicted = if items.len() >= self.capacity {
            items.pop_front();
            true
        } else {
            false
        };
        items.push_back(item);
        drop(items);

        if evicted {
            let total = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!(capacity = self.capacity, evicted = total, "queue full, dropped oldest record");
        }
        evicted
    }

    /// Remove and return up to `max_batch` items in FIFO order.
    ///
    /// An empty queue yields an empty vector.
    pub fn drain(&self, max_batch: usize) -> Vec<T> {
        let mut items = self.items.lock();
        let n = max_batch.min(items.len());
        items.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of items evicted on overflow since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
