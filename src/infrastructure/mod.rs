//! Infrastructure Layer
//!
//! Queues, channel state, send loops and the peer pool.

pub mod backpressure_queue;
pub mod channel_manager;
pub mod client_pool;
pub mod health_tracker;
pub mod shutdown;
pub mod streaming_sender;

pub use backpressure_queue::BackpressureQueue;
pub use channel_manager::ChannelManager;
pub use client_pool::{ClientPool, PoolChange, PoolSnapshot, RemoteClient};
pub use health_tracker::ConnectionHealthTracker;
pub use shutdown::{shutdown_signal, InFlightGuard, ShutdownController};
pub use streaming_sender::{CycleOutcome, StreamingSender};
