//! telemetry-relay Library
//!
//! Transport and routing core for telemetry: bounded drop-oldest buffering,
//! reconnect-aware streaming senders, and key-based routing of records to
//! the one backend node responsible for aggregating them.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{BootSequence, Lifecycle, MembershipSync, RoutingDispatcher, TelemetryAgent};
pub use config::{load_config, Config, ConfigError, QueueConfig};
pub use domain::entities::{Record, RoutableRecord};
pub use domain::ports::{AggregationSink, MembershipProvider, MetricsStore, OutboundCall};
pub use domain::services::{
    DeterministicKeySelector, FixedPrimarySelector, NodeSelector, RoutingError, SelectorKind,
};
pub use domain::value_objects::{ChannelStatus, NodeAddress, RoutingKey};
pub use infrastructure::{
    BackpressureQueue, ClientPool, ConnectionHealthTracker, RemoteClient, StreamingSender,
};
