//! Application Layer
//!
//! Use cases wiring the domain to the infrastructure: routing inbound
//! records, following cluster membership, shipping records from a producer,
//! and ordered component lifecycle.

pub mod lifecycle;
pub mod membership_sync;
pub mod routing_dispatcher;
pub mod telemetry_agent;

pub use lifecycle::{BootSequence, Lifecycle};
pub use membership_sync::MembershipSync;
pub use routing_dispatcher::{DispatchSummary, RoutingDispatcher};
pub use telemetry_agent::TelemetryAgent;
