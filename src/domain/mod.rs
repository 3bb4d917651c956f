//! Domain Layer
//!
//! Records, routing keys, channel status, the ports the core consumes, and the
//! pure node-selection strategies.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{Record, RoutableRecord};
pub use value_objects::{ChannelStatus, NodeAddress, RoutingKey};
