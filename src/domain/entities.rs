//! Domain Entities - Core telemetry objects
//!
//! These entities are what travels through the relay. The core never looks
//! inside a payload; it only queues, batches and routes records.

use crate::domain::value_objects::RoutingKey;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque telemetry unit (e.g. a metric snapshot).
///
/// Immutable once created: producers build it, the sender ships it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Creation time in milliseconds since UNIX epoch
    pub created_at_ms: u64,
    /// Encoded payload fields
    pub payload: Vec<u8>,
}

impl Record {
    /// Create a record stamped with the current wall-clock time.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            created_at_ms: now_ms(),
            payload: payload.into(),
        }
    }

    /// Create a record with an explicit creation time.
    pub fn with_timestamp(created_at_ms: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            created_at_ms,
            payload: payload.into(),
        }
    }
}

/// A record tagged with the key used to pick its aggregation node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutableRecord {
    pub key: RoutingKey,
    pub record: Record,
}

impl RoutableRecord {
    pub fn new(key: impl Into<RoutingKey>, record: Record) -> Self {
        Self {
            key: key.into(),
            record,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
