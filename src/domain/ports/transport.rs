//! Transport Port
//!
//! Capabilities of a logical, possibly-reconnecting channel, and the factory
//! the client pool uses to build one per peer.

use crate::domain::entities::RoutableRecord;
use crate::domain::ports::outbound_call::CallFactory;
use crate::domain::value_objects::NodeAddress;
use async_trait::async_trait;
use std::sync::Arc;

/// Connection establishment failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("failed to resolve {0}")]
    Resolve(String),
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },
    #[error("transport closed")]
    Closed,
}

/// A logical channel to a peer.
///
/// `connect` replaces the underlying connection; the logical channel itself
/// survives reconnects.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, addr: &NodeAddress) -> Result<(), TransportError>;

    fn is_alive(&self) -> bool;

    fn close(&self);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(&self, addr: &NodeAddress) -> Result<(), TransportError> {
        (**self).connect(addr).await
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }

    fn close(&self) {
        (**self).close()
    }
}

/// Builds channels to peer nodes for the client pool.
///
/// `channel` must not perform network I/O; connecting is the channel
/// manager's job.
pub trait PeerConnector<C>: Send + Sync {
    fn channel(&self, addr: &NodeAddress) -> C;

    fn call_factory(&self) -> Arc<dyn CallFactory<C, RoutableRecord>>;
}
