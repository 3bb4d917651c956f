//! Outbound Call Port
//!
//! The opaque remote call a sender pushes batches through. Only the outcome
//! (success or a typed failure) is inspected, never the payload.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Failure of a single outbound call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SendError {
    #[error("channel not connected")]
    NotConnected,
    #[error("network error: {0}")]
    Network(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("rejected by peer: {0}")]
    Rejected(String),
}

impl SendError {
    /// Whether the failure says something about the channel itself.
    ///
    /// Network-class failures make the channel owner schedule a reconnect.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SendError::NotConnected | SendError::Network(_) | SendError::Timeout(_)
        )
    }
}

/// A call handle that carries one batch per invocation.
///
/// Implementations bound their own duration (timeout) so a send cycle cannot
/// block forever.
#[async_trait]
pub trait OutboundCall<R>: Send + Sync {
    async fn send(&self, batch: Vec<R>) -> Result<(), SendError>;
}

/// Builds call handles from a logical channel.
///
/// Called when a sender is prepared and again on every reconnect edge.
pub trait CallFactory<C, R>: Send + Sync {
    fn build(&self, channel: &C) -> Arc<dyn OutboundCall<R>>;
}

/// Receives call failures so the channel owner can react to them.
pub trait ErrorReporter: Send + Sync {
    fn report_error(&self, error: &SendError);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_is_network() {
        assert!(SendError::NotConnected.is_network());
        assert!(SendError::Network("reset".into()).is_network());
        assert!(SendError::Timeout(Duration::from_secs(30)).is_network());
        assert!(!SendError::Encode("bad".into()).is_network());
        assert!(!SendError::Rejected("full".into()).is_network());
    }

    #[test]
    fn test_send_error_display() {
        assert_eq!(SendError::NotConnected.to_string(), "channel not connected");
        assert_eq!(
            SendError::Network("connection lost".into()).to_string(),
            "network error: connection lost"
        );
    }
}
