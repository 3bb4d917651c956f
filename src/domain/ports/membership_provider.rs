//! Membership Provider Port
//!
//! Supplies the current list of node addresses in the cluster.

use crate::domain::value_objects::NodeAddress;
use tokio::sync::watch;

/// Source of cluster membership.
///
/// `subscribe` yields a receiver that observes every published member list.
pub trait MembershipProvider: Send + Sync {
    /// Current member addresses, in the order they should be used for selection.
    fn current(&self) -> Vec<NodeAddress>;

    /// Subscribe to membership changes.
    fn subscribe(&self) -> watch::Receiver<Vec<NodeAddress>>;
}
