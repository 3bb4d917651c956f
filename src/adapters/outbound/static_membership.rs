//! Static Membership
//!
//! MembershipProvider backed by a fixed peer list (from configuration) that
//! can be replaced at runtime.

use crate::domain::ports::MembershipProvider;
use crate::domain::value_objects::NodeAddress;
use tokio::sync::watch;

pub struct StaticMembership {
    members: watch::Sender<Vec<NodeAddress>>,
}

impl StaticMembership {
    pub fn new(members: Vec<NodeAddress>) -> Self {
        let (members, _) = watch::channel(members);
        Self { members }
    }

    /// Publish a new member list to every subscriber.
    pub fn set_members(&self, members: Vec<NodeAddress>) {
        self.members.send_replace(members);
    }
}

impl MembershipProvider for StaticMembership {
    fn current(&self) -> Vec<NodeAddress> {
        self.members.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Vec<NodeAddress>> {
        self.members.subscribe()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_current_returns_initial_members() {
        let membership = StaticMembership::new(vec!["a:1".into(), "b:1".into()]);
        assert_eq!(membership.current().len(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let membership = StaticMembership::new(vec!["a:1".into()]);
        let mut rx = membership.subscribe();

        membership.set_members(vec!["b:1".into()]);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), vec![NodeAddress::from("b:1")]);
        assert_eq!(membership.current(), vec![NodeAddress::from("b:1")]);
    }

    #[test]
    fn test_set_members_without_subscribers() {
        let membership = StaticMembership::new(Vec::new());
        membership.set_members(vec!["c:1".into()]);
        assert_eq!(membership.current(), vec![NodeAddress::from("c:1")]);
    }
}
