//! Membership Sync - keeps the client pool in line with cluster membership
//!
//! Applies the provider's current member list on start, then every list the
//! provider publishes afterwards. Stopping the sync closes the pool.

use crate::application::lifecycle::Lifecycle;
use crate::domain::ports::{MembershipProvider, Transport};
use crate::infrastructure::client_pool::ClientPool;
use crate::infrastructure::shutdown::ShutdownController;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct MembershipSync<C> {
    provider: Arc<dyn MembershipProvider>,
    pool: Arc<ClientPool<C>>,
    shutdown: ShutdownController,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C> MembershipSync<C>
where
    C: Transport + 'static,
{
    pub fn new(provider: Arc<dyn MembershipProvider>, pool: Arc<ClientPool<C>>) -> Self {
        Self {
            provider,
            pool,
            shutdown: ShutdownController::new(),
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<C> Lifecycle for MembershipSync<C>
where
    C: Transport + 'static,
{
    fn name(&self) -> &str {
        "membership-sync"
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start(&self) -> anyhow::Result<()> {
        let mut members = self.provider.subscribe();
        let initial = members.borrow_and_update().clone();
        self.pool.update(initial).await?;

        let pool = self.pool.clone();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    changed = members.changed() => {
                        if changed.is_err() {
                            tracing::debug!("membership provider closed");
                            break;
                        }
                    }
                }
                let next = members.borrow_and_update().clone();
                if let Err(e) = pool.update(next).await {
                    tracing::error!("membership update failed: {:#}", e);
                }
            }
        });

        *self.task.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.shutdown.shutdown();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.pool.close().await;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::{DashMapMetricsStore, StaticMembership};
    use crate::config::QueueConfig;
    use crate::domain::value_objects::NodeAddress;
    use crate::infrastructure::channel_manager::tests::MockTransport;
    use crate::infrastructure::client_pool::tests::MockConnector;
    use std::time::Duration;

    fn pool() -> Arc<ClientPool<Arc<MockTransport>>> {
        Arc::new(
            ClientPool::new(
                Arc::new(MockConnector::new()),
                QueueConfig::default(),
                Duration::from_secs(30),
                Arc::new(DashMapMetricsStore::new()),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_start_applies_current_members() {
        let membership = Arc::new(StaticMembership::new(vec!["a:1".into(), "b:1".into()]));
        let pool = pool();
        let sync = MembershipSync::new(membership, pool.clone());

        sync.prepare().await.unwrap();
        assert!(pool.is_empty());

        sync.start().await.unwrap();
        assert_eq!(pool.addresses(), vec![NodeAddress::from("a:1"), NodeAddress::from("b:1")]);
        sync.stop().await;
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_follows_membership_changes() {
        let membership = Arc::new(StaticMembership::new(vec!["a:1".into()]));
        let pool = pool();
        let sync = MembershipSync::new(membership.clone(), pool.clone());
        sync.start().await.unwrap();

        membership.set_members(vec!["a:1".into(), "c:1".into()]);
        for _ in 0..50 {
            if pool.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(pool.addresses(), vec![NodeAddress::from("a:1"), NodeAddress::from("c:1")]);
        sync.stop().await;
    }
}
