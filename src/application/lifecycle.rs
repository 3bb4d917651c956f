//! Lifecycle - Component boot and shutdown ordering
//!
//! Every long-lived component goes through `prepare` (allocate, register
//! listeners, no network I/O), `start` (begin background work) and `stop`.
//! `BootSequence` runs them in registration order and stops them in reverse.

use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn prepare(&self) -> anyhow::Result<()>;

    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self);
}

/// Ordered set of components booted together.
#[derive(Default)]
pub struct BootSequence {
    components: Vec<Arc<dyn Lifecycle>>,
    started: usize,
}

impl BootSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, component: Arc<dyn Lifecycle>) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Prepare every component, then start every component.
    ///
    /// The first failure aborts the boot; components already started are
    /// stopped before the error is returned.
    pub async fn boot(&mut self) -> anyhow::Result<()> {
        for component in &self.components {
            tracing::debug!(component = component.name(), "preparing");
            if let Err(e) = component.prepare().await {
                return Err(e.context(format!("prepare failed for {}", component.name())));
            }
        }

        let components = self.components.clone();
        for (i, component) in components.iter().enumerate() {
            if let Err(e) = component.start().await {
                self.started = i;
                let name = component.name().to_string();
                self.shutdown().await;
                return Err(e.context(format!("start failed for {}", name)));
            }
            tracing::info!(component = component.name(), "started");
        }
        self.started = self.components.len();
        Ok(())
    }

    /// Stop started components in reverse registration order.
    pub async fn shutdown(&mut self) {
        for component in self.components[..self.started].iter().rev() {
            component.stop().await;
            tracing::info!(component = component.name(), "stopped");
        }
        self.started = 0;
    }
}
