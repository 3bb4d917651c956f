//! Ingest Server Adapter
//!
//! Accepts QUIC connections from agents and peer nodes. Every
//! unidirectional stream carries one framed message:
//!
//! - `Report`: records from agents, routed through the dispatcher
//! - `Forward`: records routed here by a peer, handed to the aggregation sink

use crate::adapters::codec::Message;
use crate::adapters::outbound::{read_message, server_endpoint};
use crate::application::lifecycle::Lifecycle;
use crate::application::routing_dispatcher::{DispatchSummary, RoutingDispatcher};
use crate::domain::ports::{AggregationSink, Transport};
use crate::infrastructure::shutdown::ShutdownController;
use async_trait::async_trait;
use parking_lot::Mutex;
use quinn::{Endpoint, Incoming, VarInt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What a message turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Routed(DispatchSummary),
    Aggregated(usize),
}

/// Apply one inbound message.
pub async fn handle_message<C>(
    message: Message,
    dispatcher: &RoutingDispatcher<C>,
    sink: &dyn AggregationSink,
) -> Handled
where
    C: Transport + 'static,
{
    match message {
        Message::Report(records) => Handled::Routed(dispatcher.dispatch_batch(records)),
        Message::Forward(records) => {
            let count = records.len();
            sink.accept(records).await;
            Handled::Aggregated(count)
        }
    }
}

/// QUIC ingest server - inbound adapter feeding the routing dispatcher.
pub struct IngestServer<C> {
    listen_addr: SocketAddr,
    server_names: Vec<String>,
    dispatcher: Arc<RoutingDispatcher<C>>,
    sink: Arc<dyn AggregationSink>,
    endpoint: Mutex<Option<Endpoint>>,
    shutdown: ShutdownController,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C> IngestServer<C>
where
    C: Transport + 'static,
{
    pub fn new(
        listen_addr: SocketAddr,
        server_names: Vec<String>,
        dispatcher: Arc<RoutingDispatcher<C>>,
        sink: Arc<dyn AggregationSink>,
    ) -> Self {
        Self {
            listen_addr,
            server_names,
            dispatcher,
            sink,
            endpoint: Mutex::new(None),
            shutdown: ShutdownController::new(),
            task: Mutex::new(None),
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint
            .lock()
            .as_ref()
            .and_then(|e| e.local_addr().ok())
    }

    /// Streams currently being read or applied.
    pub fn in_flight(&self) -> usize {
        self.shutdown.in_flight()
    }

    #[cfg_attr(coverage_nightly, coverage(off))]
    async fn accept_loop(
        endpoint: Endpoint,
        dispatcher: Arc<RoutingDispatcher<C>>,
        sink: Arc<dyn AggregationSink>,
        shutdown: ShutdownController,
    ) {
        loop {
            let incoming = tokio::select! {
                _ = shutdown.wait() => break,
                incoming = endpoint.accept() => incoming,
            };
            let Some(incoming) = incoming else {
                break;
            };

            let dispatcher = dispatcher.clone();
            let sink = sink.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(incoming, dispatcher, sink, shutdown).await {
                    tracing::debug!("connection ended: {:#}", e);
                }
            });
        }
        tracing::debug!("ingest accept loop exited");
    }

    #[cfg_attr(coverage_nightly, coverage(off))]
    async fn handle_connection(
        incoming: Incoming,
        dispatcher: Arc<RoutingDispatcher<C>>,
        sink: Arc<dyn AggregationSink>,
        shutdown: ShutdownController,
    ) -> anyhow::Result<()> {
        let connection = incoming.await?;
        let remote = connection.remote_address();
        tracing::debug!(%remote, "ingest connection accepted");

        loop {
            let mut recv = match connection.accept_uni().await {
                Ok(recv) => recv,
                Err(quinn::ConnectionError::ApplicationClosed(_))
                | Err(quinn::ConnectionError::LocallyClosed) => break,
                Err(e) => return Err(e.into()),
            };

            let guard = shutdown.in_flight_guard();
            let dispatcher = dispatcher.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                let _guard = guard;
                match read_message(&mut recv).await {
                    Ok(message) => {
                        let kind = message.kind();
                        let handled = handle_message(message, &dispatcher, sink.as_ref()).await;
                        tracing::trace!(%remote, kind = kind.as_str(), ?handled, "message applied");
                    }
                    Err(e) => {
                        tracing::warn!(%remote, "failed to read message: {:#}", e);
                    }
                }
            });
        }

        tracing::debug!(%remote, "ingest connection closed");
        Ok(())
    }
}

#[async_trait]
impl<C> Lifecycle for IngestServer<C>
where
    C: Transport + 'static,
{
    fn name(&self) -> &str {
        "ingest-server"
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start(&self) -> anyhow::Result<()> {
        let endpoint = server_endpoint(self.listen_addr, self.server_names.clone())?;
        tracing::info!("ingest server listening on {}", endpoint.local_addr()?);

        let handle = tokio::spawn(Self::accept_loop(
            endpoint.clone(),
            self.dispatcher.clone(),
            self.sink.clone(),
            self.shutdown.clone(),
        ));

        *self.endpoint.lock() = Some(endpoint);
        *self.task.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.shutdown.shutdown();
        self.shutdown.wait_for_drain(DRAIN_TIMEOUT).await;

        let endpoint = self.endpoint.lock().take();
        if let Some(endpoint) = endpoint {
            endpoint.close(VarInt::from_u32(0), b"shutdown");
        }
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
