//! telemetry-relay - relay node
//!
//! This is the composition root that wires together all the components.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use telemetry_relay::adapters::inbound::IngestServer;
use telemetry_relay::adapters::outbound::{
    client_endpoint, install_crypto_provider, DashMapMetricsStore, LoggingSink, QuicChannel,
    QuicPeerConnector, StaticMembership,
};
use telemetry_relay::infrastructure::shutdown_signal;
use telemetry_relay::{
    load_config, BootSequence, ClientPool, MembershipSync, NodeAddress, RoutingDispatcher,
};

/// Address peers (and this node itself) use to reach `listen`.
fn advertised_addr(listen: SocketAddr) -> SocketAddr {
    match listen.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), listen.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), listen.port())
        }
        _ => listen,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    tracing::info!(
        "starting telemetry-relay node={} listen={} selector={}",
        cfg.node_id,
        cfg.listen_addr,
        cfg.selector
    );

    let listen_addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid RELAY_LISTEN_ADDR {:?}: {}", cfg.listen_addr, e))?;

    install_crypto_provider();

    // ===== COMPOSITION ROOT =====

    // 1. Outbound adapters
    let metrics = Arc::new(DashMapMetricsStore::new());

    let client_bind: SocketAddr = if listen_addr.is_ipv6() {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    };
    let endpoint = client_endpoint(client_bind)?;
    let connector = Arc::new(QuicPeerConnector::new(endpoint.clone(), cfg.upstream_timeout));

    // Without configured peers this node routes everything to itself
    let peers = if cfg.peers.is_empty() {
        vec![NodeAddress::from(advertised_addr(listen_addr))]
    } else {
        cfg.peers.clone()
    };
    let membership = Arc::new(StaticMembership::new(peers));

    // 2. Pool and routing
    let pool: Arc<ClientPool<Arc<QuicChannel>>> = Arc::new(ClientPool::new(
        connector,
        cfg.queue.clone(),
        cfg.reconnect_interval,
        metrics.clone(),
    )?);
    let dispatcher = Arc::new(RoutingDispatcher::new(
        pool.clone(),
        cfg.selector.build(),
        metrics.clone(),
    ));

    // 3. Inbound adapter
    let ingest = Arc::new(IngestServer::new(
        listen_addr,
        vec![cfg.node_id.clone(), "localhost".to_string()],
        dispatcher,
        Arc::new(LoggingSink::new()),
    ));

    // 4. Boot: pool first so the server never routes into an empty pool
    let mut boot = BootSequence::new();
    boot.register(Arc::new(MembershipSync::new(membership, pool)))
        .register(ingest);
    boot.boot().await?;

    tracing::info!("telemetry-relay ready");
    shutdown_signal().await;

    boot.shutdown().await;
    endpoint.close(0u32.into(), b"shutdown");
    tracing::info!("telemetry-relay stopped");
    Ok(())
}
