mod dashmap_metrics_store;
mod logging_sink;
mod quic_transport;
mod static_membership;

pub use dashmap_metrics_store::{ChannelMetrics, DashMapMetricsStore};
pub use logging_sink::LoggingSink;
pub use quic_transport::{
    client_endpoint, install_crypto_provider, read_message, server_endpoint, QuicBatchCall,
    QuicCallFactory, QuicChannel, QuicPeerConnector,
};
pub use static_membership::StaticMembership;
