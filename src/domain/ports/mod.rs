mod aggregation_sink;
mod channel_listener;
mod membership_provider;
mod metrics_store;
mod outbound_call;
mod transport;

pub use aggregation_sink::AggregationSink;
pub use channel_listener::ChannelListener;
pub use membership_provider::MembershipProvider;
pub use metrics_store::{ChannelCounters, MetricsStore};
pub use outbound_call::{CallFactory, ErrorReporter, OutboundCall, SendError};
pub use transport::{PeerConnector, Transport, TransportError};
