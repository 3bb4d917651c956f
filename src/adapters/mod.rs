//! Adapters
//!
//! Inbound: the QUIC ingest server. Outbound: QUIC channels and calls,
//! membership, metrics and the aggregation sink. `codec` is the shared
//! wire framing.

pub mod codec;
pub mod inbound;
pub mod outbound;
