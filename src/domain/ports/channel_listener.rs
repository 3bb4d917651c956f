//! Channel Listener Port
//!
//! Subscribers of a `ConnectionHealthTracker`.

/// Observer of channel status edges.
///
/// Callbacks run inside the tracker's transition, so a listener must not call
/// back into the tracker's `set_status` or `subscribe`.
pub trait ChannelListener<C>: Send + Sync {
    /// The channel went from DISCONNECTED to CONNECTED.
    fn on_reconnect(&self, channel: &C);

    /// The channel went from CONNECTED to DISCONNECTED.
    fn on_disconnect(&self) {}
}
