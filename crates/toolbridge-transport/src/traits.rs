//! Core transport trait.

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::message::TransportMessage;
use crate::metrics::TransportMetrics;
use crate::types::{TransportState, TransportType};

/// An ordered, bidirectional frame channel to a tool server.
///
/// Implementations must allow one task to sit in [`receive`](Self::receive)
/// while other tasks call [`send`](Self::send).
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Returns the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Returns the current state of the transport.
    async fn state(&self) -> TransportState;

    /// Establishes the connection. Calling it on a connected transport is a
    /// no-op.
    async fn connect(&self) -> TransportResult<()>;

    /// Closes the connection and releases the underlying stream.
    async fn disconnect(&self) -> TransportResult<()>;

    /// Sends a single frame.
    async fn send(&self, message: TransportMessage) -> TransportResult<()>;

    /// Waits for the next frame.
    ///
    /// `Ok(None)` means the peer closed the stream; no further frames will
    /// arrive.
    async fn receive(&self) -> TransportResult<Option<TransportMessage>>;

    /// Returns a snapshot of the transport's counters.
    async fn metrics(&self) -> TransportMetrics;

    /// Returns `true` if the transport is currently in the `Connected` state.
    async fn is_connected(&self) -> bool {
        matches!(self.state().await, TransportState::Connected)
    }

    /// Returns the endpoint address or identifier for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // object safety
    fn _test_transport_object(_t: &dyn Transport) {}
}
