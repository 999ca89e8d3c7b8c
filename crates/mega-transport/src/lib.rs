//! Transport abstraction layer for the mega broker protocol.
//!
//! Provides the [`Connection`] trait the protocol codec reads frames from,
//! and the [`Transport`] trait for the accepting side. Both are implemented
//! over tokio byte streams in [`StreamConnection`] and [`TcpTransport`].
//!
//! The protocol framing has no delimiters, only length fields, so the
//! central primitive is [`Connection::recv_exact`]: suspend until exactly
//! `n` bytes have arrived, however the network chose to split them.

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{StreamConnection, TcpConnection, TcpTransport};

use std::fmt;
use std::future::Future;

use bytes::Bytes;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single bidirectional byte stream.
///
/// Implementations must be safe to share between tasks, but they do not
/// order whole request/response exchanges. Keeping one exchange in flight
/// at a time is the job of the layer above.
pub trait Connection: Send + Sync + 'static {
    /// Writes all of `data` to the peer and flushes it.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Suspends until exactly `n` bytes have been received.
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the peer closes the
    /// stream first. Bytes consumed before the close are lost.
    fn recv_exact(
        &self,
        n: usize,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Shuts down the write side. Later calls fail with
    /// [`TransportError::Closed`].
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
