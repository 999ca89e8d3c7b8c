/// Errors that can occur in the transport layer.
///
/// None of these are retried by the transport. Whether to reconnect is the
/// caller's decision.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (refused, unreachable, timed out).
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the stream before the requested bytes arrived.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The connection was closed locally and can no longer be used.
    #[error("connection already closed")]
    Closed,

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}
