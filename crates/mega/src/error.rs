//! Unified error type for the mega client.

use std::time::Duration;

use mega_protocol::{ErrorCode, ProtocolError};
use mega_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// In-band broker failures (a missing topic, a bad offset) are not errors
/// here; they come back as `Ok(Response::Failure { .. })`. Every variant of
/// this enum means the request did not complete. Except for a rejected
/// request that was never sent, the connection is unusable afterwards.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (invalid request, malformed or truncated
    /// frame, unknown enum value).
    #[error(transparent)]
    Protocol(ProtocolError),

    /// The connect or the round trip did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An earlier exchange failed or was abandoned partway, or the client
    /// was closed. The byte stream can no longer be trusted to start at a
    /// frame boundary.
    #[error("connection is closed or broken; reconnect to continue")]
    ConnectionBroken,
}

impl ClientError {
    /// Whether this is a network-class failure rather than a framing or
    /// local one. Reconnecting may help for these.
    ///
    /// A stream that ends mid-frame counts, in line with
    /// [`ProtocolError::class`].
    pub fn is_network(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Protocol(e) => e.class() == ErrorCode::NetworkError,
            Self::ConnectionBroken => false,
        }
    }
}

/// Lifts I/O failures that surfaced during decoding back to
/// [`ClientError::Transport`], so framing and network problems stay
/// distinguishable.
impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Transport(inner) => Self::Transport(inner),
            other => Self::Protocol(other),
        }
    }
}
