//! Error types for the protocol layer.
//!
//! These are framing failures: the bytes on the connection (or the request
//! about to be written) do not form a valid frame. They are distinct from
//! the in-band [`ErrorCode`] values a broker reports inside a well-formed
//! failure response. After a decode error the connection can no longer be
//! trusted to be aligned on a frame boundary.

use mega_transport::TransportError;

use crate::ErrorCode;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The request violates a local precondition and was not sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A length (declared on the wire, or of a field about to be written)
    /// exceeds the configured [`FrameLimits`](crate::FrameLimits).
    #[error("{field} length {length} exceeds limit of {max} bytes")]
    FrameTooLarge {
        field: &'static str,
        length: usize,
        max: usize,
    },

    /// A length prefix on the wire is negative.
    #[error("{field} length is negative: {length}")]
    NegativeLength { field: &'static str, length: i32 },

    /// The stream ended before a complete frame was read.
    #[error("stream ended while reading {field}")]
    Truncated { field: &'static str },

    /// A text field is not valid UTF-8.
    #[error("{field} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// The error-code byte of a failure response is not a known code.
    #[error("unknown error code: {0}")]
    UnknownErrorCode(u8),

    /// The message-type byte of a request is not a known kind.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// The underlying connection failed for a reason other than a clean
    /// end of stream.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Maps this error onto the in-band error vocabulary.
    ///
    /// A broker that cannot parse a request answers with this code, and a
    /// client can use it to report local failures in the same terms as
    /// remote ones.
    pub fn class(&self) -> ErrorCode {
        match self {
            Self::FrameTooLarge { .. } => ErrorCode::MessageTooLarge,
            Self::UnknownMessageType(_) => ErrorCode::InvalidMessageType,
            Self::Transport(_) | Self::Truncated { .. } => {
                ErrorCode::NetworkError
            }
            Self::InvalidRequest(_)
            | Self::NegativeLength { .. }
            | Self::InvalidUtf8 { .. }
            | Self::UnknownErrorCode(_) => ErrorCode::InvalidRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_maps_oversize_to_message_too_large() {
        let err = ProtocolError::FrameTooLarge {
            field: "payload",
            length: 10,
            max: 5,
        };
        assert_eq!(err.class(), ErrorCode::MessageTooLarge);
        assert_eq!(
            err.to_string(),
            "payload length 10 exceeds limit of 5 bytes"
        );
    }

    #[test]
    fn test_class_maps_truncation_to_network_error() {
        let err = ProtocolError::Truncated { field: "timestamp" };
        assert_eq!(err.class(), ErrorCode::NetworkError);
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err: ProtocolError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "connection already closed");
    }
}
