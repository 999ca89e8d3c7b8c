//! Core protocol types for the broker's wire format.
//!
//! Requests carry a one-byte kind tag on the wire; responses do not. A
//! response can only be interpreted by someone who knows which request it
//! answers, which is why [`Success`] variants mirror [`RequestKind`].

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Caller-chosen request identifier, echoed back by the broker.
///
/// Only one request is ever in flight per connection, so the broker does
/// not use this for routing. It lets a caller check that a reply belongs
/// to the request it just sent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CorrelationId(pub i32);

impl CorrelationId {
    /// Returns the id that follows this one, wrapping at `i32::MAX`.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corr-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RequestKind
// ---------------------------------------------------------------------------

/// The operation a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Produce,
    Consume,
    CreateTopic,
}

impl RequestKind {
    /// The message-type byte written on the wire.
    pub fn tag(self) -> u8 {
        match self {
            Self::Produce => 1,
            Self::Consume => 2,
            Self::CreateTopic => 3,
        }
    }
}

impl TryFrom<u8> for RequestKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::Produce),
            2 => Ok(Self::Consume),
            3 => Ok(Self::CreateTopic),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Produce => "produce",
            Self::Consume => "consume",
            Self::CreateTopic => "create_topic",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Failure reasons a broker reports in-band, inside a well-formed response.
///
/// These are ordinary outcomes (a missing topic, an offset past the end)
/// and reach the caller as [`Response::Failure`] values, not as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidMessageType,
    MessageTooLarge,
    TopicNotFound,
    TopicAlreadyExists,
    InvalidOffset,
    InternalError,
    NetworkError,
    ResourceExhausted,
}

impl ErrorCode {
    /// The byte written on the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::InvalidRequest => 1,
            Self::InvalidMessageType => 2,
            Self::MessageTooLarge => 3,
            Self::TopicNotFound => 4,
            Self::TopicAlreadyExists => 5,
            Self::InvalidOffset => 6,
            Self::InternalError => 7,
            Self::NetworkError => 8,
            Self::ResourceExhausted => 9,
        }
    }

    /// The upper-snake-case name, e.g. `TOPIC_NOT_FOUND`.
    pub fn name(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidMessageType => "INVALID_MESSAGE_TYPE",
            Self::MessageTooLarge => "MESSAGE_TOO_LARGE",
            Self::TopicNotFound => "TOPIC_NOT_FOUND",
            Self::TopicAlreadyExists => "TOPIC_ALREADY_EXISTS",
            Self::InvalidOffset => "INVALID_OFFSET",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
        }
    }
}

/// Unknown codes are a decode failure. There is no fallback variant.
impl TryFrom<u8> for ErrorCode {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::InvalidRequest),
            2 => Ok(Self::InvalidMessageType),
            3 => Ok(Self::MessageTooLarge),
            4 => Ok(Self::TopicNotFound),
            5 => Ok(Self::TopicAlreadyExists),
            6 => Ok(Self::InvalidOffset),
            7 => Ok(Self::InternalError),
            8 => Ok(Self::NetworkError),
            9 => Ok(Self::ResourceExhausted),
            other => Err(ProtocolError::UnknownErrorCode(other)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A request to the broker.
///
/// Built through [`Request::produce`], [`Request::consume`] or
/// [`Request::create_topic`]. The offset is present exactly when the kind
/// is `Consume`, and the fields cannot be changed afterwards.
///
/// Deserializing checks the same shape: an offset for `Consume` only and
/// no payload outside `Produce`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RequestFields")]
pub struct Request {
    correlation_id: CorrelationId,
    kind: RequestKind,
    topic: String,
    payload: Vec<u8>,
    offset: Option<i32>,
}

impl Request {
    /// Appends `payload` to `topic`.
    pub fn produce(
        correlation_id: CorrelationId,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            correlation_id,
            kind: RequestKind::Produce,
            topic: topic.into(),
            payload: payload.into(),
            offset: None,
        }
    }

    /// Reads the message stored at `offset` in `topic`.
    pub fn consume(
        correlation_id: CorrelationId,
        topic: impl Into<String>,
        offset: i32,
    ) -> Self {
        Self {
            correlation_id,
            kind: RequestKind::Consume,
            topic: topic.into(),
            payload: Vec::new(),
            offset: Some(offset),
        }
    }

    /// Creates `topic` on the broker.
    pub fn create_topic(
        correlation_id: CorrelationId,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            kind: RequestKind::CreateTopic,
            topic: topic.into(),
            payload: Vec::new(),
            offset: None,
        }
    }

    /// Reassembles a request read off the wire.
    ///
    /// The decoder only passes an offset for `Consume` frames, which keeps
    /// the invariant without re-checking it here.
    pub(crate) fn from_wire(
        correlation_id: CorrelationId,
        kind: RequestKind,
        topic: String,
        offset: Option<i32>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            correlation_id,
            kind,
            topic,
            payload,
            offset,
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The requested read position. `Some` only for `Consume`.
    pub fn offset(&self) -> Option<i32> {
        self.offset
    }
}

/// Unchecked field set a [`Request`] is deserialized through.
#[derive(Deserialize)]
struct RequestFields {
    correlation_id: CorrelationId,
    kind: RequestKind,
    topic: String,
    #[serde(default)]
    payload: Vec<u8>,
    #[serde(default)]
    offset: Option<i32>,
}

impl TryFrom<RequestFields> for Request {
    type Error = ProtocolError;

    fn try_from(fields: RequestFields) -> Result<Self, Self::Error> {
        let RequestFields {
            correlation_id,
            kind,
            topic,
            payload,
            offset,
        } = fields;

        match (kind, offset) {
            (RequestKind::Consume, None) => {
                return Err(ProtocolError::InvalidRequest(
                    "consume request needs an offset".into(),
                ));
            }
            (RequestKind::Produce | RequestKind::CreateTopic, Some(_)) => {
                return Err(ProtocolError::InvalidRequest(format!(
                    "{kind} request cannot carry an offset"
                )));
            }
            _ => {}
        }
        if kind != RequestKind::Produce && !payload.is_empty() {
            return Err(ProtocolError::InvalidRequest(format!(
                "{kind} request cannot carry a payload"
            )));
        }

        Ok(Self {
            correlation_id,
            kind,
            topic,
            payload,
            offset,
        })
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The kind-specific part of a successful response.
///
/// `timestamp` is milliseconds since the Unix epoch, stamped by whoever
/// encoded the reply. It is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Success {
    CreateTopic {
        correlation_id: CorrelationId,
        timestamp: i64,
        topic: String,
    },
    Produce {
        correlation_id: CorrelationId,
        timestamp: i64,
        /// Position the message was stored at.
        offset: i32,
    },
    Consume {
        correlation_id: CorrelationId,
        timestamp: i64,
        /// Offset to pass to the next consume call.
        next_offset: i32,
        /// Raw message bytes. May be empty.
        payload: Vec<u8>,
    },
}

impl Success {
    /// The request kind this success answers.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::CreateTopic { .. } => RequestKind::CreateTopic,
            Self::Produce { .. } => RequestKind::Produce,
            Self::Consume { .. } => RequestKind::Consume,
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::CreateTopic { correlation_id, .. }
            | Self::Produce { correlation_id, .. }
            | Self::Consume { correlation_id, .. } => *correlation_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::CreateTopic { timestamp, .. }
            | Self::Produce { timestamp, .. }
            | Self::Consume { timestamp, .. } => *timestamp,
        }
    }
}

/// A decoded broker reply: either a success or an in-band failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Success(Success),
    Failure {
        correlation_id: CorrelationId,
        timestamp: i64,
        error_code: ErrorCode,
    },
}

impl Response {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::Success(success) => success.correlation_id(),
            Self::Failure { correlation_id, .. } => *correlation_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Success(success) => success.timestamp(),
            Self::Failure { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The in-band error code, if this is a failure.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error_code, .. } => Some(*error_code),
        }
    }

    /// Splits into the success payload or the broker's error code, for
    /// callers that want to use `?` on in-band failures.
    pub fn into_result(self) -> Result<Success, ErrorCode> {
        match self {
            Self::Success(success) => Ok(success),
            Self::Failure { error_code, .. } => Err(error_code),
        }
    }
}

impl From<Success> for Response {
    fn from(success: Success) -> Self {
        Self::Success(success)
    }
}

// =========================================================================
// Tests
// =========================================================================
