//! Binary frame codec.
//!
//! All integers are big-endian with no padding. Text is UTF-8 behind a
//! 4-byte signed byte-length prefix.
//!
//! Request frame:
//!
//! ```text
//! ┌──────────┬──────┬──────────┬───────┬───────────┬──────────┬────────────┬─────────┐
//! │ corr id  │ kind │ topic len│ topic │ timestamp │ offset   │ payload len│ payload │
//! │ i32      │ u8   │ i32      │ bytes │ i64       │ i32      │ i32        │ bytes   │
//! │          │      │          │       │           │ Consume  │            │         │
//! │          │      │          │       │           │ only     │            │         │
//! └──────────┴──────┴──────────┴───────┴───────────┴──────────┴────────────┴─────────┘
//! ```
//!
//! Response frame, common header then a tail chosen by the outcome and by
//! the kind of the request being answered:
//!
//! ```text
//! ┌──────────┬─────────┬───────────┐
//! │ corr id  │ success │ timestamp │  then one of:
//! │ i32      │ u8      │ i64       │
//! └──────────┴─────────┴───────────┘
//!   failure      error code (u8)
//!   CreateTopic  topic len (i32), topic
//!   Produce      offset (i32)
//!   Consume      next offset (i32), payload len (i32), payload
//! ```
//!
//! Responses carry no kind tag, so [`BinaryCodec::decode_response`] has to
//! be told which request it is decoding a reply for.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mega_transport::{Connection, TransportError};
use serde::{Deserialize, Serialize};

use crate::{
    CorrelationId, ErrorCode, ProtocolError, Request, RequestKind, Response,
    Success,
};

/// Size of the fixed request fields: correlation id, kind, topic length,
/// timestamp, payload length.
pub const REQUEST_FIXED_LEN: usize = 4 + 1 + 4 + 8 + 4;

/// Size of the offset field carried by `Consume` requests.
pub const CONSUME_OFFSET_LEN: usize = 4;

/// Size of the common response header: correlation id, success, timestamp.
pub const RESPONSE_HEADER_LEN: usize = 4 + 1 + 8;

/// Upper bounds on variable-length fields.
///
/// Applied before a declared length is trusted, so a corrupt or hostile
/// length prefix cannot trigger an unbounded allocation. Values above
/// `i32::MAX` are clamped, since that is the largest length the wire can
/// express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLimits {
    /// Longest accepted topic, in UTF-8 bytes.
    pub max_topic_len: usize,
    /// Longest accepted message payload, in bytes.
    pub max_payload_len: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_topic_len: 65_535,
            max_payload_len: 16 * 1024 * 1024,
        }
    }
}

/// A request frame read by the accepting side, with the sender's timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub request: Request,
    /// Milliseconds since the Unix epoch, as stamped by the sender.
    pub timestamp: i64,
}

/// Milliseconds since the Unix epoch.
///
/// A clock set before 1970 yields 0. The value is advisory on the wire.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Total encoded size of `request`.
pub fn request_frame_len(request: &Request) -> usize {
    let offset_len = if request.offset().is_some() {
        CONSUME_OFFSET_LEN
    } else {
        0
    };
    REQUEST_FIXED_LEN
        + request.topic().len()
        + offset_len
        + request.payload().len()
}

/// Encodes requests and responses and decodes them from a [`Connection`].
///
/// The codec is stateless apart from its limits and can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec {
    limits: FrameLimits,
}

impl BinaryCodec {
    pub fn new(limits: FrameLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Encodes `request`, stamping it with the current time.
    ///
    /// # Errors
    /// `InvalidRequest` for an empty topic, `FrameTooLarge` when the topic
    /// or payload is over the limits. Nothing has been sent in either case.
    pub fn encode_request(
        &self,
        request: &Request,
    ) -> Result<Bytes, ProtocolError> {
        self.encode_request_at(request, now_millis())
    }

    /// Encodes `request` with an explicit timestamp.
    pub fn encode_request_at(
        &self,
        request: &Request,
        timestamp: i64,
    ) -> Result<Bytes, ProtocolError> {
        let topic = request.topic().as_bytes();
        if topic.is_empty() {
            return Err(ProtocolError::InvalidRequest(
                "topic must not be empty".into(),
            ));
        }
        let topic_len = wire_len("topic", topic.len(), self.limits.max_topic_len)?;
        let payload = request.payload();
        let payload_len =
            wire_len("payload", payload.len(), self.limits.max_payload_len)?;

        let mut buf = BytesMut::with_capacity(request_frame_len(request));
        buf.put_i32(request.correlation_id().0);
        buf.put_u8(request.kind().tag());
        buf.put_i32(topic_len);
        buf.put_slice(topic);
        buf.put_i64(timestamp);
        if let Some(offset) = request.offset() {
            buf.put_i32(offset);
        }
        buf.put_i32(payload_len);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    /// Reads one request frame from `conn`.
    ///
    /// # Errors
    /// `UnknownMessageType` for a tag outside 1..=3. The rest of such a
    /// frame cannot be delimited, so the connection should be dropped.
    pub async fn decode_request<C: Connection>(
        &self,
        conn: &C,
    ) -> Result<RequestFrame, ProtocolError> {
        let reader = FieldReader::new(conn);

        let mut head = reader.bytes(4 + 1, "request header").await?;
        let correlation_id = CorrelationId(head.get_i32());
        let kind = RequestKind::try_from(head.get_u8())?;

        let topic = reader.text("topic", self.limits.max_topic_len).await?;
        let timestamp = reader.i64("timestamp").await?;
        let offset = match kind {
            RequestKind::Consume => Some(reader.i32("offset").await?),
            RequestKind::Produce | RequestKind::CreateTopic => None,
        };
        let payload = reader
            .blob("payload", self.limits.max_payload_len)
            .await?;

        // Checked only once the whole frame is consumed, so the stream stays
        // aligned for the next request.
        if topic.is_empty() {
            return Err(ProtocolError::InvalidRequest(
                "topic must not be empty".into(),
            ));
        }

        Ok(RequestFrame {
            request: Request::from_wire(
                correlation_id,
                kind,
                topic,
                offset,
                payload.to_vec(),
            ),
            timestamp,
        })
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    /// Encodes a response frame.
    ///
    /// A failure is the common header plus exactly one error-code byte.
    pub fn encode_response(
        &self,
        response: &Response,
    ) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(RESPONSE_HEADER_LEN + 8);
        buf.put_i32(response.correlation_id().0);
        buf.put_u8(u8::from(response.is_success()));
        buf.put_i64(response.timestamp());

        match response {
            Response::Failure { error_code, .. } => {
                buf.put_u8(error_code.code());
            }
            Response::Success(Success::CreateTopic { topic, .. }) => {
                let len =
                    wire_len("topic", topic.len(), self.limits.max_topic_len)?;
                buf.put_i32(len);
                buf.put_slice(topic.as_bytes());
            }
            Response::Success(Success::Produce { offset, .. }) => {
                buf.put_i32(*offset);
            }
            Response::Success(Success::Consume {
                next_offset,
                payload,
                ..
            }) => {
                let len = wire_len(
                    "payload",
                    payload.len(),
                    self.limits.max_payload_len,
                )?;
                buf.put_i32(*next_offset);
                buf.put_i32(len);
                buf.put_slice(payload);
            }
        }
        Ok(buf.freeze())
    }

    /// Reads the reply to a request of the given `kind` from `conn`.
    ///
    /// Bytes are pulled field by field with [`Connection::recv_exact`], so
    /// the reply may arrive in any number of pieces. A failure reply
    /// consumes exactly one byte after the header and nothing more.
    ///
    /// # Errors
    /// `Truncated` if the stream ends mid-frame, `UnknownErrorCode` for an
    /// unrecognized error byte, `NegativeLength`/`FrameTooLarge` for a bad
    /// length prefix, `InvalidUtf8` for a malformed topic. No partial
    /// response is ever returned.
    pub async fn decode_response<C: Connection>(
        &self,
        kind: RequestKind,
        conn: &C,
    ) -> Result<Response, ProtocolError> {
        let reader = FieldReader::new(conn);

        let mut header =
            reader.bytes(RESPONSE_HEADER_LEN, "response header").await?;
        let correlation_id = CorrelationId(header.get_i32());
        let success = header.get_u8() != 0;
        let timestamp = header.get_i64();

        if !success {
            let error_code = ErrorCode::try_from(reader.u8("error code").await?)?;
            return Ok(Response::Failure {
                correlation_id,
                timestamp,
                error_code,
            });
        }

        let success = match kind {
            RequestKind::CreateTopic => Success::CreateTopic {
                correlation_id,
                timestamp,
                topic: reader
                    .text("topic", self.limits.max_topic_len)
                    .await?,
            },
            RequestKind::Produce => Success::Produce {
                correlation_id,
                timestamp,
                offset: reader.i32("offset").await?,
            },
            RequestKind::Consume => {
                let next_offset = reader.i32("next offset").await?;
                let payload = reader
                    .blob("payload", self.limits.max_payload_len)
                    .await?;
                Success::Consume {
                    correlation_id,
                    timestamp,
                    next_offset,
                    payload: payload.to_vec(),
                }
            }
        };
        Ok(Response::Success(success))
    }
}

/// Converts a field length to its wire form, enforcing `max`.
fn wire_len(
    field: &'static str,
    length: usize,
    max: usize,
) -> Result<i32, ProtocolError> {
    let max = max.min(i32::MAX as usize);
    if length > max {
        return Err(ProtocolError::FrameTooLarge { field, length, max });
    }
    // Bounded by `max` above.
    Ok(length as i32)
}

/// Pulls typed fields off a connection.
///
/// A clean end of stream mid-frame becomes [`ProtocolError::Truncated`]
/// naming the field that was cut off. Any other I/O failure passes through
/// as [`ProtocolError::Transport`].
struct FieldReader<'a, C> {
    conn: &'a C,
}

impl<'a, C: Connection> FieldReader<'a, C> {
    fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    async fn bytes(
        &self,
        n: usize,
        field: &'static str,
    ) -> Result<Bytes, ProtocolError> {
        self.conn.recv_exact(n).await.map_err(|e| match e {
            TransportError::ConnectionClosed(_) => {
                ProtocolError::Truncated { field }
            }
            other => ProtocolError::Transport(other),
        })
    }

    async fn u8(&self, field: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.bytes(1, field).await?.get_u8())
    }

    async fn i32(&self, field: &'static str) -> Result<i32, ProtocolError> {
        Ok(self.bytes(4, field).await?.get_i32())
    }

    async fn i64(&self, field: &'static str) -> Result<i64, ProtocolError> {
        Ok(self.bytes(8, field).await?.get_i64())
    }

    /// Reads a length prefix and checks it against `max` before anything
    /// is allocated for the data that follows.
    async fn length(
        &self,
        field: &'static str,
        max: usize,
    ) -> Result<usize, ProtocolError> {
        let raw = self.i32(field).await?;
        let length = usize::try_from(raw)
            .map_err(|_| ProtocolError::NegativeLength { field, length: raw })?;
        if length > max {
            return Err(ProtocolError::FrameTooLarge { field, length, max });
        }
        Ok(length)
    }

    async fn blob(
        &self,
        field: &'static str,
        max: usize,
    ) -> Result<Bytes, ProtocolError> {
        let length = self.length(field, max).await?;
        self.bytes(length, field).await
    }

    async fn text(
        &self,
        field: &'static str,
        max: usize,
    ) -> Result<String, ProtocolError> {
        let raw = self.blob(field, max).await?;
        String::from_utf8(raw.to_vec())
            .map_err(|source| ProtocolError::InvalidUtf8 { field, source })
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use mega_transport::StreamConnection;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    type TestConn = StreamConnection<DuplexStream>;

    const TS: i64 = 1_700_000_000_000;

    /// Returns a connection with `bytes` already waiting to be read. The
    /// peer half is returned so the stream stays open.
    async fn preloaded(bytes: &[u8]) -> (TestConn, DuplexStream) {
        let (local, mut peer) = tokio::io::duplex(64 * 1024);
        peer.write_all(bytes).await.unwrap();
        (StreamConnection::new(local), peer)
    }

    /// Like [`preloaded`], but the peer is closed after writing.
    async fn preloaded_then_eof(bytes: &[u8]) -> TestConn {
        let (conn, peer) = preloaded(bytes).await;
        drop(peer);
        conn
    }

    fn response_header(correlation_id: i32, success: bool) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_i32(correlation_id);
        buf.put_u8(u8::from(success));
        buf.put_i64(TS);
        buf
    }

    // =====================================================================
    // Request encoding
    // =====================================================================

    #[test]
    fn test_encode_produce_exact_bytes() {
        let codec = BinaryCodec::default();
        let request =
            Request::produce(CorrelationId(1), "test-topic", "Hello, World!");

        let frame = codec.encode_request_at(&request, TS).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.push(1);
        expected.extend_from_slice(&10i32.to_be_bytes());
        expected.extend_from_slice(b"test-topic");
        expected.extend_from_slice(&TS.to_be_bytes());
        expected.extend_from_slice(&13i32.to_be_bytes());
        expected.extend_from_slice(b"Hello, World!");
        assert_eq!(&frame[..], &expected[..]);
    }

    #[test]
    fn test_encode_length_without_offset_for_non_consume_kinds() {
        let codec = BinaryCodec::default();
        let cases = [
            Request::produce(CorrelationId(1), "t", Vec::<u8>::new()),
            Request::produce(CorrelationId(2), "orders", vec![0u8; 300]),
            Request::create_topic(CorrelationId(3), "ümlaut-topic"),
        ];

        for request in cases {
            let frame = codec.encode_request_at(&request, TS).unwrap();
            let expected = 4
                + 1
                + 4
                + request.topic().len()
                + 8
                + 4
                + request.payload().len();
            assert_eq!(frame.len(), expected, "{request:?}");
            assert_eq!(frame.len(), request_frame_len(&request));
        }
    }

    #[test]
    fn test_encode_consume_places_offset_after_timestamp() {
        let codec = BinaryCodec::default();
        let request = Request::consume(CorrelationId(5), "test-topic", 0x0102_0304);

        let frame = codec.encode_request_at(&request, TS).unwrap();
        assert_eq!(frame.len(), 4 + 1 + 4 + 10 + 8 + 4 + 4);

        let ts_at = 4 + 1 + 4 + 10;
        assert_eq!(&frame[ts_at..ts_at + 8], &TS.to_be_bytes());
        assert_eq!(&frame[ts_at + 8..ts_at + 12], &[1, 2, 3, 4]);
        // Empty payload: just a zero length, no payload bytes.
        assert_eq!(&frame[ts_at + 12..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_rejects_empty_topic() {
        let codec = BinaryCodec::default();
        let err = codec
            .encode_request(&Request::create_topic(CorrelationId(1), ""))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
        assert_eq!(err.class(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let codec = BinaryCodec::new(FrameLimits {
            max_topic_len: 16,
            max_payload_len: 4,
        });
        let err = codec
            .encode_request(&Request::produce(CorrelationId(1), "t", "12345"))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooLarge {
                field: "payload",
                length: 5,
                max: 4
            }
        ));
    }

    #[test]
    fn test_now_millis_is_after_2023() {
        assert!(now_millis() > TS);
    }

    // =====================================================================
    // Response decoding
    // =====================================================================

    #[tokio::test]
    async fn test_decode_produce_success() {
        let mut bytes = response_header(1, true);
        bytes.put_i32(42);
        let (conn, _peer) = preloaded(&bytes).await;

        let response = BinaryCodec::default()
            .decode_response(RequestKind::Produce, &conn)
            .await
            .unwrap();

        assert_eq!(
            response,
            Response::Success(Success::Produce {
                correlation_id: CorrelationId(1),
                timestamp: TS,
                offset: 42,
            })
        );
    }

    #[tokio::test]
    async fn test_decode_consume_success_with_empty_payload() {
        let mut bytes = response_header(5, true);
        bytes.put_i32(1);
        bytes.put_i32(0);
        let (conn, _peer) = preloaded(&bytes).await;

        let response = BinaryCodec::default()
            .decode_response(RequestKind::Consume, &conn)
            .await
            .unwrap();

        match response {
            Response::Success(Success::Consume {
                next_offset,
                payload,
                ..
            }) => {
                assert_eq!(next_offset, 1);
                assert!(payload.is_empty());
            }
            other => panic!("expected consume success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decode_consume_payload_is_raw_bytes() {
        // Not valid UTF-8; the decoder must not care.
        let body = [0xff, 0x00, 0xfe];
        let mut bytes = response_header(5, true);
        bytes.put_i32(8);
        bytes.put_i32(body.len() as i32);
        bytes.put_slice(&body);
        let (conn, _peer) = preloaded(&bytes).await;

        let response = BinaryCodec::default()
            .decode_response(RequestKind::Consume, &conn)
            .await
            .unwrap();

        let Response::Success(Success::Consume { payload, .. }) = response
        else {
            panic!("expected consume success");
        };
        assert_eq!(payload, body);
    }

    #[tokio::test]
    async fn test_decode_create_topic_uses_four_byte_length() {
        let mut bytes = response_header(3, true);
        bytes.put_i32(10);
        bytes.put_slice(b"test-topic");
        let (conn, _peer) = preloaded(&bytes).await;

        let response = BinaryCodec::default()
            .decode_response(RequestKind::CreateTopic, &conn)
            .await
            .unwrap();

        assert_eq!(
            response,
            Response::Success(Success::CreateTopic {
                correlation_id: CorrelationId(3),
                timestamp: TS,
                topic: "test-topic".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_decode_failure_reads_exactly_one_byte_after_header() {
        for kind in [
            RequestKind::Produce,
            RequestKind::Consume,
            RequestKind::CreateTopic,
        ] {
            let mut bytes = response_header(7, false);
            bytes.put_u8(4);
            // Whatever follows belongs to the next frame.
            bytes.put_slice(b"NEXT");
            let (conn, _peer) = preloaded(&bytes).await;

            let response = BinaryCodec::default()
                .decode_response(kind, &conn)
                .await
                .unwrap();

            assert_eq!(
                response,
                Response::Failure {
                    correlation_id: CorrelationId(7),
                    timestamp: TS,
                    error_code: ErrorCode::TopicNotFound,
                }
            );
            assert_eq!(&conn.recv_exact(4).await.unwrap()[..], b"NEXT");
        }
    }

    #[tokio::test]
    async fn test_decode_unknown_error_code_fails() {
        let mut bytes = response_header(7, false);
        bytes.put_u8(42);
        let (conn, _peer) = preloaded(&bytes).await;

        let err = BinaryCodec::default()
            .decode_response(RequestKind::Produce, &conn)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownErrorCode(42)));
    }

    #[tokio::test]
    async fn test_decode_one_byte_at_a_time() {
        let payload = b"Hello, World!";

        let mut consume = response_header(9, true);
        consume.put_i32(3);
        consume.put_i32(payload.len() as i32);
        consume.put_slice(payload);

        let mut create = response_header(10, true);
        create.put_i32(6);
        create.put_slice(b"orders");

        let mut produce = response_header(11, true);
        produce.put_i32(42);

        let mut failure = response_header(12, false);
        failure.put_u8(ErrorCode::TopicAlreadyExists.code());

        let cases = [
            (
                RequestKind::Consume,
                consume,
                Response::Success(Success::Consume {
                    correlation_id: CorrelationId(9),
                    timestamp: TS,
                    next_offset: 3,
                    payload: payload.to_vec(),
                }),
            ),
            (
                RequestKind::CreateTopic,
                create,
                Response::Success(Success::CreateTopic {
                    correlation_id: CorrelationId(10),
                    timestamp: TS,
                    topic: "orders".into(),
                }),
            ),
            (
                RequestKind::Produce,
                produce,
                Response::Success(Success::Produce {
                    correlation_id: CorrelationId(11),
                    timestamp: TS,
                    offset: 42,
                }),
            ),
            (
                RequestKind::CreateTopic,
                failure,
                Response::Failure {
                    correlation_id: CorrelationId(12),
                    timestamp: TS,
                    error_code: ErrorCode::TopicAlreadyExists,
                },
            ),
        ];

        for (kind, bytes, expected) in cases {
            let bytes = bytes.freeze();

            // A one-byte pipe: every read on the other end sees one byte.
            let (local, mut peer) = tokio::io::duplex(1);
            let writer = tokio::spawn(async move {
                for byte in bytes.iter() {
                    peer.write_all(&[*byte]).await.unwrap();
                    tokio::task::yield_now().await;
                }
                peer
            });
            let conn = StreamConnection::new(local);

            let response = BinaryCodec::default()
                .decode_response(kind, &conn)
                .await
                .unwrap();
            writer.await.unwrap();

            assert_eq!(response, expected, "decoding reply to {kind}");
        }
    }

    #[tokio::test]
    async fn test_decode_truncated_header() {
        let conn = preloaded_then_eof(&[0, 0, 0, 1, 1]).await;
        let err = BinaryCodec::default()
            .decode_response(RequestKind::Produce, &conn)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                field: "response header"
            }
        ));
    }

    #[tokio::test]
    async fn test_decode_truncated_payload() {
        let mut bytes = response_header(1, true);
        bytes.put_i32(1);
        bytes.put_i32(10);
        bytes.put_slice(b"short");
        let conn = preloaded_then_eof(&bytes).await;

        let err = BinaryCodec::default()
            .decode_response(RequestKind::Consume, &conn)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { field: "payload" }));
        assert_eq!(err.class(), ErrorCode::NetworkError);
    }

    #[tokio::test]
    async fn test_decode_rejects_negative_length() {
        let mut bytes = response_header(1, true);
        bytes.put_i32(1);
        bytes.put_i32(-1);
        let (conn, _peer) = preloaded(&bytes).await;

        let err = BinaryCodec::default()
            .decode_response(RequestKind::Consume, &conn)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::NegativeLength {
                field: "payload",
                length: -1
            }
        ));
    }

    #[tokio::test]
    async fn test_decode_rejects_length_over_limit_before_reading() {
        let codec = BinaryCodec::new(FrameLimits {
            max_topic_len: 8,
            max_payload_len: 1024,
        });
        let mut bytes = response_header(1, true);
        bytes.put_i32(1);
        bytes.put_i32(i32::MAX);
        // No payload bytes follow: the limit check must fire first.
        let (conn, _peer) = preloaded(&bytes).await;

        let err = codec
            .decode_response(RequestKind::Consume, &conn)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooLarge {
                field: "payload",
                max: 1024,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_decode_rejects_invalid_utf8_topic() {
        let mut bytes = response_header(1, true);
        bytes.put_i32(2);
        bytes.put_slice(&[0xc3, 0x28]);
        let (conn, _peer) = preloaded(&bytes).await;

        let err = BinaryCodec::default()
            .decode_response(RequestKind::CreateTopic, &conn)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidUtf8 { field: "topic", .. }
        ));
    }

    // =====================================================================
    // Peer side: request decoding and response encoding
    // =====================================================================

    #[tokio::test]
    async fn test_request_decodes_as_encoded() {
        let codec = BinaryCodec::default();
        let requests = [
            Request::consume(CorrelationId(5), "test-topic", 17),
            Request::produce(CorrelationId(6), "test-topic", vec![0, 1, 2]),
            Request::create_topic(CorrelationId(7), "fresh"),
        ];

        let mut stream = Vec::new();
        for request in &requests {
            stream.extend_from_slice(&codec.encode_request_at(request, TS).unwrap());
        }
        // Frames are self-delimiting: read them back-to-back.
        let conn = preloaded_then_eof(&stream).await;

        for request in requests {
            let frame = codec.decode_request(&conn).await.unwrap();
            assert_eq!(frame.request, request);
            assert_eq!(frame.timestamp, TS);
        }
    }

    #[tokio::test]
    async fn test_request_with_unknown_kind_fails() {
        let mut bytes = BytesMut::new();
        bytes.put_i32(1);
        bytes.put_u8(9);
        let (conn, _peer) = preloaded(&bytes).await;

        let err = BinaryCodec::default()
            .decode_request(&conn)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(9)));
        assert_eq!(err.class(), ErrorCode::InvalidMessageType);
    }

    #[test]
    fn test_encode_failure_response_is_header_plus_one_byte() {
        let frame = BinaryCodec::default()
            .encode_response(&Response::Failure {
                correlation_id: CorrelationId(2),
                timestamp: TS,
                error_code: ErrorCode::InvalidOffset,
            })
            .unwrap();

        assert_eq!(frame.len(), RESPONSE_HEADER_LEN + 1);
        assert_eq!(frame[4], 0);
        assert_eq!(frame[RESPONSE_HEADER_LEN], 6);
    }

    #[tokio::test]
    async fn test_encoded_responses_decode_for_their_kind() {
        let codec = BinaryCodec::default();
        let responses = [
            Success::CreateTopic {
                correlation_id: CorrelationId(1),
                timestamp: TS,
                topic: "test-topic".into(),
            },
            Success::Produce {
                correlation_id: CorrelationId(2),
                timestamp: TS,
                offset: 0,
            },
            Success::Consume {
                correlation_id: CorrelationId(3),
                timestamp: TS,
                next_offset: 1,
                payload: b"Hello, World!".to_vec(),
            },
        ];

        for success in responses {
            let kind = success.kind();
            let response = Response::Success(success);
            let frame = codec.encode_response(&response).unwrap();
            let (conn, _peer) = preloaded(&frame).await;

            let decoded = codec.decode_response(kind, &conn).await.unwrap();
            assert_eq!(decoded, response);
        }
    }
}
