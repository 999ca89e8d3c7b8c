//! Wire protocol for the mega message broker.
//!
//! This crate defines what travels over a broker connection:
//!
//! - **Types** ([`Request`], [`Response`], [`ErrorCode`], ...) — the typed
//!   view of requests and replies.
//! - **Codec** ([`BinaryCodec`]) — the big-endian, length-prefixed frame
//!   format, for both the requesting and the answering side.
//! - **Errors** ([`ProtocolError`]) — framing failures, kept separate from
//!   the in-band [`ErrorCode`]s a broker reports.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the client
//! facade. It reads frames through the [`mega_transport::Connection`]
//! trait but does not own connections or decide when to send.
//!
//! ```text
//! Transport (bytes) → Protocol (Request / Response) → Client (round trips)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{
    BinaryCodec, CONSUME_OFFSET_LEN, FrameLimits, REQUEST_FIXED_LEN,
    RESPONSE_HEADER_LEN, RequestFrame, now_millis, request_frame_len,
};
pub use error::ProtocolError;
pub use types::{
    CorrelationId, ErrorCode, Request, RequestKind, Response, Success,
};
