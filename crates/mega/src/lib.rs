//! # mega
//!
//! Client for the mega message broker.
//!
//! The broker speaks a small binary protocol over one TCP connection:
//! create a topic, produce a message to it, consume a message at an
//! offset. This crate wraps the layers underneath into a [`Client`]:
//!
//! - [`mega_transport`] moves bytes,
//! - [`mega_protocol`] turns them into typed requests and replies,
//! - [`Client`] runs one request/response exchange at a time and owns the
//!   correlation-id counter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mega::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let client = Client::builder().addr("127.0.0.1:8080").connect().await?;
//!
//! client.create_topic("test-topic").await?;
//! client.produce("test-topic", "Hello, World!").await?;
//!
//! match client.consume("test-topic", 0).await? {
//!     Response::Success(Success::Consume { payload, next_offset, .. }) => {
//!         println!("{} (next: {next_offset})", String::from_utf8_lossy(&payload));
//!     }
//!     Response::Failure { error_code, .. } => println!("broker said {error_code}"),
//!     other => println!("unexpected reply {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::ClientError;

pub use mega_protocol;
pub use mega_transport;

/// Everything needed for typical client code.
pub mod prelude {
    pub use crate::{Client, ClientBuilder, ClientConfig, ClientError};
    pub use mega_protocol::{
        CorrelationId, ErrorCode, FrameLimits, Request, RequestKind,
        Response, Success,
    };
}
