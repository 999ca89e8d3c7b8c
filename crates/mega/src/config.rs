//! Client configuration.

use std::time::Duration;

use mega_protocol::FrameLimits;
use serde::{Deserialize, Serialize};

/// Settings for one client connection.
///
/// Build one with [`ClientBuilder`](crate::ClientBuilder) or deserialize
/// it from a config file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker address, `host:port`.
    pub addr: String,

    /// How long to wait for the TCP connection to open.
    pub connect_timeout: Duration,

    /// Bound on one full round trip (send plus complete reply). `None`
    /// waits forever.
    pub request_timeout: Option<Duration>,

    /// Size limits applied to outgoing requests and incoming replies.
    pub limits: FrameLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(30)),
            limits: FrameLimits::default(),
        }
    }
}
