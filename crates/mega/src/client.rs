//! `Client` builder and request/response exchange.
//!
//! This is the entry point for talking to a broker. It ties the layers
//! together: typed request → frame → connection → frame → typed response.

use std::time::Duration;

use bytes::Bytes;
use mega_protocol::{
    BinaryCodec, CorrelationId, FrameLimits, Request, RequestKind, Response,
};
use mega_transport::{Connection, ConnectionId, TcpConnection};
use tokio::sync::{Mutex, watch};

use crate::{ClientConfig, ClientError};

/// Builder for configuring and connecting a [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn run() -> Result<(), mega::ClientError> {
/// use std::time::Duration;
///
/// let client = mega::Client::builder()
///     .addr("127.0.0.1:8080")
///     .request_timeout(Some(Duration::from_secs(5)))
///     .connect()
///     .await?;
///
/// client.create_topic("orders").await?;
/// let reply = client.produce("orders", "first").await?;
/// println!("stored at {:?}", reply);
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Starts from an existing configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Sets the broker address.
    pub fn addr(mut self, addr: &str) -> Self {
        self.config.addr = addr.to_string();
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the per-request round-trip timeout. `None` disables it.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the frame size limits.
    pub fn limits(mut self, limits: FrameLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Opens a TCP connection to the configured address.
    pub async fn connect(self) -> Result<Client<TcpConnection>, ClientError> {
        let limit = self.config.connect_timeout;
        let conn = tokio::time::timeout(
            limit,
            TcpConnection::connect(&self.config.addr),
        )
        .await
        .map_err(|_| ClientError::Timeout(limit))??;

        tracing::info!(
            addr = %self.config.addr,
            conn = %conn.id(),
            "connected to broker"
        );
        Ok(Client::with_connection(conn, self.config))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection state, guarded for the whole of one exchange.
struct ExchangeState {
    next_correlation_id: CorrelationId,
    /// Set while an exchange is in progress and left set if it does not
    /// finish cleanly, including when the caller drops the future.
    broken: bool,
}

/// A connection to one broker.
///
/// The protocol cannot tell replies apart, so only one request may be in
/// flight per connection. Every operation holds an async mutex from
/// encoding the request until its reply is fully decoded. A client can be
/// shared (`Arc<Client>`) and concurrent callers simply take turns. For
/// real parallelism, open more clients.
///
/// [`close`](Self::close) does not wait for that lock. An exchange still in
/// progress is abandoned and fails with [`ClientError::ConnectionBroken`].
///
/// In-band broker failures come back as `Ok(Response::Failure { .. })`.
/// An `Err` means the exchange itself failed. After that the client
/// refuses further requests with [`ClientError::ConnectionBroken`], except
/// when the request was rejected before anything was sent.
pub struct Client<C: Connection = TcpConnection> {
    conn: C,
    codec: BinaryCodec,
    request_timeout: Option<Duration>,
    state: Mutex<ExchangeState>,
    /// Flipped once by `close`. In-flight exchanges watch it.
    closed: watch::Sender<bool>,
}

impl Client<TcpConnection> {
    /// Creates a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connects using `config`.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        ClientBuilder::with_config(config).connect().await
    }
}

impl<C: Connection> Client<C> {
    /// Wraps an already-open connection. `config.addr` and
    /// `config.connect_timeout` are not used.
    pub fn with_connection(conn: C, config: ClientConfig) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            conn,
            codec: BinaryCodec::new(config.limits),
            request_timeout: config.request_timeout,
            state: Mutex::new(ExchangeState {
                next_correlation_id: CorrelationId(1),
                broken: false,
            }),
            closed,
        }
    }

    /// Returns the identifier of the underlying connection.
    pub fn connection_id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Creates `topic`.
    pub async fn create_topic(
        &self,
        topic: impl Into<String>,
    ) -> Result<Response, ClientError> {
        let topic = topic.into();
        self.call(|id| Request::create_topic(id, topic)).await
    }

    /// Appends `payload` to `topic`. A success carries the stored offset.
    pub async fn produce(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Response, ClientError> {
        let topic = topic.into();
        let payload = payload.into();
        self.call(|id| Request::produce(id, topic, payload)).await
    }

    /// Reads the message at `offset` in `topic`. A success carries the
    /// offset to ask for next.
    pub async fn consume(
        &self,
        topic: impl Into<String>,
        offset: i32,
    ) -> Result<Response, ClientError> {
        let topic = topic.into();
        self.call(|id| Request::consume(id, topic, offset)).await
    }

    /// Sends a request built by the caller, with its own correlation id.
    pub async fn send_request(
        &self,
        request: &Request,
    ) -> Result<Response, ClientError> {
        let mut state = self.state.lock().await;
        let frame = self.prepare(&state, request)?;
        self.exchange(&mut state, request, frame).await
    }

    /// Whether an earlier failure or [`close`](Self::close) has made the
    /// connection unusable.
    pub async fn is_broken(&self) -> bool {
        if *self.closed.borrow() {
            return true;
        }
        self.state.lock().await.broken
    }

    /// Closes the connection. Later requests fail with
    /// [`ClientError::ConnectionBroken`], and so does an exchange that is
    /// still waiting for its reply.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.closed.send_replace(true);
        tracing::debug!(conn = %self.conn.id(), "closing client");
        self.conn.close().await?;
        Ok(())
    }

    /// Runs one exchange with the next correlation id. The id is only
    /// used up once the request has been accepted for sending.
    async fn call(
        &self,
        build: impl FnOnce(CorrelationId) -> Request,
    ) -> Result<Response, ClientError> {
        let mut state = self.state.lock().await;
        let request = build(state.next_correlation_id);
        let frame = self.prepare(&state, &request)?;
        state.next_correlation_id = state.next_correlation_id.next();
        self.exchange(&mut state, &request, frame).await
    }

    /// Checks the connection is usable and encodes `request`.
    ///
    /// A request rejected here never touches the wire, so the connection
    /// stays usable.
    fn prepare(
        &self,
        state: &ExchangeState,
        request: &Request,
    ) -> Result<Bytes, ClientError> {
        if state.broken || *self.closed.borrow() {
            return Err(ClientError::ConnectionBroken);
        }
        Ok(self.codec.encode_request(request)?)
    }

    async fn exchange(
        &self,
        state: &mut ExchangeState,
        request: &Request,
        frame: Bytes,
    ) -> Result<Response, ClientError> {
        let kind = request.kind();
        let correlation_id = request.correlation_id();
        tracing::debug!(
            conn = %self.conn.id(),
            %correlation_id,
            %kind,
            "sending request"
        );

        state.broken = true;
        let result = self.round_trip(kind, &frame).await;

        match result {
            Ok(response) => {
                state.broken = false;
                if response.correlation_id() != correlation_id {
                    tracing::warn!(
                        conn = %self.conn.id(),
                        expected = %correlation_id,
                        actual = %response.correlation_id(),
                        "reply carries a different correlation id"
                    );
                }
                tracing::debug!(
                    conn = %self.conn.id(),
                    %correlation_id,
                    success = response.is_success(),
                    "received reply"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(
                    conn = %self.conn.id(),
                    %correlation_id,
                    error = %e,
                    "exchange failed, connection marked broken"
                );
                Err(e)
            }
        }
    }

    async fn round_trip(
        &self,
        kind: RequestKind,
        frame: &[u8],
    ) -> Result<Response, ClientError> {
        let closed = self.closed.subscribe();
        let exchange = async {
            self.conn.send(frame).await?;
            let response = self.codec.decode_response(kind, &self.conn).await?;
            Ok::<_, ClientError>(response)
        };
        let exchange = async {
            tokio::select! {
                result = exchange => result,
                () = wait_closed(closed) => Err(ClientError::ConnectionBroken),
            }
        };

        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => exchange.await,
        }
    }
}

/// Resolves once `close` has been called on the owning client.
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}
