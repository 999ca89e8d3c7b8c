//! Stream transport implementation over tokio byte streams.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A [`Connection`] over any tokio stream.
///
/// The stream is split so a blocked read never holds up a write. The read
/// half is buffered, which keeps small fixed-width field reads from turning
/// into one syscall each.
pub struct StreamConnection<S> {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    reader: Mutex<BufReader<ReadHalf<S>>>,
    writer: Mutex<WriteHalf<S>>,
    closed: AtomicBool,
}

impl<S> fmt::Debug for StreamConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// A [`StreamConnection`] over TCP.
pub type TcpConnection = StreamConnection<TcpStream>;

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wraps an already-established stream.
    pub fn new(stream: S) -> Self {
        Self::with_peer(stream, None)
    }

    fn with_peer(stream: S, peer_addr: Option<SocketAddr>) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            peer_addr,
            reader: Mutex::new(BufReader::new(read)),
            writer: Mutex::new(write),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the remote address, if the stream has one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl StreamConnection<TcpStream> {
    /// Opens a TCP connection to `addr` with `TCP_NODELAY` set.
    ///
    /// Request frames are small and the protocol is strictly
    /// request/response, so Nagle's algorithm would only add latency.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let connect_failed = |source| TransportError::ConnectFailed {
            addr: addr.to_string(),
            source,
        };
        let stream = TcpStream::connect(addr).await.map_err(connect_failed)?;
        stream.set_nodelay(true).map_err(connect_failed)?;

        let peer = stream.peer_addr().ok();
        let conn = Self::with_peer(stream, peer);
        tracing::debug!(id = %conn.id, addr, "opened TCP connection");
        Ok(conn)
    }
}

impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv_exact(&self, n: usize) -> Result<Bytes, TransportError> {
        self.ensure_open()?;
        if n == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = BytesMut::zeroed(n);
        let mut reader = self.reader.lock().await;
        match reader.read_exact(&mut buf).await {
            Ok(_) => Ok(buf.freeze()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(TransportError::ConnectionClosed(format!(
                    "peer closed the stream while {n} bytes were expected"
                )))
            }
            Err(e) => Err(TransportError::ReceiveFailed(e)),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(id = %self.id, "closing connection");
        match self.writer.lock().await.shutdown().await {
            Ok(()) => Ok(()),
            // The peer beat us to it.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e)),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    ///
    /// Bind to port 0 to let the OS pick a free port, then read it back
    /// with [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        stream
            .set_nodelay(true)
            .map_err(TransportError::AcceptFailed)?;

        let conn = StreamConnection::with_peer(stream, Some(addr));
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }
}
