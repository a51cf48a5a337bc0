//! Connection engine: request multiplexing over one stream.
//!
//! A [`Connection`] owns the transport and runs two independent loops:
//! the outbound loop (see [`crate::writer`]) serializes writes from any
//! number of concurrent callers, and the inbound loop decodes frames and
//! resolves the matching entry in the pending-request table.
//!
//! Lifecycle is `Connecting → Open → Closed` (terminal). When either loop
//! observes a transport or framing error, the engine drains every
//! outstanding waiter with [`IprotoError::ConnectionClosed`] so that no
//! caller blocks forever, and all future requests fail the same way. Loop
//! failures never terminate the process, only this connection.
//!
//! # Example
//!
//! ```ignore
//! use iproto_client::Connection;
//!
//! #[tokio::main]
//! async fn main() -> iproto_client::Result<()> {
//!     let conn = Connection::connect("127.0.0.1:33013").await?;
//!     let response = conn.request(17, &b"ping"[..]).await?;
//!     println!("got {} body bytes", response.body_len());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::watch;

use crate::error::{IprotoError, Result};
use crate::pending::{PendingRequests, ResponseSlot};
use crate::protocol::{checked_body_length, read_frame, Header, Response, DEFAULT_MAX_BODY_LENGTH};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Builder for configuring and opening a [`Connection`].
///
/// ```ignore
/// let conn = Connection::builder()
///     .channel_capacity(256)
///     .max_body_length(16 * 1024 * 1024)
///     .connect("127.0.0.1:33013")
///     .await?;
/// ```
pub struct ConnectionBuilder {
    writer_config: WriterConfig,
    max_body_length: u32,
}

impl ConnectionBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            writer_config: WriterConfig::default(),
            max_body_length: DEFAULT_MAX_BODY_LENGTH,
        }
    }

    /// Set the outbound queue depth (default: 1024).
    ///
    /// Callers suspend inside `request` while the queue is full.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Set the maximum accepted inbound body length (default: 1 GiB).
    ///
    /// A frame declaring a larger body is treated as loss of framing and
    /// closes the connection.
    pub fn max_body_length(mut self, max: u32) -> Self {
        self.max_body_length = max;
        self
    }

    /// Resolve `addr`, establish a TCP transport and open the connection.
    ///
    /// Fails synchronously with [`IprotoError::Io`]; no retry at this layer.
    pub async fn connect(self, addr: impl ToSocketAddrs) -> Result<Connection> {
        let stream = TcpStream::connect(addr).await?;
        Ok(self.from_stream(stream))
    }

    /// Open the connection over an already-established transport.
    ///
    /// Accepts any reliable ordered byte stream; this is also the seam used
    /// by tests to drive the engine over an in-memory duplex pipe.
    pub fn from_stream<S>(self, stream: S) -> Connection
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, &self.writer_config);

        let pending = Arc::new(PendingRequests::new());
        let (closed_tx, closed_rx) = watch::channel(false);
        let max_body_length = self.max_body_length;

        let engine_pending = pending.clone();
        tokio::spawn(async move {
            // Whichever loop stops first takes the connection down with it;
            // the other is torn down when this task drops its half.
            tokio::select! {
                result = Connection::read_loop(reader, &engine_pending, max_body_length) => {
                    match result {
                        Ok(()) => tracing::debug!("connection closed by peer"),
                        Err(e) => tracing::error!(error = %e, "read loop failed"),
                    }
                }
                result = writer_task => {
                    match result {
                        Ok(Ok(())) => tracing::debug!("writer finished, connection dropped"),
                        Ok(Err(e)) => tracing::error!(error = %e, "write loop failed"),
                        Err(e) => tracing::error!(error = %e, "writer task panicked"),
                    }
                }
            }

            let drained = engine_pending.drain_all();
            if drained > 0 {
                tracing::debug!(drained, "drained outstanding requests");
            }
            let _ = closed_tx.send(true);
        });

        Connection {
            pending,
            writer,
            closed_rx,
        }
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A live multiplexed connection.
///
/// Cheap to share behind an `Arc`; every method takes `&self`, so any number
/// of tasks may issue requests concurrently.
pub struct Connection {
    /// Outstanding requests awaiting responses.
    pending: Arc<PendingRequests>,
    /// Handle feeding the outbound loop.
    writer: WriterHandle,
    /// Observes the transition to `Closed`.
    closed_rx: watch::Receiver<bool>,
}

impl Connection {
    /// Create a new connection builder.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Connect with default settings. See [`ConnectionBuilder::connect`].
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        ConnectionBuilder::new().connect(addr).await
    }

    /// Open over an existing transport with default settings.
    /// See [`ConnectionBuilder::from_stream`].
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        ConnectionBuilder::new().from_stream(stream)
    }

    /// Issue a request and await its response.
    ///
    /// Allocates a correlation identifier, registers a waiter, enqueues the
    /// frame and suspends until the inbound loop resolves the waiter. Fails
    /// with [`IprotoError::ConnectionClosed`] if the connection terminates
    /// while waiting.
    ///
    /// Requests are written to the transport in enqueue order, but responses
    /// are matched purely by correlation identifier and may resolve in any
    /// order.
    pub async fn request(&self, message_type: i32, body: impl Into<Bytes>) -> Result<Response> {
        let slot = self.send_request(message_type, body.into()).await?;
        slot.await.map_err(|_| IprotoError::ConnectionClosed)
    }

    /// Issue a request with a deadline.
    ///
    /// On expiry the waiter's table entry is removed before returning
    /// [`IprotoError::Timeout`], so a response arriving later is discarded
    /// as an orphan instead of populating a dead slot.
    pub async fn request_timeout(
        &self,
        message_type: i32,
        body: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Response> {
        let body = body.into();
        let (id, slot) = self.pending.register()?;
        if let Err(e) = self.enqueue(message_type, id, body).await {
            self.pending.remove(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, slot).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(IprotoError::ConnectionClosed),
            Err(_) => {
                self.pending.remove(id);
                Err(IprotoError::Timeout)
            }
        }
    }

    /// Register a waiter and enqueue the request frame.
    async fn send_request(&self, message_type: i32, body: Bytes) -> Result<ResponseSlot> {
        let (id, slot) = self.pending.register()?;
        if let Err(e) = self.enqueue(message_type, id, body).await {
            self.pending.remove(id);
            return Err(e);
        }
        Ok(slot)
    }

    async fn enqueue(&self, message_type: i32, id: i32, body: Bytes) -> Result<()> {
        // A body beyond the 31-bit length field would truncate on encode
        // and desynchronize framing; reject it before it reaches the wire.
        let body_length = checked_body_length(body.len())?;
        let header = Header::new(message_type, body_length, id);
        self.writer.send(OutboundFrame::new(&header, body)).await
    }

    /// Whether the connection has reached its terminal `Closed` state.
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// Number of requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Wait until the connection closes.
    pub async fn closed(&self) {
        let mut rx = self.closed_rx.clone();
        // An error means the engine task is already gone, which also
        // implies closed.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Inbound loop: two-phase frame reads, resolved against the table.
    ///
    /// Returns `Ok(())` on orderly peer shutdown and an error on transport
    /// or framing failure. Either way the caller drains the table.
    async fn read_loop<R>(
        mut reader: R,
        pending: &PendingRequests,
        max_body_length: u32,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let response = match read_frame(&mut reader, max_body_length).await {
                Ok(response) => response,
                Err(IprotoError::Io(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            let id = response.request_id();
            if pending.resolve(id, response) {
                tracing::trace!(request_id = id, "response delivered");
            } else {
                // Late response after a caller timeout, or a peer bug.
                // Discard; never fatal.
                tracing::warn!(request_id = id, "orphan response discarded");
            }
        }
    }
}
