//! Dedicated writer task: the single outbound loop per connection.
//!
//! Any number of concurrent callers enqueue encoded frames onto an mpsc
//! channel; one task dequeues them in FIFO order and writes each frame fully
//! to the transport before taking the next. The transport guarantees ordered
//! bytes but not atomic multi-writer writes, so this serialization is what
//! keeps two concurrent requests' bytes from interleaving.
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Stream
//! Caller N ─┘
//! ```

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{IprotoError, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Default writer channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A frame ready to be written to the transport.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header (12 bytes).
    pub header: [u8; HEADER_SIZE],
    /// Body bytes (may be empty).
    pub body: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, body: Bytes) -> Self {
        Self {
            header: header.encode(),
            body,
        }
    }

    /// Total size of this frame (header + body).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue. Callers suspend on `send`
    /// when the queue is full, which is the outbound backpressure point.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for enqueuing frames to the writer task.
///
/// Cheaply cloneable; shared by every concurrent caller.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Enqueue a frame for the writer task.
    ///
    /// Suspends while the queue is full. Fails with
    /// [`IprotoError::ConnectionClosed`] once the writer task has exited.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| IprotoError::ConnectionClosed)
    }
}

/// Spawn the writer task and return a handle for enqueuing frames.
///
/// The task exits cleanly when every handle is dropped, or with an error on
/// the first failed write. The connection supervises the returned
/// `JoinHandle` and drains the pending table when the task ends.
pub fn spawn_writer_task<W>(
    writer: W,
    config: &WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - dequeues frames and writes each one fully.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        writer.write_all(&frame.header).await?;
        if !frame.body.is_empty() {
            writer.write_all(&frame.body).await?;
        }
        writer.flush().await?;
        tracing::trace!(size = frame.size(), "frame written");
    }
    // Channel closed, clean shutdown.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_outbound_frame_size() {
        let header = Header::new(1, 5, 42);
        let frame = OutboundFrame::new(&header, Bytes::from_static(b"hello"));

        assert_eq!(frame.header.len(), HEADER_SIZE);
        assert_eq!(frame.size(), HEADER_SIZE + 5);
    }

    #[test]
    fn test_writer_config_default() {
        let config = WriterConfig::default();
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn test_writer_writes_header_then_body() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, &WriterConfig::default());

        let header = Header::new(1, 5, 42);
        let frame = OutboundFrame::new(&header, Bytes::from_static(b"hello"));
        handle.send(frame).await.unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + 5];
        server.read_exact(&mut buf).await.unwrap();

        let decoded = Header::decode(&buf[..HEADER_SIZE]).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(&buf[HEADER_SIZE..], b"hello");
    }

    #[tokio::test]
    async fn test_writer_preserves_fifo_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, &WriterConfig::default());

        for id in 1..=10i32 {
            let header = Header::new(1, 4, id);
            let frame = OutboundFrame::new(&header, Bytes::copy_from_slice(&id.to_le_bytes()));
            handle.send(frame).await.unwrap();
        }

        for expected in 1..=10i32 {
            let mut buf = vec![0u8; HEADER_SIZE + 4];
            server.read_exact(&mut buf).await.unwrap();
            let header = Header::decode(&buf[..HEADER_SIZE]).unwrap();
            assert_eq!(header.request_id, expected);
        }
    }

    #[tokio::test]
    async fn test_writer_empty_body_frame() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, &WriterConfig::default());

        let header = Header::new(1, 0, 7);
        handle.send(OutboundFrame::new(&header, Bytes::new())).await.unwrap();

        let mut buf = [0u8; HEADER_SIZE];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(Header::decode(&buf).unwrap(), header);
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_handle_drop() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, &WriterConfig::default());

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_writer_fails_when_peer_gone() {
        let (client, server) = duplex(64);
        let (handle, task) = spawn_writer_task(client, &WriterConfig::default());

        drop(server);

        // Writes eventually fail once the peer half is gone; the duplex
        // buffer may absorb the first few frames.
        let mut failed = false;
        for id in 0..64i32 {
            let header = Header::new(1, 8, id);
            let frame = OutboundFrame::new(&header, Bytes::from_static(b"01234567"));
            if handle.send(frame).await.is_err() {
                failed = true;
                break;
            }
            if task.is_finished() {
                failed = true;
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(failed);
    }
}
