//! Response frames and the two-phase frame read.
//!
//! A frame is a 12-byte header followed by exactly `body_length` bytes of
//! opaque payload. [`read_frame`] performs the mandatory two-phase read:
//! exactly 12 header bytes, decode, then exactly `body_length` body bytes.
//! The transport never guarantees a whole frame in one read, so both phases
//! use `read_exact`.
//!
//! # Example
//!
//! ```
//! use iproto_client::protocol::{Header, Response};
//! use bytes::Bytes;
//!
//! let header = Header::new(1, 5, 42);
//! let response = Response::new(header, Bytes::from_static(b"hello"));
//!
//! assert_eq!(response.message_type(), 1);
//! assert_eq!(response.body(), b"hello");
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::wire_format::{Header, HEADER_SIZE, MAX_WIRE_BODY_LENGTH};
use crate::error::Result;

/// A complete frame received from the peer.
///
/// The body is opaque to this crate; callers bring their own payload
/// semantics.
#[derive(Debug, Clone)]
pub struct Response {
    /// Decoded header.
    pub header: Header,
    /// Body bytes (zero-copy via `bytes::Bytes`).
    pub body: Bytes,
}

impl Response {
    /// Create a new response from header and body.
    pub fn new(header: Header, body: Bytes) -> Self {
        Self { header, body }
    }

    /// Get the message type.
    #[inline]
    pub fn message_type(&self) -> i32 {
        self.header.message_type
    }

    /// Get the correlation identifier.
    #[inline]
    pub fn request_id(&self) -> i32 {
        self.header.request_id
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body length.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes the header (with `body_length` taken from `body`) and appends the
/// body into a contiguous buffer. Mainly useful for tests and server-side
/// fixtures; the client write path keeps header and body as separate slices.
///
/// # Panics
///
/// Panics if `body` is longer than the wire format can represent
/// ([`MAX_WIRE_BODY_LENGTH`] bytes). The client write path uses
/// [`checked_body_length`] and surfaces an error instead.
///
/// [`MAX_WIRE_BODY_LENGTH`]: super::MAX_WIRE_BODY_LENGTH
/// [`checked_body_length`]: super::checked_body_length
///
/// # Example
///
/// ```
/// use iproto_client::protocol::build_frame;
///
/// let bytes = build_frame(1, 42, b"hello");
/// assert_eq!(bytes.len(), 12 + 5);
/// ```
pub fn build_frame(message_type: i32, request_id: i32, body: &[u8]) -> Vec<u8> {
    assert!(
        body.len() <= MAX_WIRE_BODY_LENGTH,
        "body length {} exceeds wire maximum",
        body.len()
    );
    let header = Header::new(message_type, body.len() as i32, request_id);
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    buf
}

/// Read one complete frame from the transport.
///
/// Phase one reads exactly [`HEADER_SIZE`] bytes and decodes them; phase two
/// reads exactly `body_length` further bytes. The header is validated against
/// `max_body_length` between the phases, before any body allocation.
///
/// Any error leaves the reader mid-frame and therefore unusable: the caller
/// must treat it as fatal to the connection and must not attempt to parse a
/// next frame.
pub async fn read_frame<R>(reader: &mut R, max_body_length: u32) -> Result<Response>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;

    let header = Header::decode(&header_buf)?;
    header.validate(max_body_length)?;

    let body = if header.body_length == 0 {
        Bytes::new()
    } else {
        let mut body_buf = vec![0u8; header.body_length as usize];
        reader.read_exact(&mut body_buf).await?;
        Bytes::from(body_buf)
    };

    Ok(Response::new(header, body))
}
