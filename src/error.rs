//! Error types for iproto-client.

use thiserror::Error;

/// Main error type for all iproto operations.
#[derive(Debug, Error)]
pub enum IprotoError {
    /// I/O error while connecting or on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer than 12 bytes were available when decoding a header.
    #[error("malformed header: got {0} bytes, need 12")]
    MalformedHeader(usize),

    /// A body length that the wire format cannot honor.
    ///
    /// Inbound: the header declared a negative or oversized length, framing
    /// sync is lost and the connection closes. Outbound: the caller supplied
    /// a body too large to represent in the header; the request is rejected
    /// before anything reaches the wire.
    #[error("invalid body length {length} (max {max})")]
    InvalidBodyLength {
        /// Length as decoded from the header, or the caller's body size.
        length: i64,
        /// Maximum length acceptable in this direction.
        max: u32,
    },

    /// Connection closed; delivered to every pending and future caller.
    #[error("connection closed")]
    ConnectionClosed,

    /// A live table entry already exists for this request id.
    ///
    /// Indicates an allocator or table bug; checked defensively because
    /// identifiers wrap around.
    #[error("duplicate request id: {0}")]
    DuplicateRequestId(i32),

    /// A caller-supplied deadline expired before the response arrived.
    #[error("request timed out")]
    Timeout,
}

/// Result type alias using IprotoError.
pub type Result<T> = std::result::Result<T, IprotoError>;
