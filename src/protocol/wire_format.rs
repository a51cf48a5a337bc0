//! Wire format encoding and decoding.
//!
//! Implements the 12-byte header format:
//! ```text
//! ┌──────────────┬──────────────┬──────────────┐
//! │ Message Type │ Body Length  │ Request ID   │
//! │ 4 bytes      │ 4 bytes      │ 4 bytes      │
//! │ int32 LE     │ int32 LE     │ int32 LE     │
//! └──────────────┴──────────────┴──────────────┘
//! ```
//!
//! All fields are signed 32-bit integers, Little Endian. There is no magic
//! number and no checksum; framing relies entirely on the transport being a
//! reliable ordered byte stream.

use crate::error::{IprotoError, Result};

/// Header size in bytes (fixed, exactly 12).
pub const HEADER_SIZE: usize = 12;

/// Default maximum body size accepted from the peer (1 GiB).
pub const DEFAULT_MAX_BODY_LENGTH: u32 = 1_073_741_824;

/// Maximum body size representable in the wire header (`i32::MAX` bytes).
pub const MAX_WIRE_BODY_LENGTH: usize = i32::MAX as usize;

/// Convert a body size into the header's length field.
///
/// Fails with [`IprotoError::InvalidBodyLength`] when the size does not fit
/// the signed 32-bit field. Encoding such a body anyway would truncate the
/// length and desynchronize framing for the whole connection, so the write
/// path rejects it before anything reaches the wire.
pub fn checked_body_length(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| IprotoError::InvalidBodyLength {
        length: len as i64,
        max: i32::MAX as u32,
    })
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message type identifier (opaque to this crate).
    pub message_type: i32,
    /// Body length in bytes, immediately following the header.
    pub body_length: i32,
    /// Correlation identifier matching a response to its request.
    pub request_id: i32,
}

impl Header {
    /// Create a new header.
    pub fn new(message_type: i32, body_length: i32, request_id: i32) -> Self {
        Self {
            message_type,
            body_length,
            request_id,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use iproto_client::protocol::Header;
    ///
    /// let header = Header::new(17, 5, 42);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 12);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (12 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.message_type.to_le_bytes());
        buf[4..8].copy_from_slice(&self.body_length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.request_id.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Fails with [`IprotoError::MalformedHeader`] if fewer than 12 bytes
    /// are supplied. That is a transport-contract violation, not a protocol
    /// error: the caller reads exactly 12 bytes before decoding.
    ///
    /// # Example
    ///
    /// ```
    /// use iproto_client::protocol::Header;
    ///
    /// let bytes = [17, 0, 0, 0, 5, 0, 0, 0, 42, 0, 0, 0];
    /// let header = Header::decode(&bytes).unwrap();
    /// assert_eq!(header.message_type, 17);
    /// assert_eq!(header.body_length, 5);
    /// assert_eq!(header.request_id, 42);
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(IprotoError::MalformedHeader(buf.len()));
        }
        Ok(Self {
            message_type: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            body_length: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            request_id: i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    /// Validate the header before reading the body.
    ///
    /// Rejects negative body lengths and bodies larger than `max_body_length`.
    /// A failure here means framing sync with the peer is lost, so callers
    /// must treat it as fatal to the connection.
    pub fn validate(&self, max_body_length: u32) -> Result<()> {
        if self.body_length < 0 || self.body_length as u32 > max_body_length {
            return Err(IprotoError::InvalidBodyLength {
                length: i64::from(self.body_length),
                max: max_body_length,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(17, 100, 42);
        let encoded = original.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_little_endian_byte_order() {
        let header = Header::new(0x0102_0304, 0x0506_0708, 0x090A_0B0C);
        let bytes = header.encode();

        // Message type: 0x01020304 in LE
        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        // Body length: 0x05060708 in LE
        assert_eq!(&bytes[4..8], &[0x08, 0x07, 0x06, 0x05]);
        // Request ID: 0x090A0B0C in LE
        assert_eq!(&bytes[8..12], &[0x0C, 0x0B, 0x0A, 0x09]);
    }

    #[test]
    fn test_header_size_is_exactly_12() {
        assert_eq!(HEADER_SIZE, 12);
        let header = Header::new(1, 0, 1);
        assert_eq!(header.encode().len(), 12);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 11]; // One byte short
        let result = Header::decode(&buf);
        assert!(matches!(result, Err(IprotoError::MalformedHeader(11))));
    }

    #[test]
    fn test_decode_empty_buffer() {
        let result = Header::decode(&[]);
        assert!(matches!(result, Err(IprotoError::MalformedHeader(0))));
    }

    #[test]
    fn test_validate_negative_body_length() {
        let header = Header::new(1, -1, 1);
        let result = header.validate(DEFAULT_MAX_BODY_LENGTH);
        assert!(matches!(
            result,
            Err(IprotoError::InvalidBodyLength { length: -1, .. })
        ));
    }

    #[test]
    fn test_validate_body_too_large() {
        let header = Header::new(1, 1_000_000, 1);
        let result = header.validate(100);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_and_max_ok() {
        assert!(Header::new(1, 0, 1).validate(100).is_ok());
        assert!(Header::new(1, 100, 1).validate(100).is_ok());
    }

    #[test]
    fn test_checked_body_length_fits() {
        assert_eq!(checked_body_length(0).unwrap(), 0);
        assert_eq!(checked_body_length(5).unwrap(), 5);
        assert_eq!(checked_body_length(MAX_WIRE_BODY_LENGTH).unwrap(), i32::MAX);
    }

    #[test]
    fn test_checked_body_length_rejects_oversized() {
        // One past i32::MAX would truncate to a negative length field.
        let result = checked_body_length(MAX_WIRE_BODY_LENGTH + 1);
        assert!(matches!(
            result,
            Err(IprotoError::InvalidBodyLength {
                length: 2_147_483_648,
                ..
            })
        ));

        assert!(checked_body_length(usize::MAX).is_err());
    }

    #[test]
    fn test_encode_into() {
        let header = Header::new(3, 100, 42);
        let mut buf = [0u8; HEADER_SIZE];
        header.encode_into(&mut buf);

        let decoded = Header::decode(&buf).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_negative_fields_roundtrip() {
        let header = Header::new(-5, 0, -1);
        let decoded = Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded.message_type, -5);
        assert_eq!(decoded.request_id, -1);
    }
}
