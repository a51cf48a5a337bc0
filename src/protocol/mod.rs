//! Wire protocol: header format, response frames, frame reading.

mod frame;
mod wire_format;

pub use frame::{build_frame, read_frame, Response};
pub use wire_format::{
    checked_body_length, Header, DEFAULT_MAX_BODY_LENGTH, HEADER_SIZE, MAX_WIRE_BODY_LENGTH,
};
