//! # iproto-client
//!
//! Async client for the iproto length-prefixed binary protocol: concurrent
//! requests multiplexed over one persistent stream connection, matched to
//! their responses out of order by a per-request correlation identifier.
//!
//! ## Architecture
//!
//! - **Wire codec** ([`protocol`]): 12-byte little-endian header
//!   `(message_type, body_length, request_id)` plus an opaque body.
//! - **Identifier allocator**: monotonically increasing ids with
//!   wraparound inside the positive 31-bit range; 0 is never issued.
//! - **Pending-request table**: one single-use response slot per in-flight
//!   request, resolved by the inbound loop and removed on delivery.
//! - **Connection engine** ([`Connection`]): one inbound and one outbound
//!   task per connection; a transport failure on either drains every waiter
//!   instead of blocking callers forever.
//!
//! Request bodies are opaque byte sequences; callers bring their own payload
//! semantics.
//!
//! ## Example
//!
//! ```ignore
//! use iproto_client::Connection;
//!
//! #[tokio::main]
//! async fn main() -> iproto_client::Result<()> {
//!     let conn = Connection::connect("127.0.0.1:33013").await?;
//!
//!     // Concurrent requests share the connection; responses are matched
//!     // by correlation id regardless of arrival order.
//!     let (a, b) = tokio::join!(
//!         conn.request(1, &b"first"[..]),
//!         conn.request(2, &b"second"[..]),
//!     );
//!     println!("{} / {}", a?.body_len(), b?.body_len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;

mod connection;
mod pending;
mod request_id;
mod writer;

pub use connection::{Connection, ConnectionBuilder};
pub use error::{IprotoError, Result};
pub use protocol::{Header, Response};
