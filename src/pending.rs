//! Pending-request table: correlation ids mapped to response slots.
//!
//! Every in-flight request owns one single-use slot (a `oneshot` channel)
//! keyed by its correlation identifier. The issuing caller awaits the
//! receiver half; the read loop resolves the sender half when the matching
//! frame arrives.
//!
//! The table owns the [`RequestIdAllocator`] inside its lock, so allocation
//! and slot insertion happen in one critical section: the waiter always
//! exists before the request frame can reach the wire, and a response can
//! never beat its waiter.
//!
//! The lock is a `std::sync::Mutex` and is never held across an await point.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::{IprotoError, Result};
use crate::protocol::Response;
use crate::request_id::RequestIdAllocator;

/// Receiver half of a response slot.
///
/// Resolved with the matched [`Response`], or dropped when the connection
/// closes (the caller observes that as [`IprotoError::ConnectionClosed`]).
pub type ResponseSlot = oneshot::Receiver<Response>;

struct Inner {
    allocator: RequestIdAllocator,
    waiters: HashMap<i32, oneshot::Sender<Response>>,
    closed: bool,
}

/// Table of outstanding requests awaiting their responses.
pub struct PendingRequests {
    inner: Mutex<Inner>,
}

impl PendingRequests {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                allocator: RequestIdAllocator::new(),
                waiters: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Allocate a correlation identifier and register a fresh response slot.
    ///
    /// Fails with [`IprotoError::ConnectionClosed`] once the table has been
    /// drained, and with [`IprotoError::DuplicateRequestId`] if a live entry
    /// already holds the allocated id. The duplicate check is defensive:
    /// identifiers wrap around, so an entry left outstanding for an entire
    /// wraparound cycle would collide here instead of corrupting correlation.
    pub fn register(&self) -> Result<(i32, ResponseSlot)> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(IprotoError::ConnectionClosed);
        }

        let id = inner.allocator.next();
        if inner.waiters.contains_key(&id) {
            debug_assert!(false, "request id {id} already registered");
            tracing::error!(request_id = id, "duplicate request id allocated");
            return Err(IprotoError::DuplicateRequestId(id));
        }

        let (tx, rx) = oneshot::channel();
        inner.waiters.insert(id, tx);
        Ok((id, rx))
    }

    /// Deliver a response to the waiter registered for its id.
    ///
    /// The entry is removed before delivery, so the identifier becomes
    /// immediately reusable. Returns `false` if no waiter is registered
    /// (an orphan response), in which case the response is discarded by
    /// the caller.
    pub fn resolve(&self, id: i32, response: Response) -> bool {
        let tx = self.lock().waiters.remove(&id);
        match tx {
            Some(tx) => {
                // The receiver may already be gone (caller timed out between
                // table removal attempts); the entry is gone either way.
                let _ = tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Drop a waiter without resolving it.
    ///
    /// Used when a caller abandons a request (timeout) or when its frame
    /// never reached the outbound queue. Returns `true` if an entry existed.
    pub fn remove(&self, id: i32) -> bool {
        self.lock().waiters.remove(&id).is_some()
    }

    /// Mark the table closed and drop every outstanding waiter.
    ///
    /// Dropping the senders wakes every blocked caller with
    /// [`IprotoError::ConnectionClosed`]; subsequent [`register`] calls fail
    /// the same way. Safe to call more than once (both connection loops do).
    ///
    /// Returns the number of waiters that were drained.
    ///
    /// [`register`]: PendingRequests::register
    pub fn drain_all(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;
        let drained = inner.waiters.len();
        inner.waiters.clear();
        drained
    }

    /// Whether the table has been closed by [`drain_all`].
    ///
    /// [`drain_all`]: PendingRequests::drain_all
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of requests currently outstanding.
    pub fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Whether no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Waiter senders do not panic while the lock is held, so the mutex
        // cannot be poisoned by this crate; recover rather than propagate.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
