//! Request/response correlation.
//!
//! Turns the transport's fire-and-forget `send` into an awaitable call:
//! every outbound request gets a fresh correlation ID and a pending entry;
//! the matching inbound response resolves it. Pending entries are removed
//! exactly once: by a matching response, a timeout, or a
//! disconnect/reset flush.
//!
//! Calls issued while the transport is not connected are queued up to a
//! bounded depth and re-sent on reconnect via [`Correlator::flush_queue`],
//! absorbing the common case of the UI issuing a request in the brief window
//! around a reconnect. Beyond the bound, calls fail immediately with
//! `NotConnected`.
//!
//! A response whose ID has no pending entry (already resolved, timed out,
//! or flushed) is silently discarded: network races can legitimately deliver
//! a late response after the caller gave up.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::identifiers::CallId;
use crate::protocol::{CoreCommand, Request, Response};
use crate::transport::Transport;

// ============================================================================
// Wire
// ============================================================================

/// The minimal transport surface the correlator depends on.
///
/// Implemented by [`Transport`]; tests substitute a capturing mock.
pub trait Wire: Send + Sync {
    /// Returns `true` if frames can be written right now.
    fn is_connected(&self) -> bool;

    /// Writes one serialized frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the wire is not usable.
    fn send_frame(&self, payload: String) -> Result<()>;
}

impl Wire for Transport {
    fn is_connected(&self) -> bool {
        Transport::is_connected(self)
    }

    fn send_frame(&self, payload: String) -> Result<()> {
        self.send(payload)
    }
}

// ============================================================================
// Types
// ============================================================================

/// One in-flight call awaiting its response.
struct PendingCall {
    /// Resolves the caller with the call outcome.
    tx: oneshot::Sender<Result<Value>>,
    /// When the call was issued.
    issued_at: Instant,
}

/// One call serialized while disconnected, awaiting flush.
struct QueuedCall {
    /// The correlation ID already registered in `pending`.
    id: CallId,
    /// The serialized request frame.
    payload: String,
}

// ============================================================================
// Correlator
// ============================================================================

/// Tracks outstanding correlated calls for one logical connection.
pub struct Correlator {
    /// In-flight calls by correlation ID.
    pending: Mutex<FxHashMap<CallId, PendingCall>>,

    /// Calls issued while disconnected, in issue order.
    queue: Mutex<VecDeque<QueuedCall>>,

    /// Per-call response timeout.
    call_timeout: Duration,

    /// Maximum queued calls while disconnected.
    queue_depth: usize,
}

impl Correlator {
    /// Creates a correlator from connection tuning.
    #[must_use]
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            pending: Mutex::new(FxHashMap::default()),
            queue: Mutex::new(VecDeque::new()),
            call_timeout: config.call_timeout,
            queue_depth: config.queue_depth,
        }
    }

    /// Returns the number of in-flight calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the number of calls waiting for a reconnect flush.
    #[inline]
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Issues a correlated call and awaits its response.
    ///
    /// If the wire is not connected the serialized request is queued for
    /// [`Correlator::flush_queue`] and the call keeps waiting; the response
    /// timeout covers the queued time.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if disconnected and the queue is full
    /// - [`Error::Cancelled`] if the connection dropped or the correlator
    ///   was reset before a response arrived
    /// - [`Error::Remote`] if the device returned an error payload
    /// - [`Error::RequestTimeout`] if no response arrived in time
    pub async fn call(&self, wire: &dyn Wire, command: CoreCommand) -> Result<Value> {
        self.call_with_timeout(wire, command, self.call_timeout).await
    }

    /// [`Correlator::call`] with an explicit response timeout.
    ///
    /// # Errors
    ///
    /// Same as [`Correlator::call`].
    pub async fn call_with_timeout(
        &self,
        wire: &dyn Wire,
        command: CoreCommand,
        call_timeout: Duration,
    ) -> Result<Value> {
        let request = Request::new(command);
        let id = request.id;
        let payload = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            id,
            PendingCall {
                tx,
                issued_at: Instant::now(),
            },
        );

        if wire.is_connected() {
            if let Err(e) = wire.send_frame(payload) {
                self.pending.lock().remove(&id);
                return Err(e);
            }
            trace!(call_id = %id, "call sent");
        } else {
            let overflow = {
                let mut queue = self.queue.lock();
                if queue.len() >= self.queue_depth {
                    true
                } else {
                    queue.push_back(QueuedCall { id, payload });
                    false
                }
            };
            if overflow {
                self.pending.lock().remove(&id);
                return Err(Error::NotConnected);
            }
            debug!(call_id = %id, "call queued while disconnected");
        }

        match timeout(call_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without a verdict; treated as cancellation.
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_) => {
                self.pending.lock().remove(&id);
                self.queue.lock().retain(|queued| queued.id != id);
                Err(Error::request_timeout(id, call_timeout.as_millis() as u64))
            }
        }
    }

    /// Resolves a pending call from an inbound response frame.
    ///
    /// Returns `false` (and discards the frame) if no entry matches the
    /// response's ID.
    pub fn resolve(&self, response: Response) -> bool {
        let id = response.id;
        let entry = self.pending.lock().remove(&id);

        match entry {
            Some(pending) => {
                trace!(
                    call_id = %id,
                    elapsed_ms = pending.issued_at.elapsed().as_millis() as u64,
                    "call resolved"
                );
                let _ = pending.tx.send(response.into_result());
                true
            }
            None => {
                debug!(call_id = %id, "response for unknown call discarded");
                false
            }
        }
    }

    /// Rejects every pending and queued call with `Cancelled`.
    ///
    /// Invoked on disconnect and on explicit reset. The ID counter is not
    /// rewound, so stale device-side work replying late cannot collide with
    /// a new call. Returns the number of calls rejected.
    pub fn reject_all(&self) -> usize {
        let drained: Vec<(CallId, PendingCall)> = self.pending.lock().drain().collect();
        self.queue.lock().clear();

        let count = drained.len();
        for (_, pending) in drained {
            let _ = pending.tx.send(Err(Error::Cancelled));
        }
        if count > 0 {
            debug!(count, "pending calls cancelled");
        }
        count
    }

    /// Re-sends every call queued while disconnected, preserving the
    /// original correlation IDs.
    ///
    /// Invoked after a reconnect. A call whose re-send fails is rejected
    /// individually; the rest still flush. Returns the number of calls
    /// flushed.
    pub fn flush_queue(&self, wire: &dyn Wire) -> usize {
        let drained: Vec<QueuedCall> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };

        let count = drained.len();
        for queued in drained {
            if let Err(e) = wire.send_frame(queued.payload) {
                if let Some(pending) = self.pending.lock().remove(&queued.id) {
                    let _ = pending.tx.send(Err(e));
                }
            }
        }
        if count > 0 {
            debug!(count, "offline queue flushed");
        }
        count
    }
}

// ============================================================================
// Tests
// ============================================================================
