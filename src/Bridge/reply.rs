//! Request/reply correlation.
//!
//! Outbound requests park their callback in the `ReplyRegistry` under a fresh
//! `ReplyId` until the other side answers. Inbound requests hand the handler a
//! `ReplyHandle`, a single-use capability for answering.
//!
//! A reply that never comes leaves its callback parked for the life of the
//! bridge. There is no timeout.

use super::boundary::{call_guarded, Outcome};
use super::error::{BridgeError, HandlerError};
use super::transport::Transport;
use super::Structs::Message_Structs::ReplyId;
use crate::Core::fatal::raise_fatal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Receives the answer to an outbound message; `None` is the empty reply.
pub type ReplyCallback = Box<dyn FnOnce(Option<&[u8]>) -> Result<(), HandlerError> + Send>;

/// Adapt a closure into a `ReplyCallback`.
pub fn reply_fn<F>(f: F) -> ReplyCallback
where
    F: FnOnce(Option<&[u8]>) -> Result<(), HandlerError> + Send + 'static,
{
    Box::new(f)
}

/// Outstanding outbound requests awaiting a reply.
pub struct ReplyRegistry {
    next_id: AtomicU64,
    pending: Mutex<HashMap<ReplyId, ReplyCallback>>,
}

impl Default for ReplyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next id and park `callback` under it.
    pub fn register(&self, callback: ReplyCallback) -> ReplyId {
        let id = ReplyId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().insert(id, callback);
        id
    }

    /// Remove the callback for `id` and invoke it with `payload`.
    ///
    /// Unknown, already resolved and `NONE` ids are ignored. Returns whether a
    /// callback ran. The callback runs outside the registry lock.
    pub fn resolve(&self, id: ReplyId, payload: Option<&[u8]>) -> bool {
        let callback = self.pending.lock().remove(&id);
        let Some(callback) = callback else {
            tracing::debug!(reply_id = %id, "reply without a pending callback ignored");
            return false;
        };

        match call_guarded("binary message reply callback", "", || callback(payload)) {
            Outcome::Completed | Outcome::Faulted => {}
            Outcome::Fatal(error) => raise_fatal(error),
        }
        true
    }

    /// Drop the callback for `id` without running it. Used when the request
    /// never left this side.
    pub fn cancel(&self, id: ReplyId) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// The id the next `register` will hand out.
    pub fn next_id(&self) -> ReplyId {
        ReplyId(self.next_id.load(Ordering::Relaxed))
    }
}

/// Single-use capability to answer one inbound message.
///
/// Clones share the "submitted" flag, so the handle answers at most once no
/// matter how many copies exist. Using it again is a handler defect and fails
/// with `BridgeError::ReplyAlreadySubmitted`.
#[derive(Clone)]
pub struct ReplyHandle {
    inner: Arc<ReplyState>,
}

struct ReplyState {
    reply_id: ReplyId,
    channel: String,
    transport: Arc<dyn Transport>,
    submitted: AtomicBool,
}

impl ReplyHandle {
    pub(crate) fn new(channel: &str, reply_id: ReplyId, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ReplyState {
                reply_id,
                channel: channel.to_string(),
                transport,
                submitted: AtomicBool::new(false),
            }),
        }
    }

    /// Send `payload` back to the caller. `None` sends the empty reply.
    pub fn reply(&self, payload: Option<&[u8]>) -> Result<(), BridgeError> {
        if self.inner.submitted.swap(true, Ordering::AcqRel) {
            tracing::error!(
                channel = %self.inner.channel,
                reply_id = %self.inner.reply_id,
                "reply already submitted"
            );
            return Err(BridgeError::ReplyAlreadySubmitted(self.inner.reply_id));
        }
        self.inner.transport.send_reply(self.inner.reply_id, payload);
        Ok(())
    }

    pub fn reply_empty(&self) -> Result<(), BridgeError> {
        self.reply(None)
    }

    /// Send the empty reply unless one was already sent. Returns whether it sent.
    pub(crate) fn reply_empty_if_pending(&self) -> bool {
        if self.inner.submitted.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.transport.send_reply(self.inner.reply_id, None);
        true
    }

    pub fn is_submitted(&self) -> bool {
        self.inner.submitted.load(Ordering::Acquire)
    }

    pub fn reply_id(&self) -> ReplyId {
        self.inner.reply_id
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }
}

impl fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("channel", &self.inner.channel)
            .field("reply_id", &self.inner.reply_id)
            .field("submitted", &self.is_submitted())
            .finish()
    }
}
