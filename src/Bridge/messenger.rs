//! The bridge endpoint: outbound sends, channel wiring and inbound dispatch.
//!
//! # Inbound message lifecycle
//!
//! ```text
//! Received ─┬─> Buffered ──(handler binds / buffering off)──┐
//!           └─> Dispatching <───────────────────────────────┘
//!                  ├─> Handled ─────> reply sent by handler (now or later)
//!                  └─> Unhandled ───> empty reply sent
//!               ──> Released (payload truncated, native data freed)
//! ```
//!
//! Dispatching submits one unit to the channel's queue (the host main queue
//! unless the channel was bound with a queue token). The unit owns the
//! message's `MessageLease` for its whole duration.

use super::boundary::{call_guarded, Outcome};
use super::error::{BridgeError, HandlerError};
use super::handler::MessageHandler;
use super::registry::{ChannelRegistry, HandlerInfo, Route};
use super::reply::{ReplyCallback, ReplyHandle, ReplyRegistry};
use super::transport::Transport;
use super::Structs::Message_Structs::{BufferedMessage, MessageData, MessageLease, ReplyId};
use crate::Core::fatal::raise_fatal;
use crate::Core::{HostMainQueue, QueueArena, QueueOptions, QueueToken, TaskQueue, TaskQueueFactory};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_BRIDGE_ID: AtomicU64 = AtomicU64::new(1);

/// One side of the bridge.
///
/// All methods take `&self` and may be called from any thread. None of them
/// block on handler execution.
pub struct Messenger {
    pub(crate) id: u64,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) registry: ChannelRegistry,
    pub(crate) replies: ReplyRegistry,
    pub(crate) queues: QueueArena,
    pub(crate) factory: Box<dyn TaskQueueFactory>,
    pub(crate) main_queue: Arc<HostMainQueue>,
}

impl Messenger {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        main_queue: Arc<HostMainQueue>,
        factory: Box<dyn TaskQueueFactory>,
        buffering: bool,
    ) -> Self {
        let id = NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            transport,
            registry: ChannelRegistry::new(buffering),
            replies: ReplyRegistry::new(),
            queues: QueueArena::new(id),
            factory,
            main_queue,
        }
    }

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    /// Send `payload` on `channel` to the other side.
    ///
    /// With a callback, a fresh reply id is allocated and the callback fires
    /// once the answer comes back through `handle_reply`. Without one the
    /// message goes out with `ReplyId::NONE`. If the transport cannot deliver,
    /// the callback is dropped unrun and the error is returned.
    pub fn send(
        &self,
        channel: &str,
        payload: Option<&[u8]>,
        callback: Option<ReplyCallback>,
    ) -> Result<ReplyId, BridgeError> {
        check_channel(channel)?;
        let reply_id = match callback {
            Some(callback) => self.replies.register(callback),
            None => ReplyId::NONE,
        };

        let _span = tracing::debug_span!("messenger.send", channel, %reply_id).entered();
        tracing::debug!(len = ?payload.map(<[u8]>::len), "sending message");
        if let Err(error) = self.transport.dispatch_message(channel, payload, reply_id) {
            tracing::warn!(error = %error, "message not delivered");
            if !reply_id.is_none() {
                self.replies.cancel(reply_id);
            }
            return Err(error);
        }
        Ok(reply_id)
    }

    /// `send` with a closure callback.
    pub fn send_with_reply<F>(
        &self,
        channel: &str,
        payload: Option<&[u8]>,
        callback: F,
    ) -> Result<ReplyId, BridgeError>
    where
        F: FnOnce(Option<&[u8]>) -> Result<(), HandlerError> + Send + 'static,
    {
        self.send(channel, payload, Some(Box::new(callback)))
    }

    // -------------------------------------------------------------------------
    // Channel wiring
    // -------------------------------------------------------------------------

    /// Bind `handler` to `channel`, replacing any previous binding.
    ///
    /// `None` unbinds the channel. `queue` must come from this messenger's
    /// `create_queue`; without one the handler runs on the host main queue.
    /// Messages buffered for the channel are submitted, oldest first, before
    /// this returns.
    pub fn set_handler(
        &self,
        channel: &str,
        handler: Option<Arc<dyn MessageHandler>>,
        queue: Option<QueueToken>,
    ) -> Result<(), BridgeError> {
        check_channel(channel)?;
        let queue = match queue {
            Some(token) => Some(
                self.queues
                    .resolve(token)
                    .ok_or(BridgeError::UnrecognizedQueue(token))?,
            ),
            None => None,
        };

        let info = handler.map(|handler| HandlerInfo { handler, queue });
        tracing::debug!(channel, bound = info.is_some(), "setting message handler");
        self.registry.bind(channel, info, |info, message| {
            self.dispatch_to_queue(channel, Some(info.clone()), message.reply_id, message.lease);
        });
        Ok(())
    }

    /// Unbind `channel`.
    pub fn clear_handler(&self, channel: &str) -> Result<(), BridgeError> {
        self.set_handler(channel, None, None)
    }

    /// Create a background queue and return the token naming it.
    pub fn create_queue(&self, serial: bool) -> QueueToken {
        self.create_queue_with(QueueOptions { serial })
    }

    pub fn create_queue_with(&self, options: QueueOptions) -> QueueToken {
        let queue = self.factory.make_queue(options);
        let token = self.queues.insert(queue);
        tracing::debug!(?token, serial = options.serial, "created task queue");
        token
    }

    /// Forget `token`. Channels already bound to its queue keep using it.
    pub fn release_queue(&self, token: QueueToken) -> Result<(), BridgeError> {
        if self.queues.release(token) {
            Ok(())
        } else {
            Err(BridgeError::UnrecognizedQueue(token))
        }
    }

    /// Rebuild a token received as a raw integer (e.g. over FFI).
    pub fn queue_token_from_raw(&self, raw: u64) -> QueueToken {
        QueueToken::from_raw(raw)
    }

    /// Start holding messages for channels that have no handler yet.
    pub fn enable_buffering(&self) {
        tracing::debug!("buffering enabled");
        self.registry.enable_buffering();
    }

    /// Stop buffering and flush everything held: each message goes to its
    /// channel's handler if one is bound now, otherwise gets the empty reply.
    pub fn disable_buffering(&self) {
        tracing::debug!("buffering disabled");
        self.registry.disable_buffering(|channel, info, message: BufferedMessage| {
            self.dispatch_to_queue(channel, info.cloned(), message.reply_id, message.lease);
        });
    }

    // -------------------------------------------------------------------------
    // Inbound (called by the native delivery callback)
    // -------------------------------------------------------------------------

    /// Entry point for a message arriving from the other side.
    ///
    /// `data` is the native resource behind the message; it is released through
    /// the transport once the message is done with, however it ends.
    pub fn handle_message(
        &self,
        channel: &str,
        payload: Option<Vec<u8>>,
        reply_id: ReplyId,
        data: Option<MessageData>,
    ) {
        let _span = tracing::debug_span!("messenger.handle_message", channel, %reply_id).entered();
        let lease = MessageLease::new(payload, data, self.transport.clone());
        match self.registry.route(channel, reply_id, lease) {
            Route::Buffered => {}
            Route::Dispatch(info, lease) => self.dispatch_to_queue(channel, info, reply_id, lease),
        }
    }

    /// Entry point for the answer to one of our own sends.
    pub fn handle_reply(&self, reply_id: ReplyId, payload: Option<&[u8]>) {
        tracing::debug!(%reply_id, len = ?payload.map(<[u8]>::len), "reply received");
        self.replies.resolve(reply_id, payload);
    }

    fn dispatch_to_queue(
        &self,
        channel: &str,
        info: Option<HandlerInfo>,
        reply_id: ReplyId,
        lease: MessageLease,
    ) {
        let queue: Arc<dyn TaskQueue> = match info.as_ref().and_then(|info| info.queue.clone()) {
            Some(queue) => queue,
            None => self.main_queue.clone(),
        };
        let handler = info.map(|info| info.handler);
        let reply = ReplyHandle::new(channel, reply_id, self.transport.clone());
        let channel = channel.to_string();

        queue.submit(Box::new(move || {
            run_dispatch(&channel, handler, reply, lease);
        }));
    }
}

/// Body of one dispatch unit. The lease drops at the end of this function on
/// every path, including unwinding out of the fatal sink.
fn run_dispatch(
    channel: &str,
    handler: Option<Arc<dyn MessageHandler>>,
    reply: ReplyHandle,
    mut lease: MessageLease,
) {
    let _span = tracing::trace_span!("dispatch", channel, reply_id = %reply.reply_id()).entered();

    let Some(handler) = handler else {
        tracing::debug!("no handler bound, sending empty reply");
        reply.reply_empty_if_pending();
        return;
    };

    let outcome = call_guarded("binary message handler", channel, || {
        handler.on_message(lease.payload(), reply.clone())
    });
    lease.invalidate();

    match outcome {
        Outcome::Completed => {}
        Outcome::Faulted => {
            reply.reply_empty_if_pending();
        }
        Outcome::Fatal(error) => {
            reply.reply_empty_if_pending();
            drop(lease);
            raise_fatal(error);
        }
    }
}

fn check_channel(channel: &str) -> Result<(), BridgeError> {
    if channel.is_empty() {
        return Err(BridgeError::EmptyChannel);
    }
    Ok(())
}
