//! Channel bindings and the startup buffer.
//!
//! One mutex guards the binding map, the per-channel buffers and the global
//! buffering switch, so "no handler, so buffer it" and "bind, then drain" can
//! never interleave. Under heavy channel churn this lock is the contention
//! point. It is never held while a handler runs: callers get back what to
//! dispatch, and drained messages are only *submitted* to their queue while it
//! is held (submitting never blocks), which keeps drained messages ahead of
//! anything arriving after the bind.

use super::buffer::MessageBuffer;
use super::handler::MessageHandler;
use super::Structs::Message_Structs::{BufferedMessage, MessageLease, ReplyId};
use crate::Core::TaskQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A channel's handler and the queue it runs on. `queue: None` means the host
/// main queue.
#[derive(Clone)]
pub struct HandlerInfo {
    pub handler: Arc<dyn MessageHandler>,
    pub queue: Option<Arc<dyn TaskQueue>>,
}

/// Where an inbound message goes.
pub enum Route {
    /// Held until a handler binds or buffering is turned off.
    Buffered,
    /// Dispatch now; `None` handler means answer with the empty reply.
    Dispatch(Option<HandlerInfo>, MessageLease),
}

#[derive(Default)]
struct RegistryState {
    handlers: HashMap<String, HandlerInfo>,
    buffer: MessageBuffer,
    buffering: bool,
}

/// Maps channel names to handlers and owns the startup buffer.
#[derive(Default)]
pub struct ChannelRegistry {
    state: Mutex<RegistryState>,
}

impl ChannelRegistry {
    pub fn new(buffering: bool) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                buffering,
                ..RegistryState::default()
            }),
        }
    }

    /// Decide whether an inbound message is buffered or dispatched.
    pub fn route(&self, channel: &str, reply_id: ReplyId, lease: MessageLease) -> Route {
        let mut state = self.state.lock();
        let info = state.handlers.get(channel).cloned();
        if info.is_none() && state.buffering {
            state
                .buffer
                .push(channel, BufferedMessage { reply_id, lease });
            tracing::debug!(
                channel,
                %reply_id,
                buffered = state.buffer.channel_len(channel),
                "message buffered until a handler binds"
            );
            return Route::Buffered;
        }
        Route::Dispatch(info, lease)
    }

    /// Replace the binding for `channel`; `None` unbinds it.
    ///
    /// Binding a handler drains the channel's buffer through `dispatch`, in
    /// arrival order, before the lock is released. Other channels' buffers are
    /// untouched.
    pub fn bind<F>(&self, channel: &str, info: Option<HandlerInfo>, mut dispatch: F)
    where
        F: FnMut(&HandlerInfo, BufferedMessage),
    {
        let mut state = self.state.lock();
        match info {
            Some(info) => {
                state.handlers.insert(channel.to_string(), info.clone());
                let drained = state.buffer.take(channel);
                if !drained.is_empty() {
                    tracing::debug!(channel, count = drained.len(), "draining buffered messages");
                }
                for message in drained {
                    dispatch(&info, message);
                }
            }
            None => {
                state.handlers.remove(channel);
            }
        }
    }

    pub fn enable_buffering(&self) {
        self.state.lock().buffering = true;
    }

    /// Turn buffering off and flush every buffered message through `dispatch`,
    /// paired with whatever handler its channel has now.
    pub fn disable_buffering<F>(&self, mut dispatch: F)
    where
        F: FnMut(&str, Option<&HandlerInfo>, BufferedMessage),
    {
        let mut state = self.state.lock();
        state.buffering = false;
        let pending = state.buffer.take_all();
        for (channel, messages) in pending {
            tracing::debug!(channel = %channel, count = messages.len(), "flushing buffered messages");
            let info = state.handlers.get(&channel);
            for message in messages {
                dispatch(&channel, info, message);
            }
        }
    }

    pub fn is_buffering(&self) -> bool {
        self.state.lock().buffering
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.state.lock().handlers.contains_key(channel)
    }

    pub fn buffered_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn buffered_len_for(&self, channel: &str) -> usize {
        self.state.lock().buffer.channel_len(channel)
    }

    /// Names of channels with a bound handler.
    pub fn channels(&self) -> Vec<String> {
        self.state.lock().handlers.keys().cloned().collect()
    }
}
