use super::messenger::Messenger;
use super::transport::Transport;
use super::Structs::Message_Structs::ReplyId;
use crate::Core::HostMainQueue;
use std::sync::Arc;

/// Diagnostic accessors for Messenger
///
/// These read state under the same locks the bridge uses, so each value is a
/// snapshot that may be stale as soon as it is returned.
impl Messenger {
    /// Number of sends with a callback whose reply has not arrived.
    ///
    /// Test harnesses use this for idle detection.
    pub fn pending_reply_count(&self) -> usize {
        self.replies.pending_count()
    }

    /// The id the next send with a callback will use.
    pub fn next_reply_id(&self) -> ReplyId {
        self.replies.next_id()
    }

    /// Messages held across all channels while buffering.
    pub fn buffered_message_count(&self) -> usize {
        self.registry.buffered_len()
    }

    /// Messages held for one channel.
    pub fn buffered_message_count_for(&self, channel: &str) -> usize {
        self.registry.buffered_len_for(channel)
    }

    pub fn is_buffering(&self) -> bool {
        self.registry.is_buffering()
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.registry.has_handler(channel)
    }

    /// Channels that currently have a handler, in no particular order.
    pub fn channels(&self) -> Vec<String> {
        self.registry.channels()
    }

    /// Process-unique id of this bridge; also the owner part of its queue tokens.
    pub fn bridge_id(&self) -> u64 {
        self.id
    }

    /// Queues created and not yet released.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// The default queue handlers run on.
    pub fn main_queue(&self) -> &Arc<HostMainQueue> {
        &self.main_queue
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
