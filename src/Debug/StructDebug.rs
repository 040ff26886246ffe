use std::fmt;
use crate::Bridge::Messenger;
use crate::Core::{HostMainQueue, SerialQueue, WorkerPool};

/// Debug function for Messenger
///
/// Shows counters only; handlers, callbacks and the transport are opaque.
pub fn debug_messenger(messenger: &Messenger, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Messenger")
        .field("bridge_id", &messenger.bridge_id())
        .field("channels", &messenger.channels().len())
        .field("buffering", &messenger.is_buffering())
        .field("buffered", &messenger.buffered_message_count())
        .field("pending_replies", &messenger.pending_reply_count())
        .field("queues", &messenger.queue_count())
        .field("transport", &"<opaque>")
        .finish()
}

/// Debug function for WorkerPool
pub fn debug_worker_pool(pool: &WorkerPool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerPool")
        .field("size", &pool.size())
        .finish_non_exhaustive()
}

/// Debug function for SerialQueue
///
/// Shows how many units are waiting to start.
pub fn debug_serial_queue(queue: &SerialQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SerialQueue")
        .field("pending", &queue.pending_len())
        .finish_non_exhaustive()
}

/// Debug function for HostMainQueue
pub fn debug_host_main_queue(queue: &HostMainQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HostMainQueue")
        .field("thread", &queue.thread_id())
        .field("pending", &queue.pending_len())
        .finish()
}
