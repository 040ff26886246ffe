// Plain data carried across the bridge boundary.

use crate::Bridge::transport::Transport;
use std::fmt;
use std::sync::Arc;

/// Correlates a request with its reply.
///
/// Ids are allocated per bridge starting at 1. `ReplyId::NONE` marks a message
/// whose sender does not expect a reply.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplyId(pub u64);

impl ReplyId {
    pub const NONE: ReplyId = ReplyId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ReplyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to the native resource backing an inbound message.
///
/// The transport issues it on delivery and expects it back exactly once through
/// `Transport::release_message_data`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageData(pub u64);

/// Exclusive owner of an inbound payload and its native resource.
///
/// The dispatch unit holds the lease while the handler runs. Dropping it
/// truncates the payload and releases the native resource, on every exit path.
pub struct MessageLease {
    payload: Option<Vec<u8>>,
    data: Option<MessageData>,
    transport: Arc<dyn Transport>,
}

impl MessageLease {
    pub fn new(
        payload: Option<Vec<u8>>,
        data: Option<MessageData>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            payload,
            data,
            transport,
        }
    }

    /// The payload, borrowed for as long as the lease is held.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Truncate the payload so nothing can read it after the handler returns.
    pub fn invalidate(&mut self) {
        if let Some(payload) = self.payload.as_mut() {
            payload.clear();
        }
    }
}

impl Drop for MessageLease {
    fn drop(&mut self) {
        self.invalidate();
        if let Some(data) = self.data.take() {
            self.transport.release_message_data(data);
        }
    }
}

impl fmt::Debug for MessageLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageLease")
            .field("payload_len", &self.payload.as_ref().map(Vec::len))
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// A message that arrived before its channel had a handler.
#[derive(Debug)]
pub struct BufferedMessage {
    pub reply_id: ReplyId,
    pub lease: MessageLease,
}
