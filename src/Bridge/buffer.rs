use super::Structs::Message_Structs::BufferedMessage;
use std::collections::{HashMap, VecDeque};

/// Per-channel FIFO of messages that arrived before a handler existed.
///
/// Not synchronized on its own; the channel registry owns it under its lock.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    channels: HashMap<String, VecDeque<BufferedMessage>>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` behind everything already held for `channel`.
    pub fn push(&mut self, channel: &str, message: BufferedMessage) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push_back(message);
    }

    /// Remove and return everything held for `channel`, oldest first.
    pub fn take(&mut self, channel: &str) -> VecDeque<BufferedMessage> {
        self.channels.remove(channel).unwrap_or_default()
    }

    /// Remove everything, grouped by channel.
    pub fn take_all(&mut self) -> HashMap<String, VecDeque<BufferedMessage>> {
        std::mem::take(&mut self.channels)
    }

    pub fn channel_len(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, VecDeque::len)
    }

    /// Total messages held across all channels.
    pub fn len(&self) -> usize {
        self.channels.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
