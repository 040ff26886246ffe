//! The native side of the bridge.
//!
//! A `Transport` is the outbound half of the boundary: how this side hands
//! messages and replies to the embedded runtime, and how it gives back the
//! native resources behind inbound messages. The inbound half is
//! `Messenger::handle_message` / `Messenger::handle_reply`, which the native
//! delivery callback calls from whatever thread it runs on.

use super::error::BridgeError;
use super::messenger::Messenger;
use super::Structs::Message_Structs::{MessageData, ReplyId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub trait Transport: Send + Sync {
    /// Deliver a message to the other side. `reply_id` is `ReplyId::NONE`
    /// when no reply is expected. An `Err` means the other side will never
    /// see the message.
    fn dispatch_message(
        &self,
        channel: &str,
        payload: Option<&[u8]>,
        reply_id: ReplyId,
    ) -> Result<(), BridgeError>;

    /// Answer a message the other side sent. `None` is the empty reply.
    fn send_reply(&self, reply_id: ReplyId, payload: Option<&[u8]>);

    /// Free the native resource behind an inbound message.
    fn release_message_data(&self, data: MessageData);
}

/// In-process transport delivering into a peer `Messenger`.
///
/// The peer may be the owning messenger itself (a loopback) or the other half
/// of a pair built with `BridgeBuilder::build_pair`. Each delivered message
/// gets a fresh `MessageData`; the transport tracks which are still held.
/// The receiving messenger releases through its own transport, so the two
/// halves of a pair share one ledger.
pub struct LoopbackTransport {
    peer: RwLock<Weak<Messenger>>,
    ledger: Arc<DataLedger>,
}

struct DataLedger {
    next_data: AtomicU64,
    outstanding: Mutex<HashSet<u64>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            peer: RwLock::new(Weak::new()),
            ledger: Arc::new(DataLedger {
                next_data: AtomicU64::new(1),
                outstanding: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// A transport for the opposite direction of `other`, tracking message
    /// data in the same ledger.
    pub fn reverse_of(other: &LoopbackTransport) -> Self {
        Self {
            peer: RwLock::new(Weak::new()),
            ledger: other.ledger.clone(),
        }
    }

    /// Point the transport at `peer`.
    pub fn connect(&self, peer: Weak<Messenger>) {
        *self.peer.write() = peer;
    }

    /// Native resources handed out and not yet released.
    pub fn outstanding_message_data(&self) -> usize {
        self.ledger.outstanding.lock().len()
    }

    fn peer(&self) -> Option<Arc<Messenger>> {
        self.peer.read().upgrade()
    }
}

impl Transport for LoopbackTransport {
    fn dispatch_message(
        &self,
        channel: &str,
        payload: Option<&[u8]>,
        reply_id: ReplyId,
    ) -> Result<(), BridgeError> {
        let Some(peer) = self.peer() else {
            return Err(BridgeError::Undeliverable {
                channel: channel.to_string(),
                reason: "loopback peer is gone".to_string(),
            });
        };
        let data = MessageData(self.ledger.next_data.fetch_add(1, Ordering::Relaxed));
        self.ledger.outstanding.lock().insert(data.0);
        peer.handle_message(channel, payload.map(<[u8]>::to_vec), reply_id, Some(data));
        Ok(())
    }

    fn send_reply(&self, reply_id: ReplyId, payload: Option<&[u8]>) {
        match self.peer() {
            Some(peer) => peer.handle_reply(reply_id, payload),
            None => tracing::warn!(%reply_id, "loopback peer is gone, reply dropped"),
        }
    }

    fn release_message_data(&self, data: MessageData) {
        if !self.ledger.outstanding.lock().remove(&data.0) {
            tracing::warn!(data = data.0, "release of unknown or already released message data");
        }
    }
}
