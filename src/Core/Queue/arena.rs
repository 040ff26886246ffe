use super::TaskQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Opaque handle to a queue created by one particular bridge.
///
/// `owner` identifies the issuing arena; `index` comes from that arena's
/// counter and is never reused, so a released token stays invalid.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct QueueToken {
    owner: u64,
    index: u64,
}

impl QueueToken {
    /// Single-integer form for crossing an FFI boundary: owner in the high
    /// 32 bits, index in the low 32. Never 0 for an issued token.
    pub fn raw(&self) -> u64 {
        (self.owner << INDEX_BITS) | (self.index & INDEX_MASK)
    }

    /// Rebuild a token from `raw()`. The owner travels with it, so a token
    /// from another bridge still fails that bridge's ownership check.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            owner: raw >> INDEX_BITS,
            index: raw & INDEX_MASK,
        }
    }

    pub fn owner(&self) -> u64 {
        self.owner
    }
}

impl fmt::Debug for QueueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueToken({}:{})", self.owner, self.index)
    }
}

/// Maps tokens to the queues they stand for.
pub struct QueueArena {
    owner: u64,
    next_index: AtomicU64,
    queues: Mutex<HashMap<u64, Arc<dyn TaskQueue>>>,
}

impl QueueArena {
    pub fn new(owner: u64) -> Self {
        Self {
            owner,
            next_index: AtomicU64::new(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Store `queue` and issue a fresh token for it.
    pub fn insert(&self, queue: Arc<dyn TaskQueue>) -> QueueToken {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        self.queues.lock().insert(index, queue);
        QueueToken {
            owner: self.owner,
            index,
        }
    }

    /// Look up the queue behind `token`, or `None` if this arena never issued
    /// it or it was released.
    pub fn resolve(&self, token: QueueToken) -> Option<Arc<dyn TaskQueue>> {
        if token.owner != self.owner {
            return None;
        }
        self.queues.lock().get(&token.index).cloned()
    }

    /// Drop the arena's reference. Returns false for foreign or unknown tokens.
    pub fn release(&self, token: QueueToken) -> bool {
        if token.owner != self.owner {
            return false;
        }
        self.queues.lock().remove(&token.index).is_some()
    }

    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
