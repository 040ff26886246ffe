// Execution strategies that dispatch units are submitted to.

mod arena;
mod concurrent;
mod main_queue;
mod serial;

pub use arena::{QueueArena, QueueToken};
pub use concurrent::ConcurrentQueue;
pub use main_queue::{HostMainQueue, MainLoop};
pub use serial::SerialQueue;

use super::pool::{Task, WorkerPool};
use std::sync::Arc;

/// How a queue orders the units submitted to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueKind {
    /// Units may run in parallel, in any order.
    Concurrent,
    /// Units run one at a time, in submission order, on pool threads.
    Serial,
    /// Units run one at a time, in submission order, on the host's main context.
    HostMain,
}

/// An ordered or unordered unit of execution.
///
/// `submit` is fire-and-forget and must never block on previously submitted
/// units. It must not run the unit inline either: the bridge submits drained
/// messages while holding its channel lock.
pub trait TaskQueue: Send + Sync {
    fn submit(&self, task: Task);

    fn kind(&self) -> QueueKind;
}

/// Options for queues created through a bridge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueOptions {
    pub serial: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self { serial: true }
    }
}

impl QueueOptions {
    pub fn serial() -> Self {
        Self { serial: true }
    }

    pub fn concurrent() -> Self {
        Self { serial: false }
    }
}

/// Strategy used by a bridge to build background queues.
pub trait TaskQueueFactory: Send + Sync {
    fn make_queue(&self, options: QueueOptions) -> Arc<dyn TaskQueue>;
}

/// Default factory: every queue runs on one shared worker pool.
pub struct PoolQueueFactory {
    pool: Arc<WorkerPool>,
}

impl PoolQueueFactory {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }
}

impl TaskQueueFactory for PoolQueueFactory {
    fn make_queue(&self, options: QueueOptions) -> Arc<dyn TaskQueue> {
        if options.serial {
            Arc::new(SerialQueue::new(self.pool.clone()))
        } else {
            Arc::new(ConcurrentQueue::new(self.pool.clone()))
        }
    }
}
