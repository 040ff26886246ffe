use super::{QueueKind, TaskQueue};
use crate::Core::pool::{Task, WorkerPool};
use std::sync::Arc;

/// Hands every unit straight to the worker pool.
///
/// No relationship is enforced between units: they may overlap and complete
/// in any order.
pub struct ConcurrentQueue {
    pool: Arc<WorkerPool>,
}

impl ConcurrentQueue {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }
}

impl TaskQueue for ConcurrentQueue {
    fn submit(&self, task: Task) {
        self.pool.execute(task);
    }

    fn kind(&self) -> QueueKind {
        QueueKind::Concurrent
    }
}
