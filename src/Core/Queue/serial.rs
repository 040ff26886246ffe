use super::{QueueKind, TaskQueue};
use crate::Core::pool::{run_task, Task, WorkerPool};
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs units strictly one at a time, in submission order, on pool threads.
///
/// ### Concurrency Design:
/// - **Submit**: appends to the FIFO under a short lock, then asks the pool to
///   run a drain. The submitter never waits for earlier units.
/// - **Drain**: whichever drain wins the `draining` flag (compare-and-set) pops
///   and runs units until the FIFO is empty, then releases the flag. A drain
///   that loses the flag returns at once; the winner will see its unit.
/// - After releasing the flag the winner re-checks the FIFO, so a unit pushed
///   between "FIFO empty" and "flag released" is never stranded.
pub struct SerialQueue {
    inner: Arc<SerialInner>,
}

struct SerialInner {
    pool: Arc<WorkerPool>,
    pending: Mutex<VecDeque<Task>>,
    draining: CachePadded<AtomicBool>,
}

impl SerialQueue {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            inner: Arc::new(SerialInner {
                pool,
                pending: Mutex::new(VecDeque::new()),
                draining: CachePadded::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Units submitted but not yet started.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl TaskQueue for SerialQueue {
    fn submit(&self, task: Task) {
        self.inner.pending.lock().push_back(task);
        SerialInner::schedule_drain(&self.inner);
    }

    fn kind(&self) -> QueueKind {
        QueueKind::Serial
    }
}

impl SerialInner {
    fn schedule_drain(this: &Arc<Self>) {
        let inner = this.clone();
        this.pool.execute(Box::new(move || inner.drain()));
    }

    fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Another thread owns the drain.
                return;
            }

            loop {
                // Pop under the lock, run outside it.
                let next = self.pending.lock().pop_front();
                match next {
                    Some(task) => run_task(task),
                    None => break,
                }
            }

            self.draining.store(false, Ordering::Release);

            if self.pending.lock().is_empty() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn units_never_overlap_and_keep_order() {
        let pool = Arc::new(WorkerPool::new(4, "serial-unit", None).unwrap());
        let queue = SerialQueue::new(pool.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..200 {
            let active = active.clone();
            let overlapped = overlapped.clone();
            let order = order.clone();
            queue.submit(Box::new(move || {
                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                order.lock().push(i);
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        pool.shutdown();
        assert!(!overlapped.load(Ordering::SeqCst));
        let order = order.lock();
        assert_eq!(*order, (0..200).collect::<Vec<_>>());
        assert_eq!(queue.pending_len(), 0);
    }
}
