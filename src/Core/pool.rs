use crate::Core::fatal::{self, FatalSink};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

/// A unit of work submitted to a task queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of named worker threads pulling tasks from one shared channel.
///
/// Every pool-backed queue of a bridge shares the same pool. Submitting never
/// blocks: the channel is unbounded and the workers drain it.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
}

impl WorkerPool {
    /// Spawn `size` workers named `<name>-worker-<i>`.
    ///
    /// Each worker installs `fatal_sink` as its thread sink before taking work.
    pub fn new(size: usize, name: &str, fatal_sink: Option<FatalSink>) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WorkerPool::new(): pool needs at least one worker",
            ));
        }

        let (sender, receiver) = unbounded::<Task>();
        let mut workers = Vec::with_capacity(size);
        let mut worker_ids = Vec::with_capacity(size);

        for i in 0..size {
            let receiver: Receiver<Task> = receiver.clone();
            let sink = fatal_sink.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-worker-{i}"))
                .spawn(move || {
                    fatal::set_thread_sink(sink);
                    while let Ok(task) = receiver.recv() {
                        run_task(task);
                    }
                })
                .map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("Failed to spawn worker {i} of {size}: {e}"),
                    )
                })?;
            worker_ids.push(handle.thread().id());
            workers.push(handle);
        }

        tracing::debug!(size, name, "worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_ids,
        })
    }

    /// Hand `task` to the pool. Returns immediately.
    pub fn execute(&self, task: Task) {
        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => {
                if sender.send(task).is_err() {
                    tracing::warn!("worker pool channel closed, task dropped");
                }
            }
            None => tracing::warn!("worker pool shut down, task dropped"),
        }
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.worker_ids.len()
    }

    /// Returns true if the calling thread is one of this pool's workers.
    pub fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker_ids.contains(&current)
    }

    /// Stop accepting work and join the workers once queued tasks finish.
    ///
    /// When called from a worker thread the workers are detached instead of
    /// joined, since a worker cannot join itself.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        if self.is_worker_thread() {
            return;
        }
        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("worker thread exited with a panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run a task, keeping the calling thread alive if it panics.
///
/// Dispatch units catch handler panics themselves; this is the last line for
/// anything else submitted to a queue.
pub(crate) fn run_task(task: Task) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
        tracing::error!(panic = %panic_message(&*panic), "task panicked");
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn executes_every_task_and_joins_on_shutdown() {
        let pool = WorkerPool::new(3, "pool-test", None).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let count = count.clone();
            pool.execute(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1, "pool-panic", None).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        pool.execute(Box::new(|| panic!("boom")));
        let c = count.clone();
        pool.execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        pool.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(WorkerPool::new(0, "empty", None).is_err());
    }
}
