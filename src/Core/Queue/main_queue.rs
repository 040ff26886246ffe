use super::{QueueKind, TaskQueue};
use crate::Core::fatal::{self, FatalSink};
use crate::Core::pool::{run_task, Task};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// The default queue: serial, and bound to the host's single main context.
///
/// Either the bridge spawns a dedicated main thread (`spawn`), or the host
/// keeps its own thread as the main context and drives the returned
/// `MainLoop` there (`attached`).
pub struct HostMainQueue {
    sender: Sender<Task>,
    bound_thread: Arc<Mutex<Option<ThreadId>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// The receiving end of a `HostMainQueue`, run on the main context.
pub struct MainLoop {
    receiver: Receiver<Task>,
    bound_thread: Arc<Mutex<Option<ThreadId>>>,
}

impl HostMainQueue {
    /// Spawn a dedicated thread named `name` serving as the main context.
    pub fn spawn(name: &str, fatal_sink: Option<FatalSink>) -> io::Result<Self> {
        let (queue, main_loop) = Self::attached();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                fatal::set_thread_sink(fatal_sink);
                main_loop.run();
            })
            .map_err(|e| io::Error::new(e.kind(), format!("Failed to spawn main thread: {e}")))?;
        *queue.bound_thread.lock() = Some(handle.thread().id());
        *queue.worker.lock() = Some(handle);
        Ok(queue)
    }

    /// Create a queue whose units run wherever the returned `MainLoop` is driven.
    pub fn attached() -> (Self, MainLoop) {
        let (sender, receiver) = unbounded();
        let bound_thread = Arc::new(Mutex::new(None));
        let queue = Self {
            sender,
            bound_thread: bound_thread.clone(),
            worker: Mutex::new(None),
        };
        (
            queue,
            MainLoop {
                receiver,
                bound_thread,
            },
        )
    }

    /// Returns true if the caller is running on the main context.
    pub fn is_current(&self) -> bool {
        *self.bound_thread.lock() == Some(thread::current().id())
    }

    /// The main context's thread, once known.
    pub fn thread_id(&self) -> Option<ThreadId> {
        *self.bound_thread.lock()
    }

    /// Units queued and not yet started.
    pub fn pending_len(&self) -> usize {
        self.sender.len()
    }
}

impl TaskQueue for HostMainQueue {
    fn submit(&self, task: Task) {
        if self.sender.send(task).is_err() {
            tracing::warn!("main loop has stopped, task dropped");
        }
    }

    fn kind(&self) -> QueueKind {
        QueueKind::HostMain
    }
}

impl Drop for HostMainQueue {
    fn drop(&mut self) {
        // The sender drops after this body, which ends the loop. Joining here
        // would wait on a loop that is still open, so the thread is detached.
        drop(self.worker.lock().take());
    }
}

impl MainLoop {
    fn bind_current(&self) {
        *self.bound_thread.lock() = Some(thread::current().id());
    }

    /// Run units until the owning `HostMainQueue` is dropped.
    pub fn run(self) {
        self.bind_current();
        while let Ok(task) = self.receiver.recv() {
            run_task(task);
        }
        tracing::debug!("main loop finished");
    }

    /// Run every unit already queued, without waiting. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        self.bind_current();
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(task) => {
                    run_task(task);
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Run units as they arrive until `timeout` elapses. Returns how many ran.
    pub fn run_for(&self, timeout: Duration) -> usize {
        self.bind_current();
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(task) => {
                    run_task(task);
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return ran
                }
            }
        }
    }
}
