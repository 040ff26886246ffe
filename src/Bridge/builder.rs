use super::messenger::Messenger;
use super::transport::{LoopbackTransport, Transport};
use crate::Core::fatal::FatalSink;
use crate::Core::{HostMainQueue, MainLoop, PoolQueueFactory, TaskQueueFactory, WorkerPool};
use lazy_static::lazy_static;
use std::io;
use std::sync::Arc;

lazy_static! {
    /// Pool size used when none is configured.
    static ref DEFAULT_WORKER_THREADS: usize = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
}

/// Configuration for a `Messenger`.
pub struct BridgeBuilder {
    worker_threads: usize,
    thread_name: String,
    buffering: bool,
    fatal_sink: Option<FatalSink>,
    queue_factory: Option<Box<dyn TaskQueueFactory>>,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            worker_threads: *DEFAULT_WORKER_THREADS,
            thread_name: "dmxp-bridge".to_string(),
            buffering: false,
            fatal_sink: None,
            queue_factory: None,
        }
    }
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the shared pool behind background queues. At least 1.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Prefix for bridge thread names.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Whether messages for unbound channels are held from the start.
    pub fn with_buffering(mut self, enabled: bool) -> Self {
        self.buffering = enabled;
        self
    }

    /// Sink installed on every bridge-owned thread for fatal handler errors.
    pub fn with_fatal_sink(mut self, sink: FatalSink) -> Self {
        self.fatal_sink = Some(sink);
        self
    }

    /// Replace the default pool-backed queue factory.
    pub fn with_queue_factory(mut self, factory: Box<dyn TaskQueueFactory>) -> Self {
        self.queue_factory = Some(factory);
        self
    }

    /// Build a messenger with its own dedicated main thread.
    pub fn build(self, transport: Arc<dyn Transport>) -> io::Result<Messenger> {
        let main_queue = HostMainQueue::spawn(&format!("{}-main", self.thread_name), self.fatal_sink.clone())?;
        self.assemble(transport, main_queue)
    }

    /// Build a messenger whose main context is driven by the host through the
    /// returned `MainLoop`.
    pub fn build_attached(self, transport: Arc<dyn Transport>) -> io::Result<(Messenger, MainLoop)> {
        let (main_queue, main_loop) = HostMainQueue::attached();
        let messenger = self.assemble(transport, main_queue)?;
        Ok((messenger, main_loop))
    }

    /// Build a messenger whose sends are delivered back into itself.
    pub fn build_loopback(self) -> io::Result<(Arc<Messenger>, Arc<LoopbackTransport>)> {
        let transport = Arc::new(LoopbackTransport::new());
        let messenger = Arc::new(self.build(transport.clone())?);
        transport.connect(Arc::downgrade(&messenger));
        Ok((messenger, transport))
    }

    /// Build two messengers wired to each other, e.g. a host side and a
    /// runtime side. Returns `(this, other)`.
    pub fn build_pair(self, other: BridgeBuilder) -> io::Result<(Arc<Messenger>, Arc<Messenger>)> {
        let to_other = Arc::new(LoopbackTransport::new());
        let to_this = Arc::new(LoopbackTransport::reverse_of(&to_other));
        let this = Arc::new(self.build(to_other.clone())?);
        let other = Arc::new(other.build(to_this.clone())?);
        to_other.connect(Arc::downgrade(&other));
        to_this.connect(Arc::downgrade(&this));
        Ok((this, other))
    }

    fn assemble(self, transport: Arc<dyn Transport>, main_queue: HostMainQueue) -> io::Result<Messenger> {
        let factory = match self.queue_factory {
            Some(factory) => factory,
            None => {
                let pool = WorkerPool::new(
                    self.worker_threads,
                    &self.thread_name,
                    self.fatal_sink.clone(),
                )?;
                Box::new(PoolQueueFactory::new(Arc::new(pool)))
            }
        };
        Ok(Messenger::new(
            transport,
            Arc::new(main_queue),
            factory,
            self.buffering,
        ))
    }
}
