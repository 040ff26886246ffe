mod debug;
pub mod Queue;
pub mod fatal;
pub mod pool;

pub use fatal::{FatalError, FatalSink};
pub use pool::{Task, WorkerPool};
pub use Queue::{
    ConcurrentQueue, HostMainQueue, MainLoop, PoolQueueFactory, QueueArena, QueueKind,
    QueueOptions, QueueToken, SerialQueue, TaskQueue, TaskQueueFactory,
};
