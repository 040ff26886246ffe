use super::{HostMainQueue, SerialQueue, WorkerPool};
use std::fmt;

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_worker_pool(self, f)
    }
}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_serial_queue(self, f)
    }
}

impl fmt::Debug for HostMainQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_host_main_queue(self, f)
    }
}
