// Per-thread sink for non-recoverable errors raised inside dispatch units.

use std::cell::RefCell;
use std::sync::Arc;

/// A non-recoverable failure raised by handler code.
///
/// Unlike a handler fault this is never swallowed: it is handed to the
/// executing thread's fatal sink, or the process aborts.
#[derive(Debug, Clone, thiserror::Error)]
#[error("fatal error: {message}")]
pub struct FatalError {
    message: String,
}

impl FatalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Callback receiving fatal errors raised on a thread.
pub type FatalSink = Arc<dyn Fn(&FatalError) + Send + Sync>;

thread_local! {
    static FATAL_SINK: RefCell<Option<FatalSink>> = const { RefCell::new(None) };
}

/// Install (or clear, with `None`) the fatal sink of the calling thread.
///
/// Bridge-owned threads install the sink configured on the builder when they
/// start; host threads that drive a `MainLoop` may install their own.
pub fn set_thread_sink(sink: Option<FatalSink>) {
    FATAL_SINK.with(|slot| *slot.borrow_mut() = sink);
}

/// Returns true if the calling thread has a fatal sink installed.
pub fn has_thread_sink() -> bool {
    FATAL_SINK.with(|slot| slot.borrow().is_some())
}

/// Forward `error` to the calling thread's sink, or abort the process.
pub(crate) fn raise_fatal(error: FatalError) {
    // Clone out of the cell so a sink that touches the slot cannot hit a borrow panic.
    let sink = FATAL_SINK.with(|slot| slot.borrow().clone());
    match sink {
        Some(sink) => {
            tracing::error!(error = %error, "fatal error forwarded to thread sink");
            sink(&error);
        }
        None => {
            tracing::error!(error = %error, "fatal error with no thread sink installed, aborting");
            std::process::abort();
        }
    }
}
