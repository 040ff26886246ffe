// The error boundary around handler and reply-callback code.

use super::error::{FatalError, HandlerError};
use crate::Core::pool::panic_message;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What happened when user code ran behind the boundary.
pub(crate) enum Outcome {
    Completed,
    /// Recoverable failure, already logged.
    Faulted,
    /// Must reach the fatal sink; the caller decides what to do first.
    Fatal(FatalError),
}

/// Run `f`, catching panics and classifying its error.
///
/// Panics count as faults: they are recoverable at this boundary the way an
/// uncaught exception in a listener would be.
pub(crate) fn call_guarded<F>(what: &'static str, channel: &str, f: F) -> Outcome
where
    F: FnOnce() -> Result<(), HandlerError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Outcome::Completed,
        Ok(Err(HandlerError::Fault(error))) => {
            tracing::error!(channel, error = %error, "uncaught fault in {what}");
            Outcome::Faulted
        }
        Ok(Err(HandlerError::Fatal(error))) => Outcome::Fatal(error),
        Err(panic) => {
            tracing::error!(channel, panic = %panic_message(&*panic), "panic in {what}");
            Outcome::Faulted
        }
    }
}
