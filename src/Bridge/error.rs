//! Error types for the message bridge.

use super::Structs::Message_Structs::ReplyId;
use crate::Core::QueueToken;
use thiserror::Error;

pub use crate::Core::fatal::FatalError;

/// Errors surfaced synchronously to callers of the bridge API.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The queue token was not issued by this bridge, or was released.
    #[error("Unrecognized task queue {0:?}; create queues with Messenger::create_queue")]
    UnrecognizedQueue(QueueToken),

    /// Channel names must be non-empty.
    #[error("Channel name must not be empty")]
    EmptyChannel,

    /// A reply handle was used a second time.
    #[error("Reply already submitted for reply id {0}")]
    ReplyAlreadySubmitted(ReplyId),

    /// The transport could not hand the message to the other side.
    #[error("Message on channel {channel:?} could not be delivered: {reason}")]
    Undeliverable { channel: String, reason: String },

    /// A bridge thread could not be started.
    #[error("Bridge I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure returned by a message handler or a reply callback.
///
/// The two kinds have different propagation: a `Fault` is caught at the
/// dispatch boundary, logged and turned into an empty reply; a `Fatal` error
/// is forwarded to the thread's fatal sink.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Recoverable failure inside handler code.
    #[error("Handler fault: {0}")]
    Fault(Box<dyn std::error::Error + Send + Sync>),

    /// Non-recoverable failure; never swallowed.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl HandlerError {
    /// Recoverable fault from any error or message.
    pub fn fault(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HandlerError::Fault(error.into())
    }

    /// Non-recoverable failure with a message.
    pub fn fatal(message: impl Into<String>) -> Self {
        HandlerError::Fatal(FatalError::new(message))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal(_))
    }
}

impl From<BridgeError> for HandlerError {
    fn from(error: BridgeError) -> Self {
        HandlerError::Fault(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fatal_errors_report_fatal() {
        assert!(HandlerError::fatal("out of memory").is_fatal());
        assert!(!HandlerError::fault("listener failed").is_fatal());
        assert!(!HandlerError::from(BridgeError::EmptyChannel).is_fatal());
        assert!(HandlerError::from(FatalError::new("abort")).is_fatal());
    }
}
