use super::error::HandlerError;
use super::reply::ReplyHandle;
use std::sync::Arc;

/// Receives messages sent to a channel.
///
/// The payload is only borrowed for the duration of the call; copy it if an
/// asynchronous reply needs it. The handler owns reply timing: returning
/// without replying is fine as long as some clone of `reply` answers later.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: Option<&[u8]>, reply: ReplyHandle) -> Result<(), HandlerError>;
}

struct FnHandler<F>(F);

impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(Option<&[u8]>, ReplyHandle) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_message(&self, message: Option<&[u8]>, reply: ReplyHandle) -> Result<(), HandlerError> {
        (self.0)(message, reply)
    }
}

/// Adapt a closure into a shareable handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Option<&[u8]>, ReplyHandle) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}
