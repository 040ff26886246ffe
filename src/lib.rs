// Module naming follows project convention (Core = scheduling primitives, Bridge = channel messaging)
#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Bridge;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod ffi;

pub use Bridge::{
    handler_fn, reply_fn, BridgeBuilder, BridgeError, FatalError, HandlerError, LoopbackTransport,
    MessageData, MessageHandler, Messenger, ReplyCallback, ReplyHandle, ReplyId, Transport,
};
pub use Core::{FatalSink, HostMainQueue, MainLoop, QueueKind, QueueOptions, QueueToken, TaskQueue};
