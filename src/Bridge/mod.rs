mod boundary;
mod builder;
mod debug;
mod getters;
mod messenger;

pub mod buffer;
pub mod error;
pub mod handler;
pub mod registry;
pub mod reply;
pub mod transport;

pub mod Structs {
    pub mod Message_Structs;
    pub use Message_Structs::{BufferedMessage, MessageData, MessageLease, ReplyId}; // re-export for stable path
}

pub use builder::BridgeBuilder;
pub use error::{BridgeError, FatalError, HandlerError};
pub use handler::{handler_fn, MessageHandler};
pub use messenger::Messenger;
pub use reply::{reply_fn, ReplyCallback, ReplyHandle};
pub use transport::{LoopbackTransport, Transport};
pub use Structs::{MessageData, ReplyId};
