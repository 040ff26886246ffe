#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver};
use dmxp_bridge::{handler_fn, MessageHandler};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Handler answering every message with its own payload.
pub fn echo_handler() -> Arc<dyn MessageHandler> {
    handler_fn(|message, reply| {
        reply.reply(message)?;
        Ok(())
    })
}

/// Handler that forwards every payload it sees and then echoes it.
pub fn recording_echo_handler() -> (Arc<dyn MessageHandler>, Receiver<Option<Vec<u8>>>) {
    let (tx, rx) = unbounded();
    let handler = handler_fn(move |message, reply| {
        let _ = tx.send(message.map(<[u8]>::to_vec));
        reply.reply(message)?;
        Ok(())
    });
    (handler, rx)
}
