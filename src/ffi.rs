use crate::Bridge::{
    BridgeBuilder, BridgeError, HandlerError, MessageData, MessageHandler, Messenger, ReplyHandle,
    ReplyId, Transport,
};
use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;
use std::sync::Arc;

// Error codes
pub const DMXP_SUCCESS: i32 = 0;
pub const DMXP_ERROR_NULL_POINTER: i32 = -1;
pub const DMXP_ERROR_INVALID_ARG: i32 = -2;
pub const DMXP_ERROR_UNRECOGNIZED_QUEUE: i32 = -3;
pub const DMXP_ERROR_REPLY_SUBMITTED: i32 = -4;
pub const DMXP_ERROR_INTERNAL: i32 = -5;
pub const DMXP_ERROR_UNDELIVERABLE: i32 = -6;

/// Native side of the bridge as a table of callbacks.
///
/// Payloads are `(data, len)` pairs; a NULL `data` means "no payload", which
/// is distinct from a present payload of length 0. All callbacks may be
/// invoked from any thread.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct DmxpTransport {
    pub user_data: *mut c_void,
    pub dispatch_message: extern "C" fn(
        user_data: *mut c_void,
        channel: *const c_char,
        data: *const u8,
        len: usize,
        reply_id: u64,
    ),
    pub send_reply: extern "C" fn(user_data: *mut c_void, reply_id: u64, data: *const u8, len: usize),
    pub release_message_data: extern "C" fn(user_data: *mut c_void, message_data: u64),
}

/// Handler for one channel. Takes ownership of `reply`, which must be freed
/// with `dmxp_reply_free`. A non-zero return is a handler fault.
pub type DmxpMessageHandler = extern "C" fn(
    user_data: *mut c_void,
    data: *const u8,
    len: usize,
    reply: *mut ReplyHandleFfi,
) -> i32;

/// Receives the reply to a `dmxp_bridge_send`. NULL `data` is the empty reply.
pub type DmxpReplyCallback = extern "C" fn(user_data: *mut c_void, data: *const u8, len: usize);

/// Handle to a bridge instance (opaque pointer)
pub struct BridgeHandle {
    inner: Arc<Messenger>,
}

/// Handle to a pending reply (opaque pointer)
pub struct ReplyHandleFfi {
    inner: ReplyHandle,
}

#[derive(Copy, Clone)]
struct UserData(*mut c_void);

// The host promises its user_data may be used from any thread.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

struct FfiTransport {
    table: DmxpTransport,
}

unsafe impl Send for FfiTransport {}
unsafe impl Sync for FfiTransport {}

impl Transport for FfiTransport {
    fn dispatch_message(
        &self,
        channel: &str,
        payload: Option<&[u8]>,
        reply_id: ReplyId,
    ) -> Result<(), BridgeError> {
        let channel_c = CString::new(channel).map_err(|_| BridgeError::Undeliverable {
            channel: channel.to_string(),
            reason: "channel name contains NUL".to_string(),
        })?;
        let (data, len) = payload_to_raw(payload);
        (self.table.dispatch_message)(self.table.user_data, channel_c.as_ptr(), data, len, reply_id.0);
        Ok(())
    }

    fn send_reply(&self, reply_id: ReplyId, payload: Option<&[u8]>) {
        let (data, len) = payload_to_raw(payload);
        (self.table.send_reply)(self.table.user_data, reply_id.0, data, len);
    }

    fn release_message_data(&self, data: MessageData) {
        (self.table.release_message_data)(self.table.user_data, data.0);
    }
}

struct FfiHandler {
    callback: DmxpMessageHandler,
    user_data: UserData,
}

impl MessageHandler for FfiHandler {
    fn on_message(&self, message: Option<&[u8]>, reply: ReplyHandle) -> Result<(), HandlerError> {
        let (data, len) = payload_to_raw(message);
        let reply = Box::into_raw(Box::new(ReplyHandleFfi { inner: reply }));
        let status = (self.callback)(self.user_data.0, data, len, reply);
        if status == DMXP_SUCCESS {
            Ok(())
        } else {
            Err(HandlerError::fault(format!("native handler returned status {status}")))
        }
    }
}

fn payload_to_raw(payload: Option<&[u8]>) -> (*const u8, usize) {
    match payload {
        Some(bytes) => (bytes.as_ptr(), bytes.len()),
        None => (ptr::null(), 0),
    }
}

/// # Safety
/// `data` must be NULL or valid for `len` bytes for the lifetime `'a`.
unsafe fn payload_from_raw<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if data.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(data, len))
    }
}

/// # Safety
/// `channel` must be a valid NUL-terminated string.
unsafe fn channel_from_raw<'a>(channel: *const c_char) -> Result<&'a str, i32> {
    if channel.is_null() {
        return Err(DMXP_ERROR_NULL_POINTER);
    }
    CStr::from_ptr(channel)
        .to_str()
        .map_err(|_| DMXP_ERROR_INVALID_ARG)
}

fn bridge_error_code(error: &BridgeError) -> i32 {
    match error {
        BridgeError::UnrecognizedQueue(_) => DMXP_ERROR_UNRECOGNIZED_QUEUE,
        BridgeError::EmptyChannel => DMXP_ERROR_INVALID_ARG,
        BridgeError::ReplyAlreadySubmitted(_) => DMXP_ERROR_REPLY_SUBMITTED,
        BridgeError::Undeliverable { .. } => DMXP_ERROR_UNDELIVERABLE,
        BridgeError::Io(_) => DMXP_ERROR_INTERNAL,
    }
}

// -----------------------------------------------------------------------------
// Bridge API
// -----------------------------------------------------------------------------

/// Create a new bridge.
///
/// # Arguments
/// * `transport` - Callbacks for the native side.
/// * `worker_threads` - Pool size for background queues; 0 picks a default.
/// * `buffering` - Whether to buffer messages for unbound channels from the start.
///
/// # Returns
/// * Pointer to `BridgeHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn dmxp_bridge_new(
    transport: DmxpTransport,
    worker_threads: u32,
    buffering: bool,
) -> *mut BridgeHandle {
    let mut builder = BridgeBuilder::new().with_buffering(buffering);
    if worker_threads > 0 {
        builder = builder.with_worker_threads(worker_threads as usize);
    }

    match builder.build(Arc::new(FfiTransport { table: transport })) {
        Ok(messenger) => Box::into_raw(Box::new(BridgeHandle {
            inner: Arc::new(messenger),
        })),
        Err(e) => {
            tracing::error!(error = %e, "FFI Error: Failed to build bridge");
            ptr::null_mut()
        }
    }
}

/// Free a bridge handle.
#[no_mangle]
pub extern "C" fn dmxp_bridge_free(bridge: *mut BridgeHandle) {
    if !bridge.is_null() {
        unsafe {
            let _ = Box::from_raw(bridge); // Dropped automatically
        }
    }
}

/// Send a message to the runtime side.
///
/// # Arguments
/// * `channel` - NUL-terminated channel name.
/// * `data`, `len` - Payload; NULL `data` sends no payload.
/// * `callback` - Optional reply callback; NULL sends without expecting a reply.
/// * `user_data` - Passed back to `callback`.
///
/// # Returns
/// * 0 on success, negative error code otherwise.
#[no_mangle]
pub extern "C" fn dmxp_bridge_send(
    bridge: *mut BridgeHandle,
    channel: *const c_char,
    data: *const u8,
    len: usize,
    callback: Option<DmxpReplyCallback>,
    user_data: *mut c_void,
) -> i32 {
    if bridge.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    let channel = match unsafe { channel_from_raw(channel) } {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    let payload = unsafe { payload_from_raw(data, len) };

    let callback = callback.map(|callback| {
        let user_data = UserData(user_data);
        crate::Bridge::reply_fn(move |reply| {
            let user_data = user_data;
            let (data, len) = payload_to_raw(reply);
            callback(user_data.0, data, len);
            Ok(())
        })
    });

    match messenger.send(channel, payload, callback) {
        Ok(_) => DMXP_SUCCESS,
        Err(e) => bridge_error_code(&e),
    }
}

/// Bind a handler to a channel, or unbind it with a NULL handler.
///
/// # Arguments
/// * `queue` - Token from `dmxp_bridge_create_queue`, or 0 for the main queue.
#[no_mangle]
pub extern "C" fn dmxp_bridge_set_handler(
    bridge: *mut BridgeHandle,
    channel: *const c_char,
    handler: Option<DmxpMessageHandler>,
    user_data: *mut c_void,
    queue: u64,
) -> i32 {
    if bridge.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    let channel = match unsafe { channel_from_raw(channel) } {
        Ok(channel) => channel,
        Err(code) => return code,
    };

    let handler: Option<Arc<dyn MessageHandler>> = handler.map(|callback| {
        Arc::new(FfiHandler {
            callback,
            user_data: UserData(user_data),
        }) as Arc<dyn MessageHandler>
    });
    let queue = (queue != 0).then(|| messenger.queue_token_from_raw(queue));

    match messenger.set_handler(channel, handler, queue) {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => bridge_error_code(&e),
    }
}

/// Create a background queue.
///
/// # Returns
/// * 0 on success with the token written to `out_token`.
#[no_mangle]
pub extern "C" fn dmxp_bridge_create_queue(
    bridge: *mut BridgeHandle,
    serial: bool,
    out_token: *mut u64,
) -> i32 {
    if bridge.is_null() || out_token.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    let token = messenger.create_queue(serial);
    unsafe { *out_token = token.raw() };
    DMXP_SUCCESS
}

/// Release a queue token.
#[no_mangle]
pub extern "C" fn dmxp_bridge_release_queue(bridge: *mut BridgeHandle, token: u64) -> i32 {
    if bridge.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    match messenger.release_queue(messenger.queue_token_from_raw(token)) {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => bridge_error_code(&e),
    }
}

/// Deliver a message from the runtime side.
///
/// The payload is copied; `message_data` (0 for none) is handed back through
/// the transport's `release_message_data` once the message is done with.
#[no_mangle]
pub extern "C" fn dmxp_bridge_handle_message(
    bridge: *mut BridgeHandle,
    channel: *const c_char,
    data: *const u8,
    len: usize,
    reply_id: u64,
    message_data: u64,
) -> i32 {
    if bridge.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    let channel = match unsafe { channel_from_raw(channel) } {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    let payload = unsafe { payload_from_raw(data, len) }.map(<[u8]>::to_vec);
    let message_data = (message_data != 0).then_some(MessageData(message_data));

    messenger.handle_message(channel, payload, ReplyId(reply_id), message_data);
    DMXP_SUCCESS
}

/// Deliver the runtime side's reply to one of our sends.
#[no_mangle]
pub extern "C" fn dmxp_bridge_handle_reply(
    bridge: *mut BridgeHandle,
    reply_id: u64,
    data: *const u8,
    len: usize,
) -> i32 {
    if bridge.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    let payload = unsafe { payload_from_raw(data, len) };
    messenger.handle_reply(ReplyId(reply_id), payload);
    DMXP_SUCCESS
}

/// Turn buffering of messages for unbound channels on or off.
#[no_mangle]
pub extern "C" fn dmxp_bridge_set_buffering(bridge: *mut BridgeHandle, enabled: bool) -> i32 {
    if bridge.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    if enabled {
        messenger.enable_buffering();
    } else {
        messenger.disable_buffering();
    }
    DMXP_SUCCESS
}

/// Number of sends still waiting for a reply.
#[no_mangle]
pub extern "C" fn dmxp_bridge_pending_replies(bridge: *mut BridgeHandle, out_count: *mut usize) -> i32 {
    if bridge.is_null() || out_count.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let messenger = unsafe { &(*bridge).inner };
    unsafe { *out_count = messenger.pending_reply_count() };
    DMXP_SUCCESS
}

// -----------------------------------------------------------------------------
// Reply API
// -----------------------------------------------------------------------------

/// Answer the message a reply handle belongs to. NULL `data` sends the empty reply.
///
/// # Returns
/// * 0 on success.
/// * DMXP_ERROR_REPLY_SUBMITTED if this handle already answered.
#[no_mangle]
pub extern "C" fn dmxp_reply_send(reply: *mut ReplyHandleFfi, data: *const u8, len: usize) -> i32 {
    if reply.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let reply = unsafe { &(*reply).inner };
    let payload = unsafe { payload_from_raw(data, len) };
    match reply.reply(payload) {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => bridge_error_code(&e),
    }
}

/// Free a reply handle. Does not send anything.
#[no_mangle]
pub extern "C" fn dmxp_reply_free(reply: *mut ReplyHandleFfi) {
    if !reply.is_null() {
        unsafe {
            let _ = Box::from_raw(reply);
        }
    }
}
