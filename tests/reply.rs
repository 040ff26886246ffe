mod common;

use common::{echo_handler, init_tracing, wait_until, WAIT};
use crossbeam_channel::unbounded;
use dmxp_bridge::{
    handler_fn, BridgeBuilder, BridgeError, FatalError, HandlerError, LoopbackTransport, ReplyId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn echo_round_trip_returns_same_bytes() {
    init_tracing();
    let (messenger, transport) = BridgeBuilder::new().build_loopback().unwrap();
    messenger.set_handler("echo", Some(echo_handler()), None).unwrap();

    let (tx, rx) = unbounded();
    messenger
        .send_with_reply("echo", Some(&[0x01, 0x02]), move |reply| {
            let _ = tx.send(reply.map(<[u8]>::to_vec));
            Ok(())
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some(vec![0x01, 0x02]));
    assert_eq!(messenger.pending_reply_count(), 0);
    assert!(wait_until(WAIT, || transport.outstanding_message_data() == 0));
}

#[test]
fn unbound_channel_without_buffering_gets_empty_reply() {
    init_tracing();
    let (messenger, _transport) = BridgeBuilder::new().build_loopback().unwrap();

    let (tx, rx) = unbounded();
    messenger
        .send_with_reply("echo", Some(&[0x01, 0x02]), move |reply| {
            let _ = tx.send(reply.map(<[u8]>::to_vec));
            Ok(())
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
    assert_eq!(messenger.pending_reply_count(), 0);
}

#[test]
fn reply_ids_start_at_one_and_only_count_requests() {
    init_tracing();
    let (messenger, _transport) = BridgeBuilder::new().build_loopback().unwrap();

    assert_eq!(messenger.next_reply_id(), ReplyId(1));
    let first = messenger.send_with_reply("x", None, |_| Ok(())).unwrap();
    let fire_and_forget = messenger.send("x", None, None).unwrap();
    let second = messenger.send_with_reply("x", None, |_| Ok(())).unwrap();

    assert_eq!(first, ReplyId(1));
    assert_eq!(fire_and_forget, ReplyId::NONE);
    assert_eq!(second, ReplyId(2));
}

#[test]
fn second_reply_fails_and_callback_fires_once() {
    init_tracing();
    let (messenger, _transport) = BridgeBuilder::new().build_loopback().unwrap();

    let (second_tx, second_rx) = unbounded();
    messenger
        .set_handler(
            "twice",
            Some(handler_fn(move |message, reply| {
                reply.reply(message)?;
                let _ = second_tx.send(reply.reply(Some(&b"again"[..])));
                Ok(())
            })),
            None,
        )
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    messenger
        .send_with_reply("twice", Some(b"once"), move |reply| {
            assert_eq!(reply, Some(&b"once"[..]));
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    let second = second_rx.recv_timeout(WAIT).unwrap();
    assert!(matches!(second, Err(BridgeError::ReplyAlreadySubmitted(ReplyId(1)))));
    assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn callback_never_fires_when_handler_never_replies() {
    init_tracing();
    let (messenger, transport) = BridgeBuilder::new().build_loopback().unwrap();

    let (seen_tx, seen_rx) = unbounded();
    messenger
        .set_handler(
            "silent",
            Some(handler_fn(move |_, _reply| {
                let _ = seen_tx.send(());
                Ok(())
            })),
            None,
        )
        .unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    messenger
        .send_with_reply("silent", None, move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    seen_rx.recv_timeout(WAIT).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(messenger.pending_reply_count(), 1);
    // The native data is released even though the reply is still owed.
    assert!(wait_until(WAIT, || transport.outstanding_message_data() == 0));
}

#[test]
fn handler_may_reply_later_from_another_thread() {
    init_tracing();
    let (messenger, _transport) = BridgeBuilder::new().build_loopback().unwrap();

    messenger
        .set_handler(
            "async",
            Some(handler_fn(|message, reply| {
                let copy = message.map(<[u8]>::to_vec);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    let _ = reply.reply(copy.as_deref());
                });
                Ok(())
            })),
            None,
        )
        .unwrap();

    let (tx, rx) = unbounded();
    messenger
        .send_with_reply("async", Some(b"later"), move |reply| {
            let _ = tx.send(reply.map(<[u8]>::to_vec));
            Ok(())
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some(b"later".to_vec()));
}

#[test]
fn handler_fault_and_panic_become_empty_replies() {
    init_tracing();
    let (messenger, transport) = BridgeBuilder::new().build_loopback().unwrap();

    messenger
        .set_handler(
            "fault",
            Some(handler_fn(|_, _| Err(HandlerError::fault("listener failed")))),
            None,
        )
        .unwrap();
    messenger
        .set_handler(
            "panic",
            Some(handler_fn(|_, _| panic!("listener blew up"))),
            None,
        )
        .unwrap();

    let (tx, rx) = unbounded();
    for channel in ["fault", "panic"] {
        let tx = tx.clone();
        messenger
            .send_with_reply(channel, Some(b"payload"), move |reply| {
                let _ = tx.send(reply.map(<[u8]>::to_vec));
                Ok(())
            })
            .unwrap();
    }

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
    assert_eq!(messenger.pending_reply_count(), 0);
    assert!(wait_until(WAIT, || transport.outstanding_message_data() == 0));
}

#[test]
fn fault_after_reply_sends_nothing_more() {
    init_tracing();
    let (messenger, _transport) = BridgeBuilder::new().build_loopback().unwrap();

    messenger
        .set_handler(
            "late-fault",
            Some(handler_fn(|message, reply| {
                reply.reply(message)?;
                Err(HandlerError::fault("failed after replying"))
            })),
            None,
        )
        .unwrap();

    let (tx, rx) = unbounded();
    messenger
        .send_with_reply("late-fault", Some(b"kept"), move |reply| {
            let _ = tx.send(reply.map(<[u8]>::to_vec));
            Ok(())
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some(b"kept".to_vec()));
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn fatal_error_reaches_thread_sink_and_caller_still_resolves() {
    init_tracing();
    let (fatal_tx, fatal_rx) = unbounded();
    let (messenger, transport) = BridgeBuilder::new()
        .with_fatal_sink(Arc::new(move |error: &FatalError| {
            let _ = fatal_tx.send(error.message().to_string());
        }))
        .build_loopback()
        .unwrap();

    messenger
        .set_handler(
            "fatal",
            Some(handler_fn(|_, _| Err(HandlerError::fatal("out of memory")))),
            None,
        )
        .unwrap();

    let (tx, rx) = unbounded();
    messenger
        .send_with_reply("fatal", None, move |reply| {
            let _ = tx.send(reply.map(<[u8]>::to_vec));
            Ok(())
        })
        .unwrap();

    assert_eq!(fatal_rx.recv_timeout(WAIT).unwrap(), "out of memory");
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
    assert!(wait_until(WAIT, || transport.outstanding_message_data() == 0));
}

#[test]
fn absent_and_empty_payloads_stay_distinct() {
    init_tracing();
    let (messenger, _transport) = BridgeBuilder::new().build_loopback().unwrap();
    messenger.set_handler("echo", Some(echo_handler()), None).unwrap();

    let (tx, rx) = unbounded();
    for payload in [None, Some(&b""[..])] {
        let tx = tx.clone();
        messenger
            .send_with_reply("echo", payload, move |reply| {
                let _ = tx.send(reply.map(<[u8]>::to_vec));
                Ok(())
            })
            .unwrap();
    }

    let mut replies = vec![
        rx.recv_timeout(WAIT).unwrap(),
        rx.recv_timeout(WAIT).unwrap(),
    ];
    replies.sort();
    assert_eq!(replies, vec![None, Some(Vec::new())]);
}

#[test]
fn reply_for_unknown_id_is_ignored() {
    init_tracing();
    let (messenger, _transport) = BridgeBuilder::new().build_loopback().unwrap();
    messenger.handle_reply(ReplyId(777), Some(b"stray"));
    messenger.handle_reply(ReplyId::NONE, None);
    assert_eq!(messenger.pending_reply_count(), 0);
}

#[test]
fn undeliverable_send_fails_and_leaves_nothing_pending() {
    init_tracing();
    // Never connected, so the transport has no peer to deliver to.
    let transport = Arc::new(LoopbackTransport::new());
    let messenger = BridgeBuilder::new().build(transport).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    let result = messenger.send_with_reply("nowhere", Some(b"lost"), move |_| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(matches!(
        result,
        Err(BridgeError::Undeliverable { ref channel, .. }) if channel == "nowhere"
    ));
    assert_eq!(messenger.pending_reply_count(), 0);
    assert!(matches!(
        messenger.send("nowhere", None, None),
        Err(BridgeError::Undeliverable { .. })
    ));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
