use bytes::BytesMut;
use fix_library_rs::{
    errors::LibraryError,
    library::replies::{ReplyOutcome, ReplyPayload},
    models::{
        fix_message::MessageStatus,
        parse::LibraryMessage,
        release::{ReleaseSessionReply, SessionReplyStatus},
        request_session::RequestSessionReply,
    },
    session::session::SessionState,
};

use crate::integration_tests::common::{
    LIBRARY_ID, catchup, connected_harness, drain_outbound, fix_message_with,
    logon_new, manage_initiator, sent_position, session_config,
};

fn release_reply(reply_to_id: i64, connection_id: i64, status: SessionReplyStatus) -> bytes::Bytes {
    let mut buf = BytesMut::new();
    ReleaseSessionReply {
        library_id: LIBRARY_ID,
        status,
        reply_to_id,
        connection_id,
    }
    .encode(&mut buf);
    buf.freeze()
}

fn request_reply(reply_to_id: i64, status: SessionReplyStatus) -> bytes::Bytes {
    let mut buf = BytesMut::new();
    RequestSessionReply {
        library_id: LIBRARY_ID,
        status,
        reply_to_id,
    }
    .encode(&mut buf);
    buf.freeze()
}

fn acquired_harness() -> crate::integration_tests::common::Harness {
    let mut harness = connected_harness(&["engine-a"]);
    drain_outbound(&harness.engine);
    let reply = harness
        .library
        .initiate(session_config())
        .expect("initiate");
    harness
        .engine
        .enqueue(manage_initiator(42, 1001, reply.correlation_id()));
    harness.engine.enqueue(logon_new(42, 1001));
    harness.library.poll(10).expect("poll");
    assert_eq!(harness.library.session_count(), 1);
    drain_outbound(&harness.engine);
    harness
}

#[test]
fn test_release_carries_session_snapshot_and_removes_on_ok() {
    let mut harness = acquired_harness();

    let reply = harness
        .library
        .release_to_gateway(1001)
        .expect("release");

    let outbound = drain_outbound(&harness.engine);
    match &outbound[..] {
        [LibraryMessage::ReleaseSession(msg)] => {
            assert_eq!(msg.connection_id, 42);
            assert_eq!(msg.state, SessionState::Active);
            assert_eq!(msg.heartbeat_interval_ms, 10_000);
            assert_eq!(msg.username, "user");
            assert_eq!(msg.password, "secret");
            assert_eq!(msg.correlation_id, reply.correlation_id());
        },
        other => panic!("expected one ReleaseSession, got {other:?}"),
    }

    harness.engine.enqueue(release_reply(
        reply.correlation_id(),
        42,
        SessionReplyStatus::Ok,
    ));
    harness.library.poll(10).expect("poll");

    assert_eq!(
        reply.outcome(),
        ReplyOutcome::Completed(ReplyPayload::SessionReply(SessionReplyStatus::Ok))
    );
    assert_eq!(
        harness.library.session_count(),
        0,
        "ownership moved back to the engine"
    );
}

#[test]
fn test_release_of_unknown_session_fails_fast() {
    let mut harness = connected_harness(&["engine-a"]);
    let err = harness.library.release_to_gateway(9999).expect_err("unknown");
    assert!(matches!(err, LibraryError::UnknownSession(9999)));
}

#[test]
fn test_request_session_resolves_on_reply() {
    let mut harness = connected_harness(&["engine-a"]);
    drain_outbound(&harness.engine);

    let reply = harness
        .library
        .request_session(3003, 15)
        .expect("request");
    let outbound = drain_outbound(&harness.engine);
    match &outbound[..] {
        [LibraryMessage::RequestSession(msg)] => {
            assert_eq!(msg.session_id, 3003);
            assert_eq!(msg.last_received_sequence_number, 15);
        },
        other => panic!("expected one RequestSession, got {other:?}"),
    }

    harness
        .engine
        .enqueue(request_reply(reply.correlation_id(), SessionReplyStatus::Ok));
    harness.library.poll(10).expect("poll");
    assert!(reply.has_completed());
}

#[test]
fn test_back_pressured_request_retries_next_poll() {
    let mut harness = connected_harness(&["engine-a"]);
    drain_outbound(&harness.engine);

    harness.engine.push_back_pressure(1);
    let reply = harness.library.request_session(3003, 0).expect("request");
    assert_eq!(
        drain_outbound(&harness.engine).len(),
        0,
        "first offer was back-pressured"
    );

    harness.library.poll(10).expect("poll retries the publication");
    let outbound = drain_outbound(&harness.engine);
    assert_eq!(outbound.len(), 1);
    assert!(reply.is_pending());
}

#[test]
fn test_unanswered_request_times_out() {
    let mut harness = connected_harness(&["engine-a"]);
    let reply = harness.library.request_session(3003, 0).expect("request");

    // Keep liveness fed while the reply deadline (100ms) expires.
    harness.clock.set(90);
    harness.engine.enqueue(crate::integration_tests::common::heartbeat());
    harness.library.poll(10).expect("poll");
    assert!(reply.is_pending());

    harness.clock.set(120);
    harness.engine.enqueue(crate::integration_tests::common::heartbeat());
    harness.library.poll(10).expect("poll");
    assert!(reply.has_timed_out());
    assert_eq!(harness.library.pending_replies(), 0);
}

#[test]
fn test_catchup_buffers_until_replay_count_reached() {
    let mut harness = acquired_harness();

    harness.engine.enqueue(catchup(42, 2));
    harness.engine.enqueue(fix_message_with(
        42,
        1001,
        5,
        "replay-5",
        MessageStatus::CatchupReplay,
        false,
    ));
    harness.engine.enqueue(fix_message_with(
        42,
        1001,
        6,
        "replay-6",
        MessageStatus::CatchupReplay,
        false,
    ));
    harness.engine.enqueue(fix_message_with(
        42,
        1001,
        7,
        "live-7",
        MessageStatus::Ok,
        false,
    ));
    harness.library.poll(10).expect("poll");

    let events = harness.events.borrow();
    let bodies: Vec<&str> = events
        .messages
        .iter()
        .map(|(_, b)| std::str::from_utf8(b).expect("utf8"))
        .collect();
    assert_eq!(bodies, vec!["replay-5", "replay-6", "live-7"]);
}

#[test]
fn test_slow_status_toggles_once_per_change() {
    let mut harness = acquired_harness();

    harness.engine.enqueue(fix_message_with(42, 1001, 5, "a", MessageStatus::Ok, true));
    harness.engine.enqueue(fix_message_with(42, 1001, 6, "b", MessageStatus::Ok, true));
    harness.engine.enqueue(fix_message_with(42, 1001, 7, "c", MessageStatus::Ok, false));
    harness.library.poll(10).expect("poll");

    assert_eq!(
        harness.events.borrow().slow,
        vec![(1001, true), (1001, false)],
        "only edges are reported"
    );
}

#[test]
fn test_sent_position_reaches_handler() {
    let mut harness = connected_harness(&["engine-a"]);
    harness.engine.enqueue(sent_position(8192));
    harness.library.poll(10).expect("poll");
    assert_eq!(harness.events.borrow().sent_positions, vec![8192]);
}
