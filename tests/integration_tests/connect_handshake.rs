use fix_library_rs::{
    errors::LibraryError,
    models::parse::LibraryMessage,
    transport::memory::EngineEndpoint,
};

use fix_library_rs::models::error::EngineErrorType;

use crate::integration_tests::common::{
    TestClock, connected_harness, drain_outbound, engine_error, try_connect,
};

#[test]
fn test_connect_publishes_handshake_and_goes_live() {
    let harness = connected_harness(&["engine-a"]);

    assert!(harness.library.is_connected());
    assert_eq!(harness.library.current_channel(), "engine-a");
    assert_eq!(harness.engine.channel(), Some("engine-a".to_string()));

    let outbound = drain_outbound(&harness.engine);
    assert!(!outbound.is_empty());
    match &outbound[0] {
        LibraryMessage::LibraryConnect(msg) => {
            assert_eq!(msg.library_id, 7);
            assert!(msg.correlation_id > 0);
        },
        other => panic!("expected LibraryConnect, got {other:?}"),
    }
}

#[test]
fn test_connect_without_heartbeat_fails_on_first_timeout() {
    // reconnect_attempts == 0: the first deadline is fatal.
    let engine = EngineEndpoint::new();
    let clock = TestClock::default();
    clock.auto_tick(1);

    let err = try_connect(&["engine-a"], 100, 0, &engine, &clock)
        .err()
        .expect("silent engine must fail the connect");
    match err {
        LibraryError::UnableToConnect { attempts, channel } => {
            assert_eq!(attempts, 0);
            assert_eq!(channel, "engine-a");
        },
        other => panic!("expected UnableToConnect, got {other:?}"),
    }
}

#[test]
fn test_connect_rotates_through_all_channels_before_failing() {
    let engine = EngineEndpoint::new();
    let clock = TestClock::default();
    clock.auto_tick(1);

    let err = try_connect(&["engine-a", "engine-b"], 100, 1, &engine, &clock)
        .err()
        .expect("no engine answers");
    assert!(matches!(err, LibraryError::UnableToConnect { .. }));
    assert_eq!(
        engine.channel_history(),
        vec!["engine-a".to_string(), "engine-b".to_string()],
        "round-robin must have tried both configured engines"
    );
}

#[test]
fn test_connect_resends_handshake_until_heartbeat() {
    // The engine stays silent for most of the window; the library must keep
    // re-offering LibraryConnect at replyTimeout / 4.
    let engine = EngineEndpoint::new();
    let clock = TestClock::default();
    clock.auto_tick(10);

    // With a 100ms timeout and 10ms auto-tick the loop runs ~10 iterations;
    // the heartbeat arrives before the deadline thanks to the queue.
    engine.enqueue(crate::integration_tests::common::heartbeat());
    let library = try_connect(&["engine-a"], 100, 0, &engine, &clock)
        .expect("heartbeat within window");
    assert!(library.is_connected());

    let connects = drain_outbound(&engine)
        .into_iter()
        .filter(|m| matches!(m, LibraryMessage::LibraryConnect(_)))
        .count();
    assert!(connects >= 1);
}

#[test]
fn test_invalid_configuration_rejected_up_front() {
    let engine = EngineEndpoint::new();
    let clock = TestClock::default();
    let err = try_connect(&[], 100, 0, &engine, &clock)
        .err()
        .expect("no channels configured");
    assert!(matches!(err, LibraryError::InvalidConfiguration(_)));
}

#[test]
fn test_engine_error_during_connect_fails_the_attempt() {
    let engine = EngineEndpoint::new();
    let clock = TestClock::default();

    // No heartbeat; the engine rejects the library outright.
    engine.enqueue(engine_error(
        EngineErrorType::UnknownLibrary,
        0,
        "library 7 is not provisioned",
    ));
    let err = try_connect(&["engine-a"], 100, 3, &engine, &clock)
        .err()
        .expect("latched engine error must abort the connect");
    assert!(matches!(err, LibraryError::InvalidConfiguration(_)), "{err:?}");
}

#[test]
fn test_unmatched_engine_error_reaches_user_callback() {
    let mut harness = connected_harness(&["engine-a"]);
    harness
        .engine
        .enqueue(engine_error(EngineErrorType::Other, 424242, "late reply"));
    harness.library.poll(10).expect("poll");

    let events = harness.events.borrow();
    assert_eq!(events.errors.len(), 1);
    assert_eq!(events.errors[0].0, EngineErrorType::Other);
    assert_eq!(events.errors[0].1, "late reply");
}

#[test]
fn test_close_after_close_is_fatal() {
    let mut harness = connected_harness(&["engine-a"]);
    harness.library.close().expect("first close");
    assert!(harness.library.is_closed());
    assert!(matches!(harness.library.close(), Err(LibraryError::Closed)));
    assert!(matches!(harness.library.poll(10), Err(LibraryError::Closed)));
}
