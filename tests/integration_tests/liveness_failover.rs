use fix_library_rs::errors::LibraryError;

use crate::integration_tests::common::{connected_harness, heartbeat};

#[test]
fn test_heartbeats_keep_the_library_live() {
    let mut harness = connected_harness(&["engine-a", "engine-b"]);
    for t in (50..=400).step_by(50) {
        harness.clock.set(t);
        harness.engine.enqueue(heartbeat());
        harness.library.poll(10).expect("poll");
        assert!(harness.library.is_connected());
    }
    assert_eq!(harness.library.current_channel(), "engine-a");
}

#[test]
fn test_silence_rotates_to_next_engine() {
    // Heartbeat at t=0 (during connect), then silence. replyTimeout is 100ms;
    // a poll at t=150 must observe the loss and, clustered, reconnect to the
    // next channel round-robin.
    let mut harness = connected_harness(&["engine-a", "engine-b"]);
    assert!(harness.library.is_connected());

    harness.clock.set(150);
    harness.clock.auto_tick(1);

    // No engine answers on either channel, so the bounded reconnect fails;
    // what matters is that the attempt moved to engine-b.
    let err = harness.library.poll(10).expect_err("reconnect exhausts budget");
    assert!(matches!(err, LibraryError::UnableToConnect { .. }));
    assert!(!harness.library.is_connected());
    let history = harness.engine.channel_history();
    assert!(
        history.len() >= 2 && history[1] == "engine-b",
        "liveness loss must rotate to engine-b, got {history:?}"
    );
}

#[test]
fn test_recovers_when_an_engine_answers_again() {
    let mut harness = connected_harness(&["engine-a", "engine-b"]);
    harness.clock.set(150);
    harness.clock.auto_tick(1);
    let _ = harness.library.poll(10).expect_err("both engines silent");

    // engine-b comes back: the next poll re-runs the connect loop and the
    // queued heartbeat lands it.
    harness.clock.auto_tick(0);
    harness.engine.enqueue(heartbeat());
    harness.library.poll(10).expect("reconnect succeeds");
    assert!(harness.library.is_connected());
}

#[test]
fn test_single_engine_does_not_auto_reconnect() {
    let mut harness = connected_harness(&["engine-a"]);
    harness.clock.set(150);

    // Liveness is lost, but with one configured engine the streams are kept
    // and no blocking reconnect happens inside poll.
    harness.library.poll(10).expect("poll must not fail");
    assert!(!harness.library.is_connected());

    // A late heartbeat revives the connection in place.
    harness.engine.enqueue(heartbeat());
    harness.clock.set(200);
    harness.library.poll(10).expect("poll");
    assert!(harness.library.is_connected());
}
