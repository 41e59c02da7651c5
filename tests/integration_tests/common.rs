use std::{cell::{Cell, RefCell}, rc::Rc};

use bytes::{Bytes, BytesMut};
use fix_library_rs::{
    cfg::{config::{LibraryConfig, SessionConfig}, enums::SequenceNumberType},
    errors::LibraryError,
    library::{
        handler::{LibraryHandler, SessionHandler},
        library::FixLibrary,
    },
    models::{
        connect::{ApplicationHeartbeat, NotLeader},
        control::{Catchup, ControlNotification, NewSentPosition},
        disconnect::{Disconnect, DisconnectReason},
        error::{EngineError, EngineErrorType},
        fix_message::{FixMessage, MessageStatus},
        logon::{Logon, LogonStatus},
        manage::{ConnectionType, ManageConnection},
        parse::LibraryMessage,
    },
    session::session::Session,
    transport::{FlowAction, memory::EngineEndpoint},
    utils::{EpochClock, IdleStrategy},
};

pub const LIBRARY_ID: u32 = 7;

/// Hand-driven clock shared between the test and the library. With
/// `auto_tick_ms` set, every read advances time, so bounded busy-waits
/// (the connect loop) run to their deadline instead of spinning forever.
#[derive(Debug, Clone, Default)]
pub struct TestClock {
    now_ms: Rc<Cell<i64>>,
    auto_tick_ms: Rc<Cell<i64>>,
}

impl TestClock {
    pub fn set(&self, now_ms: i64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.set(self.now_ms.get() + delta_ms);
    }

    pub fn auto_tick(&self, step_ms: i64) {
        self.auto_tick_ms.set(step_ms);
    }
}

impl EpochClock for TestClock {
    fn time_ms(&self) -> i64 {
        let now = self.now_ms.get();
        self.now_ms.set(now + self.auto_tick_ms.get());
        now
    }
}

/// Everything the recording handler observed, shared with the test body.
#[derive(Debug, Default)]
pub struct Events {
    pub acquired: Vec<i64>,
    pub exists: Vec<(i64, String, String)>,
    pub messages: Vec<(i64, Vec<u8>)>,
    pub slow: Vec<(i64, bool)>,
    pub disconnects: Vec<(i64, DisconnectReason)>,
    pub timeouts: Vec<i64>,
    pub errors: Vec<(EngineErrorType, String)>,
    pub sent_positions: Vec<i64>,
}

#[derive(Default)]
pub struct RecordingHandler {
    pub events: Rc<RefCell<Events>>,
    pub abort_next_disconnect: Rc<Cell<bool>>,
}

struct RecordingSessionHandler {
    session_id: i64,
    events: Rc<RefCell<Events>>,
}

impl SessionHandler for RecordingSessionHandler {
    fn on_message(
        &mut self,
        body: &[u8],
        _session: &Session,
        _sequence_index: i32,
        _fix_message_type: i32,
        _timestamp_ns: i64,
        _position: i64,
    ) -> FlowAction {
        self.events
            .borrow_mut()
            .messages
            .push((self.session_id, body.to_vec()));
        FlowAction::Continue
    }

    fn on_slow_status(&mut self, _session: &Session, is_slow: bool) {
        self.events
            .borrow_mut()
            .slow
            .push((self.session_id, is_slow));
    }
}

impl LibraryHandler for RecordingHandler {
    fn on_session_acquired(&mut self, session: &mut Session) -> Box<dyn SessionHandler> {
        self.events.borrow_mut().acquired.push(session.session_id());
        Box::new(RecordingSessionHandler {
            session_id: session.session_id(),
            events: Rc::clone(&self.events),
        })
    }

    fn on_session_exists(
        &mut self,
        session_id: i64,
        local_comp_id: &str,
        remote_comp_id: &str,
    ) {
        self.events.borrow_mut().exists.push((
            session_id,
            local_comp_id.to_string(),
            remote_comp_id.to_string(),
        ));
    }

    fn on_disconnect(&mut self, session: &Session, reason: DisconnectReason) -> FlowAction {
        self.events
            .borrow_mut()
            .disconnects
            .push((session.session_id(), reason));
        if self.abort_next_disconnect.take() {
            FlowAction::Abort
        } else {
            FlowAction::Continue
        }
    }

    fn on_timeout(&mut self, session: &Session) {
        self.events.borrow_mut().timeouts.push(session.session_id());
    }

    fn on_error(
        &mut self,
        kind: EngineErrorType,
        _library_id: u32,
        message: &str,
    ) -> FlowAction {
        self.events
            .borrow_mut()
            .errors
            .push((kind, message.to_string()));
        FlowAction::Continue
    }

    fn on_send_completed(&mut self, position: i64) -> FlowAction {
        self.events.borrow_mut().sent_positions.push(position);
        FlowAction::Continue
    }
}

pub struct Harness {
    pub engine: EngineEndpoint,
    pub clock: TestClock,
    pub events: Rc<RefCell<Events>>,
    pub abort_next_disconnect: Rc<Cell<bool>>,
    pub library: FixLibrary,
}

pub fn library_config(channels: &[&str], reply_timeout_ms: i64, reconnect_attempts: u32) -> LibraryConfig {
    LibraryConfig {
        library_id: LIBRARY_ID,
        engine_channels: channels.iter().map(|c| c.to_string()).collect(),
        reply_timeout_ms,
        reconnect_attempts,
        connect_idle_spin_ms: None,
        idle_strategy: IdleStrategy::Busy,
    }
}

/// The initiate target used across the scenarios.
pub fn session_config() -> SessionConfig {
    SessionConfig {
        host: "localhost".to_string(),
        port: 9000,
        sender_comp_id: "INIT".to_string(),
        sender_sub_id: String::new(),
        sender_location_id: String::new(),
        target_comp_id: "ACC".to_string(),
        sequence_number_type: SequenceNumberType::Persistent,
        initial_sequence_number: 1,
        username: "user".to_string(),
        password: "secret".to_string(),
        heartbeat_interval_s: 10,
    }
}

/// Builds a library that connects immediately: the engine's first heartbeat
/// is queued before the connect loop starts polling.
pub fn connected_harness(channels: &[&str]) -> Harness {
    let engine = EngineEndpoint::new();
    let clock = TestClock::default();
    clock.set(0);

    engine.enqueue(heartbeat());

    let events = Rc::new(RefCell::new(Events::default()));
    let abort_next_disconnect = Rc::new(Cell::new(false));
    let handler = RecordingHandler {
        events: Rc::clone(&events),
        abort_next_disconnect: Rc::clone(&abort_next_disconnect),
    };

    let library = FixLibrary::connect_with_clock(
        library_config(channels, 100, 2),
        Box::new(handler),
        Box::new(engine.subscription()),
        Rc::new(engine.publication()),
        Box::new(clock.clone()),
    )
    .expect("connect must succeed with a queued heartbeat");

    Harness {
        engine,
        clock,
        events,
        abort_next_disconnect,
        library,
    }
}

pub fn try_connect(
    channels: &[&str],
    reply_timeout_ms: i64,
    reconnect_attempts: u32,
    engine: &EngineEndpoint,
    clock: &TestClock,
) -> Result<FixLibrary, LibraryError> {
    let events = Rc::new(RefCell::new(Events::default()));
    let handler = RecordingHandler {
        events,
        abort_next_disconnect: Rc::new(Cell::new(false)),
    };
    FixLibrary::connect_with_clock(
        library_config(channels, reply_timeout_ms, reconnect_attempts),
        Box::new(handler),
        Box::new(engine.subscription()),
        Rc::new(engine.publication()),
        Box::new(clock.clone()),
    )
}

/// Drains the library-to-engine stream into decoded messages.
pub fn drain_outbound(engine: &EngineEndpoint) -> Vec<LibraryMessage> {
    let mut out = Vec::new();
    while let Some(frame) = engine.next_outbound() {
        out.push(LibraryMessage::decode(&frame).expect("outbound frame must decode"));
    }
    out
}

fn encode(encode_into: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    encode_into(&mut buf);
    buf.freeze()
}

pub fn heartbeat() -> Bytes {
    encode(|b| {
        ApplicationHeartbeat {
            library_id: LIBRARY_ID,
        }
        .encode(b)
    })
}

pub fn manage_initiator(connection_id: i64, session_id: i64, reply_to_id: i64) -> Bytes {
    encode(|b| {
        ManageConnection {
            library_id: LIBRARY_ID,
            connection_type: ConnectionType::Initiator,
            connection_id,
            session_id,
            reply_to_id,
            last_sent_sequence_number: 0,
            last_received_sequence_number: 0,
            heartbeat_interval_ms: 10_000,
            address: "localhost:9000".to_string(),
            local_comp_id: "INIT".to_string(),
            remote_comp_id: "ACC".to_string(),
        }
        .encode(b)
    })
}

pub fn logon_new(connection_id: i64, session_id: i64) -> Bytes {
    encode(|b| {
        Logon {
            library_id: LIBRARY_ID,
            status: LogonStatus::New,
            connection_id,
            session_id,
            last_sent_sequence_number: 0,
            last_received_sequence_number: 0,
            local_comp_id: "INIT".to_string(),
            remote_comp_id: "ACC".to_string(),
        }
        .encode(b)
    })
}

pub fn logon_notification(session_id: i64) -> Bytes {
    encode(|b| {
        Logon {
            library_id: LIBRARY_ID,
            status: LogonStatus::LibraryNotification,
            connection_id: 0,
            session_id,
            last_sent_sequence_number: 0,
            last_received_sequence_number: 0,
            local_comp_id: "OTHER".to_string(),
            remote_comp_id: "ACC".to_string(),
        }
        .encode(b)
    })
}

pub fn fix_message(connection_id: i64, session_id: i64, sequence_number: i32, body: &str) -> Bytes {
    fix_message_with(connection_id, session_id, sequence_number, body, MessageStatus::Ok, false)
}

pub fn fix_message_with(
    connection_id: i64,
    session_id: i64,
    sequence_number: i32,
    body: &str,
    status: MessageStatus,
    slow: bool,
) -> Bytes {
    encode(|b| {
        FixMessage {
            library_id: LIBRARY_ID,
            status,
            slow,
            connection_id,
            session_id,
            sequence_index: 0,
            fix_message_type: 68,
            timestamp_ns: 0,
            position: 0,
            sequence_number,
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
        .encode(b)
    })
}

pub fn disconnect(connection_id: i64, reason: DisconnectReason) -> Bytes {
    encode(|b| {
        Disconnect {
            library_id: LIBRARY_ID,
            reason,
            connection_id,
        }
        .encode(b)
    })
}

pub fn engine_error(error_type: EngineErrorType, reply_to_id: i64, message: &str) -> Bytes {
    encode(|b| {
        EngineError {
            library_id: LIBRARY_ID,
            error_type,
            reply_to_id,
            message: message.to_string(),
        }
        .encode(b)
    })
}

pub fn not_leader(reply_to_id: i64, channel: &str) -> Bytes {
    encode(|b| {
        NotLeader {
            library_id: LIBRARY_ID,
            reply_to_id,
            library_channel: channel.to_string(),
        }
        .encode(b)
    })
}

pub fn control_notification(session_ids: &[i64]) -> Bytes {
    encode(|b| {
        ControlNotification {
            library_id: LIBRARY_ID,
            session_ids: session_ids.to_vec(),
        }
        .encode(b)
    })
}

pub fn catchup(connection_id: i64, message_count: u64) -> Bytes {
    encode(|b| {
        Catchup {
            library_id: LIBRARY_ID,
            connection_id,
            message_count,
        }
        .encode(b)
    })
}

pub fn sent_position(position: i64) -> Bytes {
    encode(|b| {
        NewSentPosition {
            library_id: LIBRARY_ID,
            position,
        }
        .encode(b)
    })
}
