// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Application-facing callback traits. All callbacks run on the poller
//! thread and must not reenter library methods.

use crate::{
    models::{disconnect::DisconnectReason, error::EngineErrorType},
    session::session::Session,
    transport::FlowAction,
};

/// Per-session callbacks, bound when the library acquires the session.
pub trait SessionHandler {
    /// One FIX message for this session, in transport order. `body` is the
    /// raw FIX payload; the library does not parse it.
    #[allow(clippy::too_many_arguments)]
    fn on_message(
        &mut self,
        body: &[u8],
        session: &Session,
        sequence_index: i32,
        fix_message_type: i32,
        timestamp_ns: i64,
        position: i64,
    ) -> FlowAction;

    /// The engine's view of whether this session's outbound flow lags.
    fn on_slow_status(&mut self, _session: &Session, _is_slow: bool) {}
}

/// Library-wide callbacks.
pub trait LibraryHandler {
    /// A session completed its FIX-level logon and now belongs to this
    /// library; the returned handler receives its messages.
    fn on_session_acquired(&mut self, session: &mut Session) -> Box<dyn SessionHandler>;

    /// A session owned elsewhere was announced; no ownership change.
    fn on_session_exists(
        &mut self,
        _session_id: i64,
        _local_comp_id: &str,
        _remote_comp_id: &str,
    ) {
    }

    /// A connection owned by this library dropped. Returning
    /// [`FlowAction::Abort`] leaves the session registered and redelivers the
    /// event on the next poll.
    fn on_disconnect(&mut self, _session: &Session, _reason: DisconnectReason) -> FlowAction {
        FlowAction::Continue
    }

    /// A session was closed because the engine no longer lists it for this
    /// library.
    fn on_timeout(&mut self, _session: &Session) {}

    /// An engine error that no outstanding reply claimed.
    fn on_error(
        &mut self,
        _kind: EngineErrorType,
        _library_id: u32,
        _message: &str,
    ) -> FlowAction {
        FlowAction::Continue
    }

    /// The engine's outbound stream reached a new durable position.
    fn on_send_completed(&mut self, _position: i64) -> FlowAction {
        FlowAction::Continue
    }
}
