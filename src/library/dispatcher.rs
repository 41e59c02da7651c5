// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Demultiplexes the inbound control stream onto the registry, the reply
//! tracker, the liveness detector, the connect controller and the user
//! callbacks.
//!
//! Constructed fresh for each drain from disjoint borrows of the library's
//! fields. Handlers that return [`FlowAction::Abort`] leave the fragment on
//! the transport for redelivery and are written to be idempotent.

use tracing::{debug, warn};

use crate::{
    library::{
        connector::ConnectController,
        handler::LibraryHandler,
        liveness::LivenessDetector,
        replies::{ReplyKind, ReplyPayload, ReplyTracker, ResolveOutcome},
    },
    models::{
        connect::{ApplicationHeartbeat, NotLeader},
        control::{Catchup, ControlNotification, NewSentPosition},
        disconnect::Disconnect,
        error::{EngineError, EngineErrorType},
        fix_message::FixMessage,
        logon::{Logon, LogonStatus},
        manage::{ConnectionType, ManageConnection},
        parse::{ControlFrame, ENGINE_LIBRARY_ID, EngineMessage},
        release::{ReleaseSessionReply, SessionReplyStatus},
        request_session::RequestSessionReply,
    },
    session::{registry::SessionRegistry, session::Session, subscriber::SessionSubscriber},
    transport::{FlowAction, FragmentHandler},
};

pub struct Dispatcher<'a> {
    pub library_id: u32,
    pub now_ms: i64,
    pub registry: &'a mut SessionRegistry,
    pub tracker: &'a mut ReplyTracker,
    pub liveness: &'a mut LivenessDetector,
    pub connector: &'a mut ConnectController,
    pub handler: &'a mut dyn LibraryHandler,
}

impl FragmentHandler for Dispatcher<'_> {
    fn on_fragment(&mut self, frame: &[u8], _position: i64) -> FlowAction {
        let msg = match EngineMessage::decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("dropping undecodable control frame: {e:#}");
                return FlowAction::Continue;
            },
        };

        // Multi-tenant streams: skip frames addressed to other libraries.
        // Logon is exempt because engine-owned sessions are announced with
        // the engine's own id.
        let for_us = msg.library_id() == self.library_id
            || matches!(&msg, EngineMessage::Logon(_));
        if !for_us {
            return FlowAction::Continue;
        }

        match msg {
            EngineMessage::ManageConnection(m) => self.on_manage_connection(m),
            EngineMessage::Logon(m) => self.on_logon(m),
            EngineMessage::FixMessage(m) => self.on_fix_message(m),
            EngineMessage::Disconnect(m) => self.on_disconnect(m),
            EngineMessage::EngineError(m) => self.on_engine_error(m),
            EngineMessage::ApplicationHeartbeat(m) => self.on_heartbeat(m),
            EngineMessage::ReleaseSessionReply(m) => self.on_release_reply(m),
            EngineMessage::RequestSessionReply(m) => self.on_request_session_reply(m),
            EngineMessage::Catchup(m) => self.on_catchup(m),
            EngineMessage::NewSentPosition(m) => self.on_sent_position(m),
            EngineMessage::NotLeader(m) => self.on_not_leader(m),
            EngineMessage::ControlNotification(m) => self.on_control_notification(m),
        }
    }
}

impl Dispatcher<'_> {
    fn on_manage_connection(&mut self, msg: ManageConnection) -> FlowAction {
        let mut session = Session::from_manage(&msg);

        match msg.connection_type {
            ConnectionType::Initiator => {
                // The hand-off doubles as the reply to the InitiateConnection
                // request that started it.
                match self.tracker.resolve(
                    msg.reply_to_id,
                    ReplyKind::Initiate,
                    ReplyPayload::Session {
                        connection_id: msg.connection_id,
                        session_id: msg.session_id,
                    },
                ) {
                    ResolveOutcome::Resolved {
                        credentials: Some((username, password)),
                    } => session.set_credentials(&username, &password),
                    ResolveOutcome::Resolved { credentials: None } => {},
                    ResolveOutcome::KindMismatch(actual) => {
                        // Correlation ids are never reused while pending, so a
                        // mismatched kind is a protocol violation by the engine.
                        self.handler.on_error(
                            EngineErrorType::Other,
                            self.library_id,
                            &format!(
                                "ManageConnection reply_to_id {} matches a {actual:?} \
                                 request",
                                msg.reply_to_id
                            ),
                        );
                    },
                    ResolveOutcome::NotFound => {
                        debug!(
                            reply_to_id = msg.reply_to_id,
                            "ManageConnection without outstanding initiate (late reply?)"
                        );
                    },
                }
            },
            ConnectionType::Acceptor => {
                debug!(
                    connection_id = msg.connection_id,
                    address = %msg.address,
                    "accepted connection handed over"
                );
            },
        }

        if let Err(e) = self.registry.add(SessionSubscriber::new(session)) {
            self.handler.on_error(
                EngineErrorType::DuplicateSession,
                self.library_id,
                &e.to_string(),
            );
        }
        FlowAction::Continue
    }

    fn on_logon(&mut self, msg: Logon) -> FlowAction {
        let broadcast = msg.status == LogonStatus::LibraryNotification
            || msg.library_id == ENGINE_LIBRARY_ID;
        if broadcast {
            self.handler.on_session_exists(
                msg.session_id,
                &msg.local_comp_id,
                &msg.remote_comp_id,
            );
            return FlowAction::Continue;
        }
        if msg.library_id != self.library_id {
            return FlowAction::Continue;
        }

        match self.registry.get_mut(msg.connection_id) {
            Some(subscriber) => {
                if subscriber.is_bound() {
                    // Redelivered after an abort further down the drain; the
                    // handler is already attached.
                    return FlowAction::Continue;
                }
                subscriber.session.on_logon(&msg);
                let session_handler =
                    self.handler.on_session_acquired(&mut subscriber.session);
                subscriber.bind(session_handler);
                FlowAction::Continue
            },
            None => {
                self.handler.on_error(
                    EngineErrorType::UnknownSession,
                    self.library_id,
                    &format!("logon for unknown connection {}", msg.connection_id),
                );
                FlowAction::Continue
            },
        }
    }

    fn on_fix_message(&mut self, msg: FixMessage) -> FlowAction {
        match self.registry.get_mut(msg.connection_id) {
            Some(subscriber) => subscriber.on_fix_message(&msg, self.now_ms),
            None => {
                warn!(
                    connection_id = msg.connection_id,
                    "FIX message for unknown connection, dropping"
                );
                FlowAction::Continue
            },
        }
    }

    fn on_disconnect(&mut self, msg: Disconnect) -> FlowAction {
        let Some(subscriber) = self.registry.take(msg.connection_id) else {
            debug!(
                connection_id = msg.connection_id,
                "disconnect for unknown connection"
            );
            return FlowAction::Continue;
        };
        match self.handler.on_disconnect(&subscriber.session, msg.reason) {
            FlowAction::Abort => {
                // Redelivered on the next poll; nothing else has changed.
                self.registry.restore(subscriber);
                FlowAction::Abort
            },
            FlowAction::Continue => {
                self.registry.discard(subscriber);
                FlowAction::Continue
            },
        }
    }

    fn on_engine_error(&mut self, msg: EngineError) -> FlowAction {
        if self.tracker.fail(msg.reply_to_id, msg.error_type, &msg.message) {
            return FlowAction::Continue;
        }
        if self.connector.is_connecting() {
            self.connector.latch_error(msg.error_type, msg.message);
            return FlowAction::Continue;
        }
        self.handler
            .on_error(msg.error_type, msg.library_id, &msg.message)
    }

    fn on_heartbeat(&mut self, _msg: ApplicationHeartbeat) -> FlowAction {
        self.liveness.on_heartbeat(self.now_ms);
        FlowAction::Continue
    }

    fn on_release_reply(&mut self, msg: ReleaseSessionReply) -> FlowAction {
        let resolved = self.tracker.resolve(
            msg.reply_to_id,
            ReplyKind::Release,
            ReplyPayload::SessionReply(msg.status),
        );
        if matches!(resolved, ResolveOutcome::Resolved { .. })
            && msg.status == SessionReplyStatus::Ok
        {
            // Ownership moved back to the engine; forget the session.
            if let Some(subscriber) = self.registry.take(msg.connection_id) {
                self.registry.discard(subscriber);
            }
        }
        FlowAction::Continue
    }

    fn on_request_session_reply(&mut self, msg: RequestSessionReply) -> FlowAction {
        self.tracker.resolve(
            msg.reply_to_id,
            ReplyKind::RequestSession,
            ReplyPayload::SessionReply(msg.status),
        );
        FlowAction::Continue
    }

    fn on_catchup(&mut self, msg: Catchup) -> FlowAction {
        match self.registry.get_mut(msg.connection_id) {
            Some(subscriber) => subscriber.start_catchup(msg.message_count),
            None => warn!(
                connection_id = msg.connection_id,
                "catch-up for unknown connection"
            ),
        }
        FlowAction::Continue
    }

    fn on_sent_position(&mut self, msg: NewSentPosition) -> FlowAction {
        self.handler.on_send_completed(msg.position)
    }

    fn on_not_leader(&mut self, msg: NotLeader) -> FlowAction {
        self.connector.on_not_leader(&msg);
        FlowAction::Continue
    }

    fn on_control_notification(&mut self, msg: ControlNotification) -> FlowAction {
        let (timed_out, unknown) = self.registry.reconcile(&msg.session_ids);
        for subscriber in &timed_out {
            self.handler.on_timeout(&subscriber.session);
        }
        if !unknown.is_empty() {
            self.handler.on_error(
                EngineErrorType::UnknownSession,
                self.library_id,
                &format!("engine lists sessions this library does not hold: {unknown:?}"),
            );
        }
        FlowAction::Continue
    }
}
