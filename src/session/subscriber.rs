// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use crate::{
    library::handler::SessionHandler,
    models::fix_message::{FixMessage, MessageStatus},
    session::session::Session,
    transport::FlowAction,
};

/// Couples a [`Session`] with the handler the application bound to it and the
/// delivery-side counters. Lives exactly as long as the underlying
/// connection.
pub struct SessionSubscriber {
    pub session: Session,
    handler: OnceCell<Box<dyn SessionHandler>>,
    /// Messages still expected from a catch-up replay; zero when live.
    catchup_remaining: u64,
    last_message_ms: i64,
}

impl std::fmt::Debug for SessionSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSubscriber")
            .field("session", &self.session)
            .field("bound", &self.handler.get().is_some())
            .field("catchup_remaining", &self.catchup_remaining)
            .finish()
    }
}

impl SessionSubscriber {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            handler: OnceCell::new(),
            catchup_remaining: 0,
            last_message_ms: 0,
        }
    }

    /// Binds the application handler; once bound it stays for the life of
    /// the connection.
    pub fn bind(&mut self, handler: Box<dyn SessionHandler>) {
        if self.handler.set(handler).is_err() {
            warn!(
                session_id = self.session.session_id(),
                "session handler already bound, keeping the original"
            );
        }
    }

    pub fn is_bound(&self) -> bool {
        self.handler.get().is_some()
    }

    /// Starts buffering a catch-up replay of `message_count` messages.
    pub fn start_catchup(&mut self, message_count: u64) {
        debug!(
            session_id = self.session.session_id(),
            message_count, "catch-up replay starting"
        );
        self.catchup_remaining = message_count;
    }

    pub fn is_catching_up(&self) -> bool {
        self.catchup_remaining > 0
    }

    /// Delivers one FIX message. State only advances when the handler
    /// consumes it, so an aborted fragment replays with identical effects.
    pub fn on_fix_message(&mut self, msg: &FixMessage, now_ms: i64) -> FlowAction {
        if msg.slow != self.session.is_slow() {
            self.session.set_slow(msg.slow);
            if let Some(handler) = self.handler.get_mut() {
                handler.on_slow_status(&self.session, msg.slow);
            }
        }

        let action = match self.handler.get_mut() {
            Some(handler) => handler.on_message(
                &msg.body,
                &self.session,
                msg.sequence_index,
                msg.fix_message_type,
                msg.timestamp_ns,
                msg.position,
            ),
            None => {
                warn!(
                    connection_id = msg.connection_id,
                    "FIX message before session was acquired, dropping"
                );
                FlowAction::Continue
            },
        };

        if action == FlowAction::Continue {
            self.session
                .on_message_received(msg.sequence_index, msg.sequence_number);
            self.last_message_ms = now_ms;
            if msg.status == MessageStatus::CatchupReplay && self.catchup_remaining > 0 {
                self.catchup_remaining -= 1;
                if self.catchup_remaining == 0 {
                    debug!(
                        session_id = self.session.session_id(),
                        "catch-up replay finished"
                    );
                }
            }
        }
        action
    }

    pub fn last_message_ms(&self) -> i64 {
        self.last_message_ms
    }

    /// Per-tick session upkeep.
    pub fn poll(&mut self, now_ms: i64) -> u64 {
        self.session.poll(now_ms)
    }
}
