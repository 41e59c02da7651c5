// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{errors::LibraryError, session::subscriber::SessionSubscriber};

/// Owns every session subscriber of this library instance.
///
/// Two views are kept in step: the `connection_id → subscriber` map used for
/// routing, and the insertion-ordered connection-id sequence the poller walks
/// each tick. A connection id maps to at most one live subscriber.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    subscribers: HashMap<i64, SessionSubscriber>,
    order: Vec<i64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly handed-over session. Duplicate insertion means the
    /// engine and library disagree about ownership and is rejected.
    pub fn add(&mut self, subscriber: SessionSubscriber) -> Result<(), LibraryError> {
        let connection_id = subscriber.session.connection_id();
        if self.subscribers.contains_key(&connection_id) {
            return Err(LibraryError::DuplicateSession(
                subscriber.session.session_id(),
            ));
        }
        self.subscribers.insert(connection_id, subscriber);
        self.order.push(connection_id);
        Ok(())
    }

    pub fn get_mut(&mut self, connection_id: i64) -> Option<&mut SessionSubscriber> {
        self.subscribers.get_mut(&connection_id)
    }

    /// Detaches a subscriber from the routing map, leaving its slot in the
    /// iteration sequence. Pair with [`restore`](Self::restore) (back-pressured
    /// delivery) or [`discard`](Self::discard).
    pub fn take(&mut self, connection_id: i64) -> Option<SessionSubscriber> {
        self.subscribers.remove(&connection_id)
    }

    /// Puts back a subscriber removed with [`take`](Self::take); the aborted
    /// event will be redelivered.
    pub fn restore(&mut self, subscriber: SessionSubscriber) {
        let connection_id = subscriber.session.connection_id();
        self.subscribers.insert(connection_id, subscriber);
    }

    /// Closes a taken subscriber and drops it from the iteration sequence.
    pub fn discard(&mut self, mut subscriber: SessionSubscriber) {
        subscriber.session.close();
        let connection_id = subscriber.session.connection_id();
        self.order.retain(|id| *id != connection_id);
        debug!(
            connection_id,
            session_id = subscriber.session.session_id(),
            "session removed from registry"
        );
    }

    pub fn find_by_session_id(
        &mut self,
        session_id: i64,
    ) -> Option<&mut SessionSubscriber> {
        self.subscribers
            .values_mut()
            .find(|s| s.session.session_id() == session_id)
    }

    pub fn get_by_session_id(&self, session_id: i64) -> Option<&SessionSubscriber> {
        self.subscribers
            .values()
            .find(|s| s.session.session_id() == session_id)
    }

    pub fn session_ids(&self) -> Vec<i64> {
        self.order
            .iter()
            .filter_map(|conn| self.subscribers.get(conn))
            .map(|s| s.session.session_id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Polls every owned session in insertion order. Removals triggered by
    /// callbacks earlier in the tick are tolerated: the sequence is snapshot
    /// and dead ids are skipped.
    pub fn poll_sessions(&mut self, now_ms: i64) -> u64 {
        let snapshot = self.order.clone();
        let mut work = 0;
        for connection_id in snapshot {
            if let Some(subscriber) = self.subscribers.get_mut(&connection_id) {
                work += subscriber.poll(now_ms);
            }
        }
        work
    }

    /// Reconciles against the engine's authoritative session-id set.
    ///
    /// Returns `(timed_out, unknown)`: subscribers closed because the engine
    /// no longer lists them, and ids the engine lists that this library does
    /// not hold.
    pub fn reconcile(
        &mut self,
        authoritative: &[i64],
    ) -> (Vec<SessionSubscriber>, Vec<i64>) {
        let stale: Vec<i64> = self
            .subscribers
            .iter()
            .filter(|(_, s)| !authoritative.contains(&s.session.session_id()))
            .map(|(conn, _)| *conn)
            .collect();

        let mut timed_out = Vec::with_capacity(stale.len());
        for connection_id in stale {
            if let Some(mut subscriber) = self.subscribers.remove(&connection_id) {
                warn!(
                    connection_id,
                    session_id = subscriber.session.session_id(),
                    "session not in engine's authoritative set, timing out"
                );
                subscriber.session.close();
                self.order.retain(|id| *id != connection_id);
                timed_out.push(subscriber);
            }
        }

        let local: Vec<i64> = self.session_ids();
        let unknown: Vec<i64> = authoritative
            .iter()
            .copied()
            .filter(|id| !local.contains(id))
            .collect();

        (timed_out, unknown)
    }

    /// Closes every session; used when the library shuts down.
    pub fn close_all(&mut self) {
        for subscriber in self.subscribers.values_mut() {
            subscriber.session.close();
        }
        self.subscribers.clear();
        self.order.clear();
    }
}
