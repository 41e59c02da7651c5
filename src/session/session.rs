// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::models::{logon::Logon, manage::ManageConnection};

/// Lifecycle of one FIX session as seen by the owning library.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Connecting = 0,
    Connected = 1,
    SentLogon = 2,
    Active = 3,
    AwaitingLogout = 4,
    Disconnected = 5,
}

impl SessionState {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Connecting),
            1 => Some(Self::Connected),
            2 => Some(Self::SentLogon),
            3 => Some(Self::Active),
            4 => Some(Self::AwaitingLogout),
            5 => Some(Self::Disconnected),
            _ => None,
        }
    }
}

/// Full identity of a FIX session: the comp-id pair is the FIX-level
/// identity, the surrogate id is the engine-assigned key. Two ids are the
/// same session iff the surrogates match.
#[derive(Debug, Clone, Eq)]
pub struct CompleteSessionId {
    pub local_comp_id: String,
    pub remote_comp_id: String,
    pub surrogate_id: i64,
}

impl PartialEq for CompleteSessionId {
    fn eq(&self, other: &Self) -> bool {
        self.surrogate_id == other.surrogate_id
    }
}

impl std::hash::Hash for CompleteSessionId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.surrogate_id.hash(state);
    }
}

/// One connected FIX peer owned by this library.
///
/// The FIX-level machine (logon/heartbeat/resend/logout encoding) lives with
/// the application; this type tracks the state the engine and library agree
/// on and is what release-to-gateway snapshots.
#[derive(Debug)]
pub struct Session {
    id: CompleteSessionId,
    connection_id: i64,
    state: SessionState,
    last_sent_sequence_number: i32,
    last_received_sequence_number: i32,
    sequence_index: i32,
    heartbeat_interval_ms: u32,
    library_connected: bool,
    is_slow: bool,
    username: String,
    password: String,
    logout_deadline_ms: Option<i64>,
}

impl Session {
    /// Builds the session announced by a `ManageConnection` hand-off.
    pub fn from_manage(msg: &ManageConnection) -> Self {
        Self {
            id: CompleteSessionId {
                local_comp_id: msg.local_comp_id.clone(),
                remote_comp_id: msg.remote_comp_id.clone(),
                surrogate_id: msg.session_id,
            },
            connection_id: msg.connection_id,
            state: SessionState::Connected,
            last_sent_sequence_number: msg.last_sent_sequence_number,
            last_received_sequence_number: msg.last_received_sequence_number,
            sequence_index: 0,
            heartbeat_interval_ms: msg.heartbeat_interval_ms,
            library_connected: true,
            is_slow: false,
            username: String::new(),
            password: String::new(),
            logout_deadline_ms: None,
        }
    }

    /// Applies the FIX-level logon the engine observed on this connection.
    pub fn on_logon(&mut self, msg: &Logon) {
        if !msg.local_comp_id.is_empty() {
            self.id.local_comp_id = msg.local_comp_id.clone();
        }
        if !msg.remote_comp_id.is_empty() {
            self.id.remote_comp_id = msg.remote_comp_id.clone();
        }
        self.last_sent_sequence_number = msg.last_sent_sequence_number;
        self.last_received_sequence_number = msg.last_received_sequence_number;
        self.state = SessionState::Active;
    }

    /// Records one received FIX message.
    pub fn on_message_received(&mut self, sequence_index: i32, sequence_number: i32) {
        if sequence_index != self.sequence_index {
            // Sequence numbers were reset (re-logon); indexes only grow.
            self.sequence_index = sequence_index;
        }
        self.last_received_sequence_number = sequence_number;
    }

    /// Begins an orderly logout; the session is closed if the engine does not
    /// disconnect it before `deadline_ms`.
    pub fn start_logout(&mut self, deadline_ms: i64) {
        self.state = SessionState::AwaitingLogout;
        self.logout_deadline_ms = Some(deadline_ms);
    }

    pub fn close(&mut self) {
        self.state = SessionState::Disconnected;
        self.library_connected = false;
        self.logout_deadline_ms = None;
    }

    /// Drives time-based transitions; returns the work done this tick.
    pub fn poll(&mut self, now_ms: i64) -> u64 {
        if self.state == SessionState::AwaitingLogout
            && self.logout_deadline_ms.is_some_and(|d| now_ms >= d)
        {
            self.close();
            return 1;
        }
        0
    }

    pub fn set_credentials(&mut self, username: &str, password: &str) {
        self.username = username.to_string();
        self.password = password.to_string();
    }

    #[inline]
    pub fn id(&self) -> &CompleteSessionId {
        &self.id
    }

    #[inline]
    pub fn session_id(&self) -> i64 {
        self.id.surrogate_id
    }

    #[inline]
    pub fn connection_id(&self) -> i64 {
        self.connection_id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn last_sent_sequence_number(&self) -> i32 {
        self.last_sent_sequence_number
    }

    #[inline]
    pub fn last_received_sequence_number(&self) -> i32 {
        self.last_received_sequence_number
    }

    #[inline]
    pub fn sequence_index(&self) -> i32 {
        self.sequence_index
    }

    #[inline]
    pub fn heartbeat_interval_ms(&self) -> u32 {
        self.heartbeat_interval_ms
    }

    #[inline]
    pub fn is_connected_to_library(&self) -> bool {
        self.library_connected
    }

    #[inline]
    pub fn is_slow(&self) -> bool {
        self.is_slow
    }

    pub(crate) fn set_slow(&mut self, is_slow: bool) {
        self.is_slow = is_slow;
    }

    #[inline]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[inline]
    pub fn password(&self) -> &str {
        &self.password
    }
}
