// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connect/failover bookkeeping.
//!
//! The wait-for-heartbeat loop itself lives on the library (it must drive the
//! transport); this type owns everything the loop and the dispatcher share:
//! the channel rotation, the current connect correlation id, leader-redirect
//! flags and errors latched for the in-progress attempt.

use tracing::{debug, info};

use crate::models::{connect::NotLeader, error::EngineErrorType};

/// Round-robin over the configured engine channels, with a leader-redirect
/// override that may point outside the configured list.
#[derive(Debug)]
pub struct ChannelRotation {
    configured: Vec<String>,
    cursor: usize,
    current: String,
}

impl ChannelRotation {
    pub fn new(configured: Vec<String>) -> Self {
        debug_assert!(!configured.is_empty());
        let current = configured[0].clone();
        Self {
            configured,
            cursor: 0,
            current,
        }
    }

    #[inline]
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn len(&self) -> usize {
        self.configured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configured.is_empty()
    }

    /// Advances to the next configured channel.
    pub fn advance(&mut self) -> &str {
        self.cursor = (self.cursor + 1) % self.configured.len();
        self.current = self.configured[self.cursor].clone();
        &self.current
    }

    /// Jumps to a leader-hinted channel; the round-robin cursor realigns when
    /// the hint is one of the configured channels.
    pub fn switch_to(&mut self, channel: &str) {
        if let Some(i) = self.configured.iter().position(|c| c == channel) {
            self.cursor = i;
        }
        self.current = channel.to_string();
    }
}

/// Shared state of the connect/failover controller.
#[derive(Debug)]
pub struct ConnectController {
    rotation: ChannelRotation,
    clustered: bool,
    streams_initialized: bool,
    connecting: bool,
    channel_changed: bool,
    connect_correlation_id: i64,
    latched_error: Option<(EngineErrorType, String)>,
}

impl ConnectController {
    pub fn new(channels: Vec<String>) -> Self {
        let clustered = channels.len() > 1;
        Self {
            rotation: ChannelRotation::new(channels),
            clustered,
            streams_initialized: false,
            connecting: false,
            channel_changed: false,
            connect_correlation_id: 0,
            latched_error: None,
        }
    }

    #[inline]
    pub fn clustered(&self) -> bool {
        self.clustered
    }

    #[inline]
    pub fn current_channel(&self) -> &str {
        self.rotation.current()
    }

    pub fn advance_channel(&mut self) -> &str {
        let channel = self.rotation.advance();
        info!(channel, "rotating to next engine channel");
        channel
    }

    /// Whether streams must be (re)attached before the next connect attempt.
    /// Single-engine deployments share streams across reconnects.
    pub fn needs_stream_initialization(&self) -> bool {
        self.clustered || !self.streams_initialized
    }

    pub fn mark_streams_initialized(&mut self) {
        self.streams_initialized = true;
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn set_connecting(&mut self, connecting: bool) {
        self.connecting = connecting;
        if !connecting {
            self.latched_error = None;
            self.channel_changed = false;
        }
    }

    pub fn begin_attempt(&mut self, correlation_id: i64) {
        self.connect_correlation_id = correlation_id;
        self.channel_changed = false;
    }

    #[inline]
    pub fn connect_correlation_id(&self) -> i64 {
        self.connect_correlation_id
    }

    /// Applies a leader redirect. Replies older than the current connect
    /// attempt are stale and ignored.
    pub fn on_not_leader(&mut self, msg: &NotLeader) {
        if msg.reply_to_id < self.connect_correlation_id {
            debug!(
                reply_to_id = msg.reply_to_id,
                connect_correlation_id = self.connect_correlation_id,
                "ignoring stale NotLeader"
            );
            return;
        }
        if msg.library_channel.is_empty() {
            self.advance_channel();
        } else {
            info!(channel = %msg.library_channel, "redirected to leader channel");
            self.rotation.switch_to(&msg.library_channel);
        }
        self.channel_changed = true;
    }

    /// True once per redirect; consumed by the connect loop.
    pub fn take_channel_changed(&mut self) -> bool {
        std::mem::take(&mut self.channel_changed)
    }

    /// Stores an engine error that arrived without a matching reply handle
    /// while a connect attempt is in flight.
    pub fn latch_error(&mut self, kind: EngineErrorType, message: String) {
        self.latched_error = Some((kind, message));
    }

    pub fn take_latched_error(&mut self) -> Option<(EngineErrorType, String)> {
        self.latched_error.take()
    }
}
