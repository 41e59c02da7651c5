// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::{debug, warn};

/// Heartbeat-based up/down detection for the engine endpoint.
///
/// The engine publishes `ApplicationHeartbeat` frames; going longer than
/// `timeout_ms` without one flips the detector to down, exactly once per
/// outage. The first heartbeat after an outage flips it back up.
#[derive(Debug)]
pub struct LivenessDetector {
    timeout_ms: i64,
    last_heartbeat_ms: i64,
    connected: bool,
}

impl LivenessDetector {
    pub fn new(timeout_ms: i64) -> Self {
        Self {
            timeout_ms,
            last_heartbeat_ms: 0,
            connected: false,
        }
    }

    pub fn on_heartbeat(&mut self, now_ms: i64) {
        self.last_heartbeat_ms = now_ms;
        if !self.connected {
            debug!(now_ms, "engine is up");
            self.connected = true;
        }
    }

    /// Returns true (and fires `on_disconnect`) on the single tick where the
    /// timeout is first exceeded.
    pub fn poll(&mut self, now_ms: i64, on_disconnect: impl FnOnce()) -> bool {
        if self.connected && now_ms - self.last_heartbeat_ms > self.timeout_ms {
            warn!(
                now_ms,
                last_heartbeat_ms = self.last_heartbeat_ms,
                timeout_ms = self.timeout_ms,
                "engine liveness lost"
            );
            self.connected = false;
            on_disconnect();
            return true;
        }
        false
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}
