// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{thread, time::Duration};

use chrono::Utc;
use rand::RngExt;

/// Millisecond wall-clock used by the poller. Abstracted so tests can drive
/// time by hand.
pub trait EpochClock {
    fn time_ms(&self) -> i64;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEpochClock;

impl EpochClock for SystemEpochClock {
    fn time_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Generates the starting value for the correlation-id counter: a random
/// positive 64-bit integer well away from the overflow boundary, so ids stay
/// positive and unique across library restarts.
pub fn generate_correlation_seed() -> i64 {
    rand::rng().random_range(1..=i64::MAX / 2)
}

/// Back-off applied between transport polls while the connect loop waits for
/// an engine heartbeat. The caller owns the thread; `Sleep` and `Yield` give
/// it back to the OS, `Busy` spins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStrategy {
    Busy,
    Yield,
    Sleep(Duration),
}

impl IdleStrategy {
    pub fn idle(&self) {
        match self {
            IdleStrategy::Busy => {},
            IdleStrategy::Yield => thread::yield_now(),
            IdleStrategy::Sleep(d) => thread::sleep(*d),
        }
    }
}

impl Default for IdleStrategy {
    fn default() -> Self {
        IdleStrategy::Sleep(Duration::from_millis(1))
    }
}
