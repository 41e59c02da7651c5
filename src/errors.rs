// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Failures surfaced to callers of the library API.
///
/// Control-plane conditions that the library recovers from internally
/// (NotLeader redirects, replay-index laps, transport back-pressure) never
/// appear here.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The engine referenced a session this library does not own.
    #[error("unknown session: {0}")]
    UnknownSession(i64),

    /// Every configured engine channel was tried and none produced a
    /// heartbeat within the reply timeout.
    #[error("unable to connect to an engine after {attempts} attempts (last channel: {channel})")]
    UnableToConnect { attempts: u32, channel: String },

    /// An attempt to own a session that is already owned elsewhere.
    #[error("duplicate session: {0}")]
    DuplicateSession(i64),

    /// A reply deadline passed before the engine answered.
    #[error("operation timed out after {0}ms")]
    TimedOut(i64),

    /// Programmer error detected at startup or on first use.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The library was closed; close-after-close and any operation on a
    /// closed library land here.
    #[error("library is closed")]
    Closed,
}
