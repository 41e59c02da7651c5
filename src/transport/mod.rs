// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Seam between the library and the engine's log-structured transport.
//!
//! The real transport (shared memory or UDP) lives outside this crate; the
//! library only relies on the two traits below. Both sides of the contract
//! are position-aware: every inbound fragment carries the monotonically
//! increasing stream position it was published at, and `offer` returns the
//! new stream position on success or a negative back-pressure code.

pub mod memory;

use anyhow::Result;

/// `offer` result: the publication ring has no space right now; retry later.
pub const BACK_PRESSURED: i64 = -1;
/// `offer` result: the publication is not connected to an engine.
pub const NOT_CONNECTED: i64 = -2;

/// Disposition returned by fragment handlers and user callbacks.
///
/// `Abort` back-pressures the transport: the fragment is redelivered on the
/// next poll, so any handler returning it must be idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Continue,
    Abort,
}

/// Receives one fragment at a time from an [`InboundSubscription`] drain.
pub trait FragmentHandler {
    fn on_fragment(&mut self, frame: &[u8], position: i64) -> FlowAction;
}

/// The engine-to-library half of the control stream.
pub trait InboundSubscription {
    /// Delivers up to `fragment_limit` fragments in publication order and
    /// returns how many were consumed. A fragment whose handler returned
    /// [`FlowAction::Abort`] is not consumed and stops the drain.
    fn poll(&mut self, handler: &mut dyn FragmentHandler, fragment_limit: usize)
    -> usize;

    /// Points the subscription at `channel`, tearing down any previous
    /// stream. Idempotent when already attached to `channel`.
    fn reconnect(&mut self, channel: &str) -> Result<()>;
}

/// The library-to-engine half of the control stream.
pub trait OutboundPublication {
    /// Attempts to publish one frame. Returns the new stream position, or a
    /// negative code ([`BACK_PRESSURED`], [`NOT_CONNECTED`]); callers retry
    /// within a bounded window and must not silently drop.
    fn offer(&self, frame: &[u8]) -> i64;

    /// Points the publication at `channel`. Idempotent when already attached.
    fn reconnect(&self, channel: &str) -> Result<()>;
}
