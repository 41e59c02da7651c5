// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Correlation of outbound requests with their eventual engine replies.
//!
//! Every request gets a correlation id from a monotonic counter seeded with a
//! random positive value at startup, so ids stay unique and positive across
//! library restarts. The caller keeps a [`Reply`] handle; the tracker keeps
//! the other reference and resolves it on the poller thread.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    models::{error::EngineErrorType, release::SessionReplyStatus},
    transport::OutboundPublication,
    utils::generate_correlation_seed,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Initiate,
    Release,
    RequestSession,
}

/// Successful payload of a resolved reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    /// An initiated connection was handed over.
    Session { connection_id: i64, session_id: i64 },
    /// Status of a release or request-session operation.
    SessionReply(SessionReplyStatus),
}

/// Terminal-or-pending state observed through a [`Reply`] handle.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Pending,
    Completed(ReplyPayload),
    Errored {
        kind: EngineErrorType,
        message: String,
    },
    TimedOut,
}

impl ReplyOutcome {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReplyOutcome::Pending)
    }
}

#[derive(Debug)]
struct ReplyRecord {
    correlation_id: i64,
    kind: ReplyKind,
    deadline_ms: i64,
    outcome: ReplyOutcome,
    /// Encoded request, re-offered until the publication accepts it.
    request: Bytes,
    published: bool,
    /// Credentials to stamp onto the session an initiate reply creates.
    credentials: Option<(String, String)>,
}

/// Long-lived handle the caller polls for the outcome of an
/// initiate/release/request-session operation.
#[derive(Debug, Clone)]
pub struct Reply {
    record: Rc<RefCell<ReplyRecord>>,
}

impl Reply {
    pub fn correlation_id(&self) -> i64 {
        self.record.borrow().correlation_id
    }

    pub fn kind(&self) -> ReplyKind {
        self.record.borrow().kind
    }

    pub fn outcome(&self) -> ReplyOutcome {
        self.record.borrow().outcome.clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.record.borrow().outcome, ReplyOutcome::Pending)
    }

    pub fn has_completed(&self) -> bool {
        matches!(self.record.borrow().outcome, ReplyOutcome::Completed(_))
    }

    pub fn has_errored(&self) -> bool {
        matches!(self.record.borrow().outcome, ReplyOutcome::Errored { .. })
    }

    pub fn has_timed_out(&self) -> bool {
        matches!(self.record.borrow().outcome, ReplyOutcome::TimedOut)
    }
}

/// Result of matching an inbound reply frame against the outstanding set.
#[derive(Debug)]
pub enum ResolveOutcome {
    /// The handle resolved; credentials travel back for initiate replies.
    Resolved { credentials: Option<(String, String)> },
    /// A handle with this id exists but expects a different reply kind.
    KindMismatch(ReplyKind),
    NotFound,
}

/// Outstanding-request table (single owner thread, no locks).
#[derive(Debug)]
pub struct ReplyTracker {
    counter: i64,
    pending: HashMap<i64, Rc<RefCell<ReplyRecord>>>,
}

impl Default for ReplyTracker {
    fn default() -> Self {
        Self::with_seed(generate_correlation_seed())
    }
}

impl ReplyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: i64) -> Self {
        Self {
            counter: seed,
            pending: HashMap::new(),
        }
    }

    /// Pre-increments and returns the correlation-id counter.
    pub fn next_correlation_id(&mut self) -> i64 {
        self.counter += 1;
        self.counter
    }

    /// Registers an outstanding request under its (already embedded)
    /// correlation id.
    pub fn register(
        &mut self,
        kind: ReplyKind,
        correlation_id: i64,
        deadline_ms: i64,
        request: Bytes,
        credentials: Option<(String, String)>,
    ) -> Reply {
        debug_assert!(!self.pending.contains_key(&correlation_id));
        let record = Rc::new(RefCell::new(ReplyRecord {
            correlation_id,
            kind,
            deadline_ms,
            outcome: ReplyOutcome::Pending,
            request,
            published: false,
            credentials,
        }));
        self.pending.insert(correlation_id, Rc::clone(&record));
        Reply { record }
    }

    /// Resolves the handle registered under `correlation_id` with a success
    /// payload, enforcing that the reply kind matches the request kind.
    pub fn resolve(
        &mut self,
        correlation_id: i64,
        kind: ReplyKind,
        payload: ReplyPayload,
    ) -> ResolveOutcome {
        let actual = match self.pending.get(&correlation_id) {
            None => return ResolveOutcome::NotFound,
            Some(record) => record.borrow().kind,
        };
        if actual != kind {
            warn!(
                correlation_id,
                ?actual,
                expected = ?kind,
                "reply kind mismatch, leaving handle pending"
            );
            return ResolveOutcome::KindMismatch(actual);
        }
        match self.pending.remove(&correlation_id) {
            Some(record) => {
                let mut r = record.borrow_mut();
                r.outcome = ReplyOutcome::Completed(payload);
                debug!(correlation_id, kind = ?r.kind, "reply resolved");
                ResolveOutcome::Resolved {
                    credentials: r.credentials.take(),
                }
            },
            None => ResolveOutcome::NotFound,
        }
    }

    /// Resolves the handle with an engine error. Returns false when no handle
    /// is registered under this id.
    pub fn fail(
        &mut self,
        correlation_id: i64,
        kind: EngineErrorType,
        message: &str,
    ) -> bool {
        match self.pending.remove(&correlation_id) {
            Some(record) => {
                record.borrow_mut().outcome = ReplyOutcome::Errored {
                    kind,
                    message: message.to_string(),
                };
                true
            },
            None => false,
        }
    }

    /// Offers every not-yet-accepted request to the publication; called once
    /// per tick so back-pressured requests retry until their deadline.
    pub fn publish_pending(&mut self, publication: &dyn OutboundPublication) -> u64 {
        let mut work = 0;
        for record in self.pending.values() {
            let mut r = record.borrow_mut();
            if r.published {
                continue;
            }
            let position = publication.offer(&r.request);
            if position >= 0 {
                r.published = true;
                work += 1;
            }
        }
        work
    }

    /// Times out every handle whose deadline passed; removal happens in place
    /// during the iteration.
    pub fn sweep(&mut self, now_ms: i64) -> u64 {
        let before = self.pending.len();
        self.pending.retain(|correlation_id, record| {
            let mut r = record.borrow_mut();
            if now_ms >= r.deadline_ms {
                warn!(correlation_id = *correlation_id, kind = ?r.kind, "reply timed out");
                r.outcome = ReplyOutcome::TimedOut;
                false
            } else {
                true
            }
        });
        (before - self.pending.len()) as u64
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
