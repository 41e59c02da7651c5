// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-memory transport pair used by the test suites and example harnesses.
//!
//! Both halves share one state cell on the poller thread; positions advance
//! by frame length like a real log-structured stream. The engine side of a
//! test drives [`EngineEndpoint`] to enqueue frames and inspect what the
//! library published.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use anyhow::Result;
use bytes::Bytes;

use crate::transport::{
    BACK_PRESSURED, FlowAction, FragmentHandler, InboundSubscription,
    OutboundPublication,
};

#[derive(Debug, Default)]
struct Shared {
    to_library: VecDeque<(Bytes, i64)>,
    to_engine: VecDeque<Bytes>,
    inbound_position: i64,
    outbound_position: i64,
    channel: Option<String>,
    channel_history: Vec<String>,
    /// Number of upcoming `offer` calls to reject with `BACK_PRESSURED`.
    back_pressure_budget: usize,
}

/// Test-side handle: what a stub engine needs to talk to one library.
#[derive(Debug, Clone, Default)]
pub struct EngineEndpoint {
    shared: Rc<RefCell<Shared>>,
}

impl EngineEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscription(&self) -> MemorySubscription {
        MemorySubscription {
            shared: Rc::clone(&self.shared),
        }
    }

    pub fn publication(&self) -> MemoryPublication {
        MemoryPublication {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Publishes one frame onto the engine-to-library stream.
    pub fn enqueue(&self, frame: Bytes) {
        let mut s = self.shared.borrow_mut();
        let position = s.inbound_position + frame.len() as i64;
        s.inbound_position = position;
        s.to_library.push_back((frame, position));
    }

    /// Pops the next frame the library published, if any.
    pub fn next_outbound(&self) -> Option<Bytes> {
        self.shared.borrow_mut().to_engine.pop_front()
    }

    pub fn outbound_len(&self) -> usize {
        self.shared.borrow().to_engine.len()
    }

    /// Channel the library is currently attached to.
    pub fn channel(&self) -> Option<String> {
        self.shared.borrow().channel.clone()
    }

    /// Every channel the library attached to, in order.
    pub fn channel_history(&self) -> Vec<String> {
        self.shared.borrow().channel_history.clone()
    }

    /// Makes the next `count` offers fail with `BACK_PRESSURED`.
    pub fn push_back_pressure(&self, count: usize) {
        self.shared.borrow_mut().back_pressure_budget = count;
    }
}

/// Library-side inbound half.
#[derive(Debug)]
pub struct MemorySubscription {
    shared: Rc<RefCell<Shared>>,
}

impl InboundSubscription for MemorySubscription {
    fn poll(
        &mut self,
        handler: &mut dyn FragmentHandler,
        fragment_limit: usize,
    ) -> usize {
        let mut consumed = 0;
        while consumed < fragment_limit {
            let next = self.shared.borrow_mut().to_library.pop_front();
            let Some((frame, position)) = next else {
                break;
            };
            match handler.on_fragment(&frame, position) {
                FlowAction::Continue => consumed += 1,
                FlowAction::Abort => {
                    // Back-pressured: put the fragment back for redelivery.
                    self.shared
                        .borrow_mut()
                        .to_library
                        .push_front((frame, position));
                    break;
                },
            }
        }
        consumed
    }

    fn reconnect(&mut self, channel: &str) -> Result<()> {
        let mut s = self.shared.borrow_mut();
        if s.channel.as_deref() != Some(channel) {
            s.channel = Some(channel.to_string());
            s.channel_history.push(channel.to_string());
        }
        Ok(())
    }
}

/// Library-side outbound half.
#[derive(Debug)]
pub struct MemoryPublication {
    shared: Rc<RefCell<Shared>>,
}

impl OutboundPublication for MemoryPublication {
    fn offer(&self, frame: &[u8]) -> i64 {
        let mut s = self.shared.borrow_mut();
        if s.back_pressure_budget > 0 {
            s.back_pressure_budget -= 1;
            return BACK_PRESSURED;
        }
        s.outbound_position += frame.len() as i64;
        let position = s.outbound_position;
        s.to_engine.push_back(Bytes::copy_from_slice(frame));
        position
    }

    fn reconnect(&self, _channel: &str) -> Result<()> {
        Ok(())
    }
}
