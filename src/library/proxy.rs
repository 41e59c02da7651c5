// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::rc::Rc;

use bytes::BytesMut;
use tracing::debug;

use crate::{
    models::connect::LibraryConnect,
    transport::OutboundPublication,
};

/// Publishes library-to-engine control frames.
///
/// The proxy owns the outbound publication directly, so reply handles and the
/// connect loop can publish without holding a reference back to the library.
#[derive(Clone)]
pub struct GatewayProxy {
    library_id: u32,
    publication: Rc<dyn OutboundPublication>,
}

impl std::fmt::Debug for GatewayProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayProxy")
            .field("library_id", &self.library_id)
            .finish()
    }
}

impl GatewayProxy {
    pub fn new(library_id: u32, publication: Rc<dyn OutboundPublication>) -> Self {
        Self {
            library_id,
            publication,
        }
    }

    #[inline]
    pub fn library_id(&self) -> u32 {
        self.library_id
    }

    #[inline]
    pub fn publication(&self) -> &dyn OutboundPublication {
        self.publication.as_ref()
    }

    /// Offers a pre-encoded frame; negative return means back-pressure.
    pub fn offer(&self, frame: &[u8]) -> i64 {
        self.publication.offer(frame)
    }

    /// Encodes and offers the connect handshake.
    pub fn library_connect(&self, correlation_id: i64) -> i64 {
        let msg = LibraryConnect {
            library_id: self.library_id,
            correlation_id,
        };
        let mut buf = BytesMut::with_capacity(32);
        msg.encode(&mut buf);
        let position = self.publication.offer(&buf);
        debug!(correlation_id, position, "offered LibraryConnect");
        position
    }
}
