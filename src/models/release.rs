// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I32, I64, Immutable, IntoBytes, KnownLayout, LittleEndian,
    U32,
};

use crate::{
    models::{
        frame::{VarReader, put_frame_header, put_var},
        message_type::MessageType,
    },
    session::session::SessionState,
};

/// Outcome of a release or request-session operation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionReplyStatus {
    Ok = 0,
    UnknownSession = 1,
    OtherSessionOwner = 2,
    SessionNotLoggedIn = 3,
}

impl SessionReplyStatus {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::UnknownSession),
            2 => Some(Self::OtherSessionOwner),
            3 => Some(Self::SessionNotLoggedIn),
            _ => None,
        }
    }
}

/// Fixed block of `ReleaseSession`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ReleaseSessionBlock {
    pub library_id: U32<LittleEndian>,
    pub state: u8,
    reserved: [u8; 3],
    pub connection_id: I64<LittleEndian>,
    pub correlation_id: I64<LittleEndian>,
    pub heartbeat_interval_ms: U32<LittleEndian>,
    pub last_sent_sequence_number: I32<LittleEndian>,
    pub last_received_sequence_number: I32<LittleEndian>,
    reserved2: [u8; 4],
}

/// Returns ownership of a session to the engine, carrying the full session
/// snapshot so the engine-side state machine can continue it seamlessly.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSession {
    pub library_id: u32,
    pub state: SessionState,
    pub connection_id: i64,
    pub correlation_id: i64,
    pub heartbeat_interval_ms: u32,
    pub last_sent_sequence_number: i32,
    pub last_received_sequence_number: i32,
    pub username: String,
    pub password: String,
}

impl ReleaseSession {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = ReleaseSessionBlock {
            library_id: U32::new(self.library_id),
            state: self.state as u8,
            reserved: [0; 3],
            connection_id: I64::new(self.connection_id),
            correlation_id: I64::new(self.correlation_id),
            heartbeat_interval_ms: U32::new(self.heartbeat_interval_ms),
            last_sent_sequence_number: I32::new(self.last_sent_sequence_number),
            last_received_sequence_number: I32::new(self.last_received_sequence_number),
            reserved2: [0; 4],
        };
        put_frame_header(out, MessageType::ReleaseSession, block.as_bytes());
        put_var(out, self.username.as_bytes());
        put_var(out, self.password.as_bytes());
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match ReleaseSessionBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read ReleaseSession block: {e}"),
        };
        let state = match SessionState::from_u8(b.state) {
            Some(s) => s,
            None => bail!("ReleaseSession: invalid session state {}", b.state),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            state,
            connection_id: b.connection_id.get(),
            correlation_id: b.correlation_id.get(),
            heartbeat_interval_ms: b.heartbeat_interval_ms.get(),
            last_sent_sequence_number: b.last_sent_sequence_number.get(),
            last_received_sequence_number: b.last_received_sequence_number.get(),
            username: vars.next_str()?,
            password: vars.next_str()?,
        })
    }
}

/// Fixed block of `ReleaseSessionReply`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ReleaseSessionReplyBlock {
    pub library_id: U32<LittleEndian>,
    pub status: u8,
    reserved: [u8; 3],
    pub reply_to_id: I64<LittleEndian>,
    pub connection_id: I64<LittleEndian>,
}

/// Engine acknowledgement of a `ReleaseSession`. On `Ok` the library drops
/// the session locally; ownership now lives with the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSessionReply {
    pub library_id: u32,
    pub status: SessionReplyStatus,
    pub reply_to_id: i64,
    pub connection_id: i64,
}

impl ReleaseSessionReply {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = ReleaseSessionReplyBlock {
            library_id: U32::new(self.library_id),
            status: self.status as u8,
            reserved: [0; 3],
            reply_to_id: I64::new(self.reply_to_id),
            connection_id: I64::new(self.connection_id),
        };
        put_frame_header(out, MessageType::ReleaseSessionReply, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match ReleaseSessionReplyBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read ReleaseSessionReply block: {e}"),
        };
        let status = match SessionReplyStatus::from_u8(b.status) {
            Some(s) => s,
            None => bail!("ReleaseSessionReply: invalid status {}", b.status),
        };
        Ok(Self {
            library_id: b.library_id.get(),
            status,
            reply_to_id: b.reply_to_id.get(),
            connection_id: b.connection_id.get(),
        })
    }
}
