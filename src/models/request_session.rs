// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I32, I64, Immutable, IntoBytes, KnownLayout, LittleEndian,
    U32,
};

use crate::models::{
    frame::put_frame_header, message_type::MessageType, release::SessionReplyStatus,
};

/// Fixed block of `RequestSession`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RequestSessionBlock {
    pub library_id: U32<LittleEndian>,
    reserved: [u8; 4],
    pub session_id: I64<LittleEndian>,
    pub correlation_id: I64<LittleEndian>,
    pub last_received_sequence_number: I32<LittleEndian>,
    reserved2: [u8; 4],
}

/// Asks the engine to transfer ownership of an engine-held session to this
/// library. Accepted requests are followed by `ManageConnection` + `Logon`
/// and optionally a `Catchup` replay down to `last_received_sequence_number`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSession {
    pub library_id: u32,
    pub session_id: i64,
    pub correlation_id: i64,
    pub last_received_sequence_number: i32,
}

impl RequestSession {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = RequestSessionBlock {
            library_id: U32::new(self.library_id),
            reserved: [0; 4],
            session_id: I64::new(self.session_id),
            correlation_id: I64::new(self.correlation_id),
            last_received_sequence_number: I32::new(self.last_received_sequence_number),
            reserved2: [0; 4],
        };
        put_frame_header(out, MessageType::RequestSession, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match RequestSessionBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read RequestSession block: {e}"),
        };
        Ok(Self {
            library_id: b.library_id.get(),
            session_id: b.session_id.get(),
            correlation_id: b.correlation_id.get(),
            last_received_sequence_number: b.last_received_sequence_number.get(),
        })
    }
}

/// Fixed block of `RequestSessionReply`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RequestSessionReplyBlock {
    pub library_id: U32<LittleEndian>,
    pub status: u8,
    reserved: [u8; 3],
    pub reply_to_id: I64<LittleEndian>,
}

/// Engine acknowledgement of a `RequestSession`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSessionReply {
    pub library_id: u32,
    pub status: SessionReplyStatus,
    pub reply_to_id: i64,
}

impl RequestSessionReply {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = RequestSessionReplyBlock {
            library_id: U32::new(self.library_id),
            status: self.status as u8,
            reserved: [0; 3],
            reply_to_id: I64::new(self.reply_to_id),
        };
        put_frame_header(out, MessageType::RequestSessionReply, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match RequestSessionReplyBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read RequestSessionReply block: {e}"),
        };
        let status = match SessionReplyStatus::from_u8(b.status) {
            Some(s) => s,
            None => bail!("RequestSessionReply: invalid status {}", b.status),
        };
        Ok(Self {
            library_id: b.library_id.get(),
            status,
            reply_to_id: b.reply_to_id.get(),
        })
    }
}
