// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::{Bytes, BytesMut};
use zerocopy::{
    FromBytes as ZFromBytes, I32, I64, Immutable, IntoBytes, KnownLayout, LittleEndian,
    U32,
};

use crate::models::{
    frame::{VarReader, put_frame_header, put_var},
    message_type::MessageType,
};

/// Delivery status of a forwarded FIX message.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    #[default]
    Ok = 0,
    /// Part of a catch-up replay requested with `Catchup`.
    CatchupReplay = 1,
}

impl MessageStatus {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::CatchupReplay),
            _ => None,
        }
    }
}

/// Fixed block of a forwarded FIX message.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FixMessageBlock {
    pub library_id: U32<LittleEndian>,
    pub status: u8,
    /// Non-zero when the engine currently considers the session slow.
    pub slow: u8,
    reserved: [u8; 2],
    pub connection_id: I64<LittleEndian>,
    pub session_id: I64<LittleEndian>,
    pub sequence_index: I32<LittleEndian>,
    pub fix_message_type: I32<LittleEndian>,
    pub timestamp_ns: I64<LittleEndian>,
    pub position: I64<LittleEndian>,
    pub sequence_number: I32<LittleEndian>,
    reserved2: [u8; 4],
}

/// A FIX application or admin message forwarded from the engine's socket to
/// the owning library. The body is the raw FIX payload; this library never
/// parses it.
#[derive(Debug, Clone, PartialEq)]
pub struct FixMessage {
    pub library_id: u32,
    pub status: MessageStatus,
    pub slow: bool,
    pub connection_id: i64,
    pub session_id: i64,
    pub sequence_index: i32,
    /// Packed FIX MsgType tag value.
    pub fix_message_type: i32,
    pub timestamp_ns: i64,
    /// Stream position of the fragment carrying this message.
    pub position: i64,
    pub sequence_number: i32,
    pub body: Bytes,
}

impl FixMessage {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = FixMessageBlock {
            library_id: U32::new(self.library_id),
            status: self.status as u8,
            slow: self.slow as u8,
            reserved: [0; 2],
            connection_id: I64::new(self.connection_id),
            session_id: I64::new(self.session_id),
            sequence_index: I32::new(self.sequence_index),
            fix_message_type: I32::new(self.fix_message_type),
            timestamp_ns: I64::new(self.timestamp_ns),
            position: I64::new(self.position),
            sequence_number: I32::new(self.sequence_number),
            reserved2: [0; 4],
        };
        put_frame_header(out, MessageType::FixMessage, block.as_bytes());
        put_var(out, &self.body);
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match FixMessageBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read FixMessage block: {e}"),
        };
        let status = match MessageStatus::from_u8(b.status) {
            Some(s) => s,
            None => bail!("FixMessage: invalid status {}", b.status),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            status,
            slow: b.slow != 0,
            connection_id: b.connection_id.get(),
            session_id: b.session_id.get(),
            sequence_index: b.sequence_index.get(),
            fix_message_type: b.fix_message_type.get(),
            timestamp_ns: b.timestamp_ns.get(),
            position: b.position.get(),
            sequence_number: b.sequence_number.get(),
            body: vars.next_bytes()?,
        })
    }
}
