// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Small engine-originated control frames: catch-up replay markers, sent
//! positions and registry reconciliation.

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I64, Immutable, IntoBytes, KnownLayout, LittleEndian, U32,
    U64,
};

use crate::models::{
    frame::{VarReader, put_frame_header, put_i64_list},
    message_type::MessageType,
};

/// Fixed block of `Catchup`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CatchupBlock {
    pub library_id: U32<LittleEndian>,
    reserved: [u8; 4],
    pub connection_id: I64<LittleEndian>,
    pub message_count: U64<LittleEndian>,
}

/// Tells the subscriber that `message_count` replayed messages follow before
/// the session is live again.
#[derive(Debug, Clone, PartialEq)]
pub struct Catchup {
    pub library_id: u32,
    pub connection_id: i64,
    pub message_count: u64,
}

impl Catchup {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = CatchupBlock {
            library_id: U32::new(self.library_id),
            reserved: [0; 4],
            connection_id: I64::new(self.connection_id),
            message_count: U64::new(self.message_count),
        };
        put_frame_header(out, MessageType::Catchup, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match CatchupBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read Catchup block: {e}"),
        };
        Ok(Self {
            library_id: b.library_id.get(),
            connection_id: b.connection_id.get(),
            message_count: b.message_count.get(),
        })
    }
}

/// Fixed block of `NewSentPosition`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct NewSentPositionBlock {
    pub library_id: U32<LittleEndian>,
    reserved: [u8; 4],
    pub position: I64<LittleEndian>,
}

/// The engine's outbound stream has been durably sent up to `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSentPosition {
    pub library_id: u32,
    pub position: i64,
}

impl NewSentPosition {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = NewSentPositionBlock {
            library_id: U32::new(self.library_id),
            reserved: [0; 4],
            position: I64::new(self.position),
        };
        put_frame_header(out, MessageType::NewSentPosition, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match NewSentPositionBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read NewSentPosition block: {e}"),
        };
        Ok(Self {
            library_id: b.library_id.get(),
            position: b.position.get(),
        })
    }
}

/// Fixed block of `ControlNotification`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ControlNotificationBlock {
    pub library_id: U32<LittleEndian>,
    reserved: [u8; 4],
}

/// Authoritative engine view of the session ids owned by this library; the
/// registry reconciles against it.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlNotification {
    pub library_id: u32,
    pub session_ids: Vec<i64>,
}

impl ControlNotification {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = ControlNotificationBlock {
            library_id: U32::new(self.library_id),
            reserved: [0; 4],
        };
        put_frame_header(out, MessageType::ControlNotification, block.as_bytes());
        put_i64_list(out, &self.session_ids);
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match ControlNotificationBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read ControlNotification block: {e}"),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            session_ids: vars.next_i64_list()?,
        })
    }
}
