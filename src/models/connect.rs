// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Control-plane handshake and liveness frames: `LibraryConnect`,
//! `ApplicationHeartbeat` and the `NotLeader` redirect.

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I64, Immutable, IntoBytes, KnownLayout, LittleEndian, U32,
};

use crate::models::{
    frame::{VarReader, put_frame_header, put_var},
    message_type::MessageType,
};

/// Fixed block of the `LibraryConnect` handshake frame.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LibraryConnectBlock {
    pub library_id: U32<LittleEndian>,
    reserved: [u8; 4],
    pub correlation_id: I64<LittleEndian>,
}

/// First frame a library publishes after (re)initializing its streams.
/// The engine answers with `ApplicationHeartbeat` once it has registered the
/// library, or `NotLeader` when this node cannot own libraries.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryConnect {
    pub library_id: u32,
    pub correlation_id: i64,
}

impl LibraryConnect {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = LibraryConnectBlock {
            library_id: U32::new(self.library_id),
            reserved: [0; 4],
            correlation_id: I64::new(self.correlation_id),
        };
        put_frame_header(out, MessageType::LibraryConnect, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match LibraryConnectBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read LibraryConnect block: {e}"),
        };
        Ok(Self {
            library_id: b.library_id.get(),
            correlation_id: b.correlation_id.get(),
        })
    }
}

/// Fixed block of the engine liveness heartbeat.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ApplicationHeartbeatBlock {
    pub library_id: U32<LittleEndian>,
    reserved: [u8; 4],
}

/// Periodic proof of engine liveness addressed to one library.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationHeartbeat {
    pub library_id: u32,
}

impl ApplicationHeartbeat {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = ApplicationHeartbeatBlock {
            library_id: U32::new(self.library_id),
            reserved: [0; 4],
        };
        put_frame_header(out, MessageType::ApplicationHeartbeat, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match ApplicationHeartbeatBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read ApplicationHeartbeat block: {e}"),
        };
        Ok(Self {
            library_id: b.library_id.get(),
        })
    }
}

/// Fixed block of the leader redirect.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct NotLeaderBlock {
    pub library_id: U32<LittleEndian>,
    reserved: [u8; 4],
    pub reply_to_id: I64<LittleEndian>,
}

/// Sent by a clustered engine node that is not the current leader.
/// `library_channel` names the leader's channel, or is empty when the node
/// does not know one and the library should round-robin.
#[derive(Debug, Clone, PartialEq)]
pub struct NotLeader {
    pub library_id: u32,
    pub reply_to_id: i64,
    pub library_channel: String,
}

impl NotLeader {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = NotLeaderBlock {
            library_id: U32::new(self.library_id),
            reserved: [0; 4],
            reply_to_id: I64::new(self.reply_to_id),
        };
        put_frame_header(out, MessageType::NotLeader, block.as_bytes());
        put_var(out, self.library_channel.as_bytes());
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match NotLeaderBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read NotLeader block: {e}"),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            reply_to_id: b.reply_to_id.get(),
            library_channel: vars.next_str()?,
        })
    }
}
