// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I64, Immutable, IntoBytes, KnownLayout, LittleEndian, U32,
};

use crate::models::{frame::put_frame_header, message_type::MessageType};

/// Why the engine dropped a connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    RemoteDisconnect = 0,
    EngineShutdown = 1,
    LibraryDisconnect = 2,
    Exception = 3,
    SlowConsumer = 4,
}

impl DisconnectReason {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::RemoteDisconnect),
            1 => Some(Self::EngineShutdown),
            2 => Some(Self::LibraryDisconnect),
            3 => Some(Self::Exception),
            4 => Some(Self::SlowConsumer),
            _ => None,
        }
    }
}

/// Fixed block of `Disconnect`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct DisconnectBlock {
    pub library_id: U32<LittleEndian>,
    pub reason: u8,
    reserved: [u8; 3],
    pub connection_id: I64<LittleEndian>,
}

/// The TCP connection behind a library-owned session went away.
#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub library_id: u32,
    pub reason: DisconnectReason,
    pub connection_id: i64,
}

impl Disconnect {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = DisconnectBlock {
            library_id: U32::new(self.library_id),
            reason: self.reason as u8,
            reserved: [0; 3],
            connection_id: I64::new(self.connection_id),
        };
        put_frame_header(out, MessageType::Disconnect, block.as_bytes());
    }

    pub fn decode(block: &[u8], _var: &[u8]) -> Result<Self> {
        let b = match DisconnectBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read Disconnect block: {e}"),
        };
        let reason = match DisconnectReason::from_u8(b.reason) {
            Some(r) => r,
            None => bail!("Disconnect: invalid reason {}", b.reason),
        };
        Ok(Self {
            library_id: b.library_id.get(),
            reason,
            connection_id: b.connection_id.get(),
        })
    }
}
