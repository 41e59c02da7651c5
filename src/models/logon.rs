// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I32, I64, Immutable, IntoBytes, KnownLayout, LittleEndian,
    U32,
};

use crate::models::{
    frame::{VarReader, put_frame_header, put_var},
    message_type::MessageType,
};

/// Why the engine is announcing this logon.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogonStatus {
    /// The FIX-level logon on a connection owned by this library completed;
    /// the library must acquire the session.
    New = 0,
    /// Informational broadcast about a session owned elsewhere; no ownership
    /// change.
    LibraryNotification = 1,
}

impl LogonStatus {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::New),
            1 => Some(Self::LibraryNotification),
            _ => None,
        }
    }
}

/// Fixed block of `Logon`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LogonBlock {
    pub library_id: U32<LittleEndian>,
    pub status: u8,
    reserved: [u8; 3],
    pub connection_id: I64<LittleEndian>,
    pub session_id: I64<LittleEndian>,
    pub last_sent_sequence_number: I32<LittleEndian>,
    pub last_received_sequence_number: I32<LittleEndian>,
}

/// Announces a completed FIX-level logon, carrying the comp-id pair that
/// fixes the session identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Logon {
    pub library_id: u32,
    pub status: LogonStatus,
    pub connection_id: i64,
    pub session_id: i64,
    pub last_sent_sequence_number: i32,
    pub last_received_sequence_number: i32,
    pub local_comp_id: String,
    pub remote_comp_id: String,
}

impl Logon {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = LogonBlock {
            library_id: U32::new(self.library_id),
            status: self.status as u8,
            reserved: [0; 3],
            connection_id: I64::new(self.connection_id),
            session_id: I64::new(self.session_id),
            last_sent_sequence_number: I32::new(self.last_sent_sequence_number),
            last_received_sequence_number: I32::new(self.last_received_sequence_number),
        };
        put_frame_header(out, MessageType::Logon, block.as_bytes());
        put_var(out, self.local_comp_id.as_bytes());
        put_var(out, self.remote_comp_id.as_bytes());
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match LogonBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read Logon block: {e}"),
        };
        let status = match LogonStatus::from_u8(b.status) {
            Some(s) => s,
            None => bail!("Logon: invalid status {}", b.status),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            status,
            connection_id: b.connection_id.get(),
            session_id: b.session_id.get(),
            last_sent_sequence_number: b.last_sent_sequence_number.get(),
            last_received_sequence_number: b.last_received_sequence_number.get(),
            local_comp_id: vars.next_str()?,
            remote_comp_id: vars.next_str()?,
        })
    }
}
