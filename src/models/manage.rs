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

/// Which side opened the underlying TCP connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Initiator = 0,
    Acceptor = 1,
}

impl ConnectionType {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Initiator),
            1 => Some(Self::Acceptor),
            _ => None,
        }
    }
}

/// Fixed block of `ManageConnection`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ManageConnectionBlock {
    pub library_id: U32<LittleEndian>,
    pub connection_type: u8,
    reserved: [u8; 3],
    pub connection_id: I64<LittleEndian>,
    pub session_id: I64<LittleEndian>,
    pub reply_to_id: I64<LittleEndian>,
    pub last_sent_sequence_number: I32<LittleEndian>,
    pub last_received_sequence_number: I32<LittleEndian>,
    pub heartbeat_interval_ms: U32<LittleEndian>,
    reserved2: [u8; 4],
}

/// Hands ownership of a freshly connected FIX peer to this library.
///
/// For initiated connections `reply_to_id` echoes the correlation id of the
/// originating `InitiateConnection`; for accepted connections it is zero and
/// the peer identity arrives with the follow-up `Logon`.
#[derive(Debug, Clone, PartialEq)]
pub struct ManageConnection {
    pub library_id: u32,
    pub connection_type: ConnectionType,
    pub connection_id: i64,
    pub session_id: i64,
    pub reply_to_id: i64,
    pub last_sent_sequence_number: i32,
    pub last_received_sequence_number: i32,
    pub heartbeat_interval_ms: u32,
    /// Peer address, `host:port`.
    pub address: String,
    pub local_comp_id: String,
    pub remote_comp_id: String,
}

impl ManageConnection {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = ManageConnectionBlock {
            library_id: U32::new(self.library_id),
            connection_type: self.connection_type as u8,
            reserved: [0; 3],
            connection_id: I64::new(self.connection_id),
            session_id: I64::new(self.session_id),
            reply_to_id: I64::new(self.reply_to_id),
            last_sent_sequence_number: I32::new(self.last_sent_sequence_number),
            last_received_sequence_number: I32::new(self.last_received_sequence_number),
            heartbeat_interval_ms: U32::new(self.heartbeat_interval_ms),
            reserved2: [0; 4],
        };
        put_frame_header(out, MessageType::ManageConnection, block.as_bytes());
        put_var(out, self.address.as_bytes());
        put_var(out, self.local_comp_id.as_bytes());
        put_var(out, self.remote_comp_id.as_bytes());
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match ManageConnectionBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read ManageConnection block: {e}"),
        };
        let connection_type = match ConnectionType::from_u8(b.connection_type) {
            Some(t) => t,
            None => bail!("ManageConnection: invalid connection type {}", b.connection_type),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            connection_type,
            connection_id: b.connection_id.get(),
            session_id: b.session_id.get(),
            reply_to_id: b.reply_to_id.get(),
            last_sent_sequence_number: b.last_sent_sequence_number.get(),
            last_received_sequence_number: b.last_received_sequence_number.get(),
            heartbeat_interval_ms: b.heartbeat_interval_ms.get(),
            address: vars.next_str()?,
            local_comp_id: vars.next_str()?,
            remote_comp_id: vars.next_str()?,
        })
    }
}
