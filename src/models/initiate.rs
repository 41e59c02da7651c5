// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I32, I64, Immutable, IntoBytes, KnownLayout, LittleEndian,
    U16, U32,
};

use crate::{
    cfg::enums::SequenceNumberType,
    models::{
        frame::{VarReader, put_frame_header, put_var},
        message_type::MessageType,
    },
};

/// Fixed block of `InitiateConnection`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct InitiateConnectionBlock {
    pub library_id: U32<LittleEndian>,
    pub port: U16<LittleEndian>,
    pub sequence_number_type: u8,
    reserved: u8,
    pub initial_sequence_number: I32<LittleEndian>,
    pub heartbeat_interval_s: U32<LittleEndian>,
    pub correlation_id: I64<LittleEndian>,
}

/// Asks the engine to open an outbound FIX connection and hand the resulting
/// session to this library. The engine answers with
/// `ManageConnection(type=INITIATOR)` carrying the same correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateConnection {
    pub library_id: u32,
    pub port: u16,
    pub sequence_number_type: SequenceNumberType,
    pub initial_sequence_number: i32,
    pub heartbeat_interval_s: u32,
    pub correlation_id: i64,
    pub host: String,
    pub sender_comp_id: String,
    pub sender_sub_id: String,
    pub sender_location_id: String,
    pub target_comp_id: String,
    pub username: String,
    pub password: String,
}

impl InitiateConnection {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = InitiateConnectionBlock {
            library_id: U32::new(self.library_id),
            port: U16::new(self.port),
            sequence_number_type: self.sequence_number_type as u8,
            reserved: 0,
            initial_sequence_number: I32::new(self.initial_sequence_number),
            heartbeat_interval_s: U32::new(self.heartbeat_interval_s),
            correlation_id: I64::new(self.correlation_id),
        };
        put_frame_header(out, MessageType::InitiateConnection, block.as_bytes());
        put_var(out, self.host.as_bytes());
        put_var(out, self.sender_comp_id.as_bytes());
        put_var(out, self.sender_sub_id.as_bytes());
        put_var(out, self.sender_location_id.as_bytes());
        put_var(out, self.target_comp_id.as_bytes());
        put_var(out, self.username.as_bytes());
        put_var(out, self.password.as_bytes());
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match InitiateConnectionBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read InitiateConnection block: {e}"),
        };
        let seq_type = match SequenceNumberType::from_u8(b.sequence_number_type) {
            Some(t) => t,
            None => bail!(
                "InitiateConnection: invalid sequence number type {}",
                b.sequence_number_type
            ),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            port: b.port.get(),
            sequence_number_type: seq_type,
            initial_sequence_number: b.initial_sequence_number.get(),
            heartbeat_interval_s: b.heartbeat_interval_s.get(),
            correlation_id: b.correlation_id.get(),
            host: vars.next_str()?,
            sender_comp_id: vars.next_str()?,
            sender_sub_id: vars.next_str()?,
            sender_location_id: vars.next_str()?,
            target_comp_id: vars.next_str()?,
            username: vars.next_str()?,
            password: vars.next_str()?,
        })
    }
}
