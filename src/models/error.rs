// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use anyhow::{Result, bail};
use bytes::BytesMut;
use zerocopy::{
    FromBytes as ZFromBytes, I64, Immutable, IntoBytes, KnownLayout, LittleEndian, U32,
};

use crate::models::{
    frame::{VarReader, put_frame_header, put_var},
    message_type::MessageType,
};

/// Error vocabulary spoken by the engine over the control plane.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorType {
    UnknownSession = 0,
    UnableToConnect = 1,
    DuplicateSession = 2,
    InvalidConfiguration = 3,
    UnknownLibrary = 4,
    Other = 5,
}

impl EngineErrorType {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::UnknownSession),
            1 => Some(Self::UnableToConnect),
            2 => Some(Self::DuplicateSession),
            3 => Some(Self::InvalidConfiguration),
            4 => Some(Self::UnknownLibrary),
            5 => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for EngineErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::UnableToConnect => "UNABLE_TO_CONNECT",
            Self::DuplicateSession => "DUPLICATE_SESSION",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::UnknownLibrary => "UNKNOWN_LIBRARY",
            Self::Other => "OTHER",
        })
    }
}

/// Fixed block of `EngineError`.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct EngineErrorBlock {
    pub library_id: U32<LittleEndian>,
    pub error_type: u8,
    reserved: [u8; 3],
    pub reply_to_id: I64<LittleEndian>,
}

/// Engine-side failure report. When `reply_to_id` matches an outstanding
/// request the owning reply handle is resolved; otherwise the error is
/// latched for an in-progress connect, or dropped to the user error callback.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub library_id: u32,
    pub error_type: EngineErrorType,
    pub reply_to_id: i64,
    pub message: String,
}

impl EngineError {
    pub fn encode(&self, out: &mut BytesMut) {
        let block = EngineErrorBlock {
            library_id: U32::new(self.library_id),
            error_type: self.error_type as u8,
            reserved: [0; 3],
            reply_to_id: I64::new(self.reply_to_id),
        };
        put_frame_header(out, MessageType::EngineError, block.as_bytes());
        put_var(out, self.message.as_bytes());
    }

    pub fn decode(block: &[u8], var: &[u8]) -> Result<Self> {
        let b = match EngineErrorBlock::read_from_prefix(block) {
            Ok((b, _)) => b,
            Err(e) => bail!("failed to read EngineError block: {e}"),
        };
        let error_type = match EngineErrorType::from_u8(b.error_type) {
            Some(t) => t,
            None => bail!("EngineError: invalid error type {}", b.error_type),
        };
        let mut vars = VarReader::new(var);
        Ok(Self {
            library_id: b.library_id.get(),
            error_type,
            reply_to_id: b.reply_to_id.get(),
            message: vars.next_str()?,
        })
    }
}
