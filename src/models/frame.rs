// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Framing shared by every control-plane message.
//!
//! A frame is laid out as:
//!
//! ```text
//! +----------------+----------------------+-------------------------+
//! | FrameHeader(8) | fixed block          | variable-length fields  |
//! +----------------+----------------------+-------------------------+
//! ```
//!
//! The fixed block is a little-endian `zerocopy` struct per message kind.
//! Variable fields follow in declaration order, each prefixed by a `u16`
//! length. Integer lists are prefixed by a `u16` element count.

use anyhow::{Result, bail, ensure};
use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U16,
};

use crate::models::message_type::MessageType;

pub const FRAME_HEADER_LEN: usize = 8;

/// Control-plane schema version carried in every frame header.
pub const SCHEMA_VERSION: u16 = 1;

/// SBE-style message header preceding every fixed block.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    pub block_length: U16<LittleEndian>,
    pub template_id: U16<LittleEndian>,
    pub schema_version: U16<LittleEndian>,
    reserved: U16<LittleEndian>,
}

impl FrameHeader {
    pub fn new(template: MessageType, block_length: u16) -> Self {
        Self {
            block_length: U16::new(block_length),
            template_id: U16::new(template as u16),
            schema_version: U16::new(SCHEMA_VERSION),
            reserved: U16::new(0),
        }
    }

    pub fn template(&self) -> Result<MessageType> {
        Ok(MessageType::try_from(self.template_id.get())?)
    }
}

/// Appends a full frame (header + fixed block) to `out`; variable fields are
/// appended by the caller afterwards.
pub fn put_frame_header(out: &mut BytesMut, template: MessageType, block: &[u8]) {
    let header = FrameHeader::new(template, block.len() as u16);
    out.put_slice(header.as_bytes());
    out.put_slice(block);
}

/// Appends one length-prefixed variable field.
pub fn put_var(out: &mut BytesMut, field: &[u8]) {
    debug_assert!(field.len() <= u16::MAX as usize);
    out.put_u16_le(field.len() as u16);
    out.put_slice(field);
}

/// Appends a count-prefixed list of 64-bit ids.
pub fn put_i64_list(out: &mut BytesMut, ids: &[i64]) {
    debug_assert!(ids.len() <= u16::MAX as usize);
    out.put_u16_le(ids.len() as u16);
    for id in ids {
        out.put_i64_le(*id);
    }
}

/// Cursor over the variable-field region of a decoded frame.
pub struct VarReader<'a> {
    buf: &'a [u8],
}

impl<'a> VarReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        ensure!(
            self.buf.len() >= n,
            "variable field truncated: need {n} bytes, {} left",
            self.buf.len()
        );
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn next_len(&mut self) -> Result<usize> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]) as usize)
    }

    pub fn next_str(&mut self) -> Result<String> {
        let len = self.next_len()?;
        let raw = self.take(len)?;
        match std::str::from_utf8(raw) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => bail!("variable field is not valid UTF-8: {e}"),
        }
    }

    pub fn next_bytes(&mut self) -> Result<Bytes> {
        let len = self.next_len()?;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    pub fn next_i64_list(&mut self) -> Result<Vec<i64>> {
        let count = self.next_len()?;
        let raw = self.take(count * 8)?;
        let mut out = Vec::with_capacity(count);
        for chunk in raw.chunks_exact(8) {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(chunk);
            out.push(i64::from_le_bytes(arr));
        }
        Ok(out)
    }
}

/// Splits a raw frame into its header, fixed block and variable region.
pub fn split_frame(frame: &[u8]) -> Result<(FrameHeader, &[u8], &[u8])> {
    ensure!(
        frame.len() >= FRAME_HEADER_LEN,
        "frame shorter than header: {} bytes",
        frame.len()
    );
    let (header, body) = frame.split_at(FRAME_HEADER_LEN);
    let header = match FrameHeader::read_from_bytes(header) {
        Ok(h) => h,
        Err(e) => bail!("failed to read frame header: {e}"),
    };
    let block_length = header.block_length.get() as usize;
    ensure!(
        body.len() >= block_length,
        "frame body shorter than declared block: {} < {block_length}",
        body.len()
    );
    let (block, var) = body.split_at(block_length);
    Ok((header, block, var))
}
