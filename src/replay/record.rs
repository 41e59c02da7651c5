// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! On-disk layout of the replay index.
//!
//! One index file per FIX session, written by the gateway's indexer and read
//! here. The layout is:
//!
//! ```text
//! offset  0: IndexFileHeader (8 bytes, SBE-style)
//! offset  8: begin_change  (u64, atomic cell)
//! offset 16: end_change    (u64, atomic cell)
//! offset 24: reserved      (8 bytes)
//! offset 32: ring of 32-byte ReplayIndexRecords
//! ```
//!
//! The change counters count bytes published into the ring; the writer bumps
//! `begin_change` before touching a slot and `end_change` after, which lets
//! readers detect torn reads and laps without locks.

use std::path::{Path, PathBuf};

use zerocopy::{
    FromBytes as ZFromBytes, I32, Immutable, IntoBytes, KnownLayout, LittleEndian, U16,
    U64,
};

pub const INDEX_FILE_HEADER_LEN: usize = 32;
pub const BEGIN_CHANGE_OFFSET: usize = 8;
pub const END_CHANGE_OFFSET: usize = 16;

pub const RECORD_LENGTH: usize = 32;

/// Archive frames are aligned to this many bytes; every indexed message is
/// preceded by one frame header of the same size.
pub const FRAME_ALIGNMENT: i64 = 32;

/// Upper-bound sentinel: replay everything from the lower bound onwards.
pub const MOST_RECENT_MESSAGE: i32 = i32::MAX;

pub const INDEX_TEMPLATE_ID: u16 = 90;
pub const INDEX_SCHEMA_ID: u16 = 1;
pub const INDEX_SCHEMA_VERSION: u16 = 1;

/// SBE-style header at offset zero of every index file.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct IndexFileHeader {
    pub block_length: U16<LittleEndian>,
    pub template_id: U16<LittleEndian>,
    pub schema_id: U16<LittleEndian>,
    pub version: U16<LittleEndian>,
}

impl IndexFileHeader {
    pub fn new() -> Self {
        Self {
            block_length: U16::new(RECORD_LENGTH as u16),
            template_id: U16::new(INDEX_TEMPLATE_ID),
            schema_id: U16::new(INDEX_SCHEMA_ID),
            version: U16::new(INDEX_SCHEMA_VERSION),
        }
    }
}

/// One ring slot: maps a `(sequence_index, sequence_number)` key to a byte
/// range of the durable archive. `begin_position == 0` marks a slot the
/// writer has never filled.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ReplayIndexRecord {
    pub begin_position: U64<LittleEndian>,
    pub sequence_number: I32<LittleEndian>,
    pub sequence_index: I32<LittleEndian>,
    pub recording_id: U64<LittleEndian>,
    pub length: I32<LittleEndian>,
    padding: [u8; 4],
}

impl ReplayIndexRecord {
    pub fn new(
        begin_position: u64,
        sequence_number: i32,
        sequence_index: i32,
        recording_id: u64,
        length: i32,
    ) -> Self {
        Self {
            begin_position: U64::new(begin_position),
            sequence_number: I32::new(sequence_number),
            sequence_index: I32::new(sequence_index),
            recording_id: U64::new(recording_id),
            length: I32::new(length),
            padding: [0; 4],
        }
    }

    #[inline]
    pub fn key(&self) -> (i32, i32) {
        (self.sequence_index.get(), self.sequence_number.get())
    }
}

/// Path of the index file for one session on one archive stream.
pub fn replay_index_path(log_file_dir: &Path, session_id: i64, stream_id: u32) -> PathBuf {
    log_file_dir.join(format!("replay-index-{session_id}-{stream_id}"))
}
