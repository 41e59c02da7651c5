// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Lock-free reader over one session's replay index.
//!
//! The index is single-writer (the gateway's indexer) / multi-reader; each
//! reader holds its own read-only mapping and never mutates the file. A scan
//! validates every slot against the `(begin_change, end_change)` counter pair:
//! a slot is only applied when `end_change` observed before the field reads
//! equals `begin_change` re-read after an acquire fence. A writer that laps
//! the reader mid-scan is detected from the counters and the scan restarts at
//! the writer's published edge.

use std::{
    fs::File,
    path::Path,
    sync::atomic::{AtomicU64, Ordering, fence},
};

use anyhow::{Context, Result, bail, ensure};
use memmap2::Mmap;
use tracing::debug;
use zerocopy::FromBytes as ZFromBytes;

use crate::replay::{
    range::RecordingRange,
    record::{
        BEGIN_CHANGE_OFFSET, END_CHANGE_OFFSET, FRAME_ALIGNMENT, INDEX_FILE_HEADER_LEN,
        INDEX_TEMPLATE_ID, IndexFileHeader, MOST_RECENT_MESSAGE, RECORD_LENGTH,
        ReplayIndexRecord, replay_index_path,
    },
};

/// An open, validated mapping of one session's replay index.
#[derive(Debug)]
pub struct SessionQuery {
    mmap: Mmap,
    session_id: i64,
    /// Ring size in bytes; a power of two, so `position & (capacity - 1)` is
    /// the slot offset.
    capacity: u64,
}

impl SessionQuery {
    pub fn open(log_file_dir: &Path, session_id: i64, stream_id: u32) -> Result<Self> {
        let path = replay_index_path(log_file_dir, session_id, stream_id);
        let file = File::open(&path)
            .with_context(|| format!("failed to open replay index {path:?}"))?;
        // The writer mutates the file concurrently; the mapping is read-only
        // and shared, so published bytes become visible to this reader.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to map replay index {path:?}"))?;

        ensure!(
            mmap.len() > INDEX_FILE_HEADER_LEN,
            "replay index {path:?} too short: {} bytes",
            mmap.len()
        );
        let header = match IndexFileHeader::read_from_prefix(&mmap[..]) {
            Ok((h, _)) => h,
            Err(e) => bail!("failed to read header of replay index {path:?}: {e}"),
        };
        ensure!(
            header.template_id.get() == INDEX_TEMPLATE_ID,
            "replay index {path:?} has template id {}, expected {INDEX_TEMPLATE_ID}",
            header.template_id.get()
        );
        ensure!(
            header.block_length.get() as usize == RECORD_LENGTH,
            "replay index {path:?} has record length {}, expected {RECORD_LENGTH}",
            header.block_length.get()
        );

        let capacity = (mmap.len() - INDEX_FILE_HEADER_LEN) as u64;
        ensure!(
            capacity.is_power_of_two() && capacity % RECORD_LENGTH as u64 == 0,
            "replay index {path:?} capacity {capacity} must be a power-of-two multiple \
             of {RECORD_LENGTH}"
        );
        ensure!(
            mmap.as_ptr().align_offset(align_of::<AtomicU64>()) == 0,
            "replay index {path:?} mapping is not 8-byte aligned"
        );

        Ok(Self {
            mmap,
            session_id,
            capacity,
        })
    }

    #[inline]
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Returns the ordered archive ranges covering every indexed message with
    /// `(begin_sequence_index, begin_sequence_number) <= key <=
    /// (end_sequence_index, end_sequence_number)`, both bounds inclusive.
    /// Passing [`MOST_RECENT_MESSAGE`] as the upper sequence number makes the
    /// query unbounded above.
    pub fn query(
        &self,
        begin_sequence_index: i32,
        begin_sequence_number: i32,
        end_sequence_index: i32,
        end_sequence_number: i32,
    ) -> Vec<RecordingRange> {
        let begin_change = self.counter(BEGIN_CHANGE_OFFSET).load(Ordering::Acquire);
        // Before the first wrap the oldest record still lives at slot zero.
        let initial = if begin_change < self.capacity {
            0
        } else {
            begin_change
        };
        self.scan(
            initial,
            (begin_sequence_index, begin_sequence_number),
            (end_sequence_index, end_sequence_number),
        )
    }

    fn scan(
        &self,
        mut iterator: u64,
        begin: (i32, i32),
        end: (i32, i32),
    ) -> Vec<RecordingRange> {
        let unbounded = end.1 == MOST_RECENT_MESSAGE;
        let capacity = self.capacity;
        let mut stop = iterator + capacity;

        let mut ranges: Vec<RecordingRange> = Vec::new();
        let mut current: Option<RecordingRange> = None;
        let mut last_folded_sequence_number: Option<i32> = None;

        while iterator < stop {
            let change_position_pre =
                self.counter(END_CHANGE_OFFSET).load(Ordering::Acquire);
            let begin_change = self.counter(BEGIN_CHANGE_OFFSET).load(Ordering::Acquire);

            // Lap: the writer overtook every slot this scan has not yet
            // visited. Restart at the published edge and discard partial work.
            if change_position_pre > iterator && iterator + capacity <= begin_change {
                debug!(
                    session_id = self.session_id,
                    iterator, change_position_pre, "replay index lapped, restarting scan"
                );
                iterator = change_position_pre;
                stop = iterator + capacity;
                ranges.clear();
                current = None;
                last_folded_sequence_number = None;
                continue;
            }

            let offset = INDEX_FILE_HEADER_LEN + (iterator & (capacity - 1)) as usize;
            let record = match ReplayIndexRecord::read_from_bytes(
                &self.mmap[offset..offset + RECORD_LENGTH],
            ) {
                Ok(r) => r,
                // Slice length and alignment are fixed; unreachable in practice.
                Err(_) => break,
            };

            fence(Ordering::Acquire);

            // The slot was mid-write; retry it.
            if change_position_pre
                != self.counter(BEGIN_CHANGE_OFFSET).load(Ordering::Acquire)
            {
                std::hint::spin_loop();
                continue;
            }

            let begin_position = record.begin_position.get();
            if begin_position == 0 {
                break;
            }
            let key = record.key();
            if !unbounded && key > end {
                break;
            }

            if key >= begin {
                let recording_id = record.recording_id.get();
                let length = record.length.get() as i64;
                match current.as_mut() {
                    Some(range) if range.recording_id == recording_id => {
                        range.total_length += length + FRAME_ALIGNMENT;
                        if last_folded_sequence_number != Some(key.1) {
                            range.count += 1;
                        }
                    },
                    _ => {
                        if let Some(range) = current.take() {
                            ranges.push(range);
                        }
                        current = Some(RecordingRange {
                            recording_id,
                            session_id: self.session_id,
                            start_position: begin_position as i64 - FRAME_ALIGNMENT,
                            total_length: length + FRAME_ALIGNMENT,
                            count: 1,
                        });
                    },
                }
                last_folded_sequence_number = Some(key.1);
                iterator += RECORD_LENGTH as u64;
            } else if key.0 == begin.0 && key.1 < begin.1 {
                // Same sequence index, earlier number: jump straight to the
                // first candidate slot instead of walking one by one.
                iterator += (begin.1 - key.1) as u64 * RECORD_LENGTH as u64;
            } else {
                iterator += RECORD_LENGTH as u64;
            }
        }

        if let Some(range) = current.take() {
            ranges.push(range);
        }
        ranges
    }

    #[inline]
    fn counter(&self, offset: usize) -> &AtomicU64 {
        // Alignment is validated at open; the cell is only ever loaded.
        unsafe { &*(self.mmap.as_ptr().add(offset) as *const AtomicU64) }
    }
}
