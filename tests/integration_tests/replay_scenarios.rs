use std::{fs, path::Path};

use anyhow::Result;
use fix_library_rs::replay::{
    cache::ReplayQueryCache,
    query::SessionQuery,
    record::{
        BEGIN_CHANGE_OFFSET, END_CHANGE_OFFSET, FRAME_ALIGNMENT, INDEX_FILE_HEADER_LEN,
        IndexFileHeader, MOST_RECENT_MESSAGE, RECORD_LENGTH, ReplayIndexRecord,
        replay_index_path,
    },
};
use serial_test::serial;
use zerocopy::IntoBytes;

const STREAM_ID: u32 = 1;
const MSG_LENGTH: i32 = 96;

fn write_index(dir: &Path, session_id: i64, capacity_records: usize, seqs: &[i32]) {
    let capacity = capacity_records * RECORD_LENGTH;
    let mut image = vec![0u8; INDEX_FILE_HEADER_LEN + capacity];
    image[..8].copy_from_slice(IndexFileHeader::new().as_bytes());

    let mut position = 0u64;
    for seq in seqs {
        let record = ReplayIndexRecord::new(
            position + FRAME_ALIGNMENT as u64,
            *seq,
            0,
            1,
            MSG_LENGTH,
        );
        let offset = INDEX_FILE_HEADER_LEN + (position as usize & (capacity - 1));
        image[offset..offset + RECORD_LENGTH].copy_from_slice(record.as_bytes());
        position += RECORD_LENGTH as u64;
    }
    image[BEGIN_CHANGE_OFFSET..BEGIN_CHANGE_OFFSET + 8]
        .copy_from_slice(&position.to_le_bytes());
    image[END_CHANGE_OFFSET..END_CHANGE_OFFSET + 8]
        .copy_from_slice(&position.to_le_bytes());

    fs::write(replay_index_path(dir, session_id, STREAM_ID), image)
        .expect("failed to write index image");
}

#[test]
fn test_wrapped_ring_yields_only_surviving_records() -> Result<()> {
    // 20 records into a 16-slot ring: the writer lapped the first four.
    let dir = tempfile::tempdir()?;
    let seqs: Vec<i32> = (1..=20).collect();
    write_index(dir.path(), 1, 16, &seqs);

    let query = SessionQuery::open(dir.path(), 1, STREAM_ID)?;
    let ranges = query.query(0, 1, 0, 20);

    assert_eq!(ranges.len(), 1);
    let range = &ranges[0];
    assert_eq!(range.recording_id, 1);
    assert_eq!(range.count, 16, "sequence numbers 5..=20 survive in the ring");
    // Oldest surviving record (seq 5) was written at byte position 128.
    assert_eq!(range.start_position, 4 * RECORD_LENGTH as i64);
    assert_eq!(
        range.total_length,
        16 * (MSG_LENGTH as i64 + FRAME_ALIGNMENT)
    );
    Ok(())
}

#[test]
fn test_skip_to_start_covers_exact_window() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let seqs: Vec<i32> = (1..=100).collect();
    write_index(dir.path(), 2, 128, &seqs);

    let query = SessionQuery::open(dir.path(), 2, STREAM_ID)?;
    let ranges = query.query(0, 50, 0, 60);

    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].count, 11);
    assert_eq!(ranges[0].start_position, 49 * RECORD_LENGTH as i64);
    assert_eq!(
        ranges[0].total_length,
        11 * (MSG_LENGTH as i64 + FRAME_ALIGNMENT)
    );
    Ok(())
}

#[test]
fn test_ranges_are_contiguous_and_non_overlapping() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let seqs: Vec<i32> = (1..=64).collect();
    write_index(dir.path(), 3, 128, &seqs);

    let query = SessionQuery::open(dir.path(), 3, STREAM_ID)?;
    let ranges = query.query(0, 1, 0, MOST_RECENT_MESSAGE);

    let mut previous_end = None;
    for range in &ranges {
        if let Some(end) = previous_end {
            assert!(
                range.start_position >= end,
                "ranges must not overlap: {ranges:?}"
            );
        }
        assert!(range.total_length > 0);
        previous_end = Some(range.end_position());
    }

    // A repeated query over an unchanged index is deterministic.
    assert_eq!(ranges, query.query(0, 1, 0, MOST_RECENT_MESSAGE));
    Ok(())
}

#[test]
#[serial]
fn test_queries_through_the_bounded_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for session_id in 1..=4 {
        let seqs: Vec<i32> = (1..=10).collect();
        write_index(dir.path(), session_id, 16, &seqs);
    }

    let mut cache = ReplayQueryCache::new(dir.path(), STREAM_ID, 2, 1)?;
    for session_id in 1..=4 {
        let ranges = cache.lookup(session_id)?.query(0, 2, 0, 9);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].session_id, session_id);
        assert_eq!(ranges[0].count, 8);
    }
    assert!(cache.open_queries() <= 2, "one way per set stays bounded");
    Ok(())
}
