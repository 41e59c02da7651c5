use std::{fs, path::Path};

use anyhow::Result;
use fix_library_rs::replay::{
    cache::ReplayQueryCache,
    record::{INDEX_FILE_HEADER_LEN, IndexFileHeader, RECORD_LENGTH, replay_index_path},
};
use zerocopy::IntoBytes;

const STREAM_ID: u32 = 1;

fn write_empty_index(dir: &Path, session_id: i64) {
    let mut image = vec![0u8; INDEX_FILE_HEADER_LEN + 16 * RECORD_LENGTH];
    image[..8].copy_from_slice(IndexFileHeader::new().as_bytes());
    fs::write(replay_index_path(dir, session_id, STREAM_ID), image)
        .expect("failed to write index image");
}

#[test]
fn test_lookup_opens_and_reuses_mapping() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_empty_index(dir.path(), 1);

    let mut cache = ReplayQueryCache::new(dir.path(), STREAM_ID, 1, 2)?;
    assert_eq!(cache.lookup(1)?.session_id(), 1);
    assert_eq!(cache.open_queries(), 1);
    assert_eq!(cache.lookup(1)?.session_id(), 1);
    assert_eq!(cache.open_queries(), 1, "hit must not reopen");
    Ok(())
}

#[test]
fn test_full_set_evicts_least_recently_used() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for session_id in 1..=3 {
        write_empty_index(dir.path(), session_id);
    }

    // One set, two ways: every session competes for the same set.
    let mut cache = ReplayQueryCache::new(dir.path(), STREAM_ID, 1, 2)?;
    cache.lookup(1)?;
    cache.lookup(2)?;
    cache.lookup(1)?; // 2 is now the coldest
    cache.lookup(3)?;

    assert_eq!(cache.open_queries(), 2);
    assert!(cache.contains(1));
    assert!(!cache.contains(2), "LRU way must be evicted");
    assert!(cache.contains(3));

    // The evicted session reopens on demand.
    assert_eq!(cache.lookup(2)?.session_id(), 2);
    assert!(!cache.contains(1), "1 became the coldest way");
    Ok(())
}

#[test]
fn test_missing_index_surfaces_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cache = ReplayQueryCache::new(dir.path(), STREAM_ID, 1, 2)?;
    assert!(cache.lookup(404).is_err());
    assert_eq!(cache.open_queries(), 0);
    Ok(())
}

#[test]
fn test_rejects_non_power_of_two_sets() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(ReplayQueryCache::new(dir.path(), STREAM_ID, 3, 2).is_err());
}
