// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bounded cache of open [`SessionQuery`] mappings.
//!
//! Set-associative: a session id hashes to one set, each set holds up to
//! `ways` open queries, and the least-recently-used entry of a full set is
//! evicted. Dropping an entry closes its file mapping.

use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use tracing::debug;

use crate::replay::query::SessionQuery;

#[derive(Debug)]
struct CachedQuery {
    session_id: i64,
    last_used: u64,
    query: SessionQuery,
}

/// Cache of per-session replay index mappings.
#[derive(Debug)]
pub struct ReplayQueryCache {
    sets: Vec<Vec<CachedQuery>>,
    ways: usize,
    tick: u64,
    log_file_dir: PathBuf,
    stream_id: u32,
}

impl ReplayQueryCache {
    pub fn new(
        log_file_dir: &Path,
        stream_id: u32,
        num_sets: usize,
        ways: usize,
    ) -> Result<Self> {
        ensure!(
            num_sets.is_power_of_two(),
            "replay query cache sets must be a power of two, got {num_sets}"
        );
        ensure!(ways > 0, "replay query cache needs at least one way");
        Ok(Self {
            sets: (0..num_sets).map(|_| Vec::with_capacity(ways)).collect(),
            ways,
            tick: 0,
            log_file_dir: log_file_dir.to_path_buf(),
            stream_id,
        })
    }

    /// Returns the open query for `session_id`, opening (and possibly
    /// evicting) on miss.
    pub fn lookup(&mut self, session_id: i64) -> Result<&SessionQuery> {
        self.tick += 1;
        let tick = self.tick;
        let set_index = self.set_index(session_id);
        let set = &mut self.sets[set_index];

        if let Some(hit) = set.iter().position(|c| c.session_id == session_id) {
            set[hit].last_used = tick;
            return Ok(&set[hit].query);
        }

        let query = SessionQuery::open(&self.log_file_dir, session_id, self.stream_id)?;
        if set.len() == self.ways {
            // Evict the coldest way; dropping it unmaps the index file.
            let coldest = set
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.last_used)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let evicted = set.swap_remove(coldest);
            debug!(
                session_id = evicted.session_id,
                "evicting replay query mapping"
            );
        }
        set.push(CachedQuery {
            session_id,
            last_used: tick,
            query,
        });
        let newest = set.len() - 1;
        Ok(&set[newest].query)
    }

    /// Number of currently open mappings.
    pub fn open_queries(&self) -> usize {
        self.sets.iter().map(Vec::len).sum()
    }

    /// Whether `session_id` is currently mapped, without touching LRU state.
    pub fn contains(&self, session_id: i64) -> bool {
        let set_index = self.set_index(session_id);
        self.sets[set_index]
            .iter()
            .any(|c| c.session_id == session_id)
    }

    #[inline]
    fn set_index(&self, session_id: i64) -> usize {
        // Spread ids across sets; ids are small and often sequential, so mix
        // the high bits in before masking.
        let hash = (session_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        (hash >> 32) as usize & (self.sets.len() - 1)
    }
}
