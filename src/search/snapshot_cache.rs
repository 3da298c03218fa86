// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote Snapshot Cache
//!
//! Holds the last full listing of the remote collection so that a search,
//! an analytics call and the next reconciliation run can share one fetch.
//!
//! # Staleness
//!
//! - Entries expire after a fixed TTL (default 60 minutes)
//! - Every engine write calls [`SnapshotCache::invalidate`], which bumps a
//!   generation counter
//! - A fetch that started before an invalidation is not cached afterwards,
//!   since its generation no longer matches
//!
//! ```text
//! load snapshot
//!       │
//!       ▼
//! ┌──────────────────────────────┐
//! │ entry present, within TTL,   │──yes──▶ hit: shared Arc<Vec<_>>
//! │ generation == current?       │
//! └──────────────────────────────┘
//!       │ no
//!       ▼
//! fetch remote ─▶ insert(records, generation at fetch start)
//! ```
//!
//! Each reconciler owns its own cache instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::remote::RemoteRecord;

pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    records: Arc<Vec<RemoteRecord>>,
    fetched_at: Instant,
    generation: u64,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    /// Records in the cached snapshot, if one is held
    pub cached_records: Option<usize>,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

#[derive(Debug)]
pub struct SnapshotCache {
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current generation; pass it to [`insert`](Self::insert) after fetching.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cached snapshot if fresh.
    pub fn get(&self) -> Option<Arc<Vec<RemoteRecord>>> {
        let current = self.generation();
        let fresh = self
            .entry
            .read()
            .as_ref()
            .filter(|e| e.generation == current && e.fetched_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.records));

        let hit = fresh.is_some();
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        crate::metrics::record_snapshot_cache(hit);
        fresh
    }

    /// Store a snapshot fetched while `generation` was current. A snapshot
    /// that raced with an invalidation is returned but not kept.
    pub fn insert(&self, records: Vec<RemoteRecord>, generation: u64) -> Arc<Vec<RemoteRecord>> {
        let records = Arc::new(records);
        if generation == self.generation() {
            *self.entry.write() = Some(CacheEntry {
                records: Arc::clone(&records),
                fetched_at: Instant::now(),
                generation,
            });
        }
        let stats = self.stats();
        crate::metrics::set_snapshot_stats(records.len(), stats.hit_rate);
        records
    }

    /// Drop the cached snapshot and reject in-flight fetches.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        *self.entry.write() = None;
    }

    #[must_use]
    pub fn stats(&self) -> SnapshotCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        SnapshotCacheStats {
            hits,
            misses,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            cached_records: self.entry.read().as_ref().map(|e| e.records.len()),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_TTL)
    }
}
