// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search, Analytics and the Snapshot Cache
//!
//! # Architecture
//!
//! ```text
//! SearchParams
//!     ↓
//!     ├─→ remote_query()  → paging / ordering / archived (server side)
//!     └─→ matches()       → text + flags + engagement (client side, after fromRemote)
//!                ↓
//!           apply() → SearchResult { contacts, total, page, limit }
//!
//! Snapshot (cached) → translate → Analytics::compute
//! ```
//!
//! Entry points live on [`Reconciler`](crate::Reconciler):
//! `search(params)` and `analytics()`.

mod analytics;
mod filter;
mod snapshot_cache;

pub use analytics::{Analytics, RECENTLY_ADDED_WINDOW_MS, RECENTLY_UPDATED_WINDOW_MS, UNCATEGORIZED};
pub use filter::{apply, SearchParams, SearchResult, DEFAULT_LIMIT, MAX_LIMIT};
pub use snapshot_cache::{SnapshotCache, SnapshotCacheStats, DEFAULT_SNAPSHOT_TTL};
