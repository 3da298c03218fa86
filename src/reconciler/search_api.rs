//! Read API: search and analytics over the remote snapshot.
//!
//! ```text
//! search(params)
//!       │
//!       ├─→ include_archived? ─yes─▶ full listing with archived (not cached)
//!       │        │no
//!       │        └─▶ cached snapshot
//!       │
//!       ├─→ fromRemote every record
//!       ├─→ sort by params.order_by, newest first
//!       └─→ filter client-side, then paginate
//! ```

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::debug;

use crate::contact::{now_millis, Contact};
use crate::error::{SyncError, SyncResult};
use crate::remote::{OrderBy, RemoteRecord};
use crate::search::{self, Analytics, SearchParams, SearchResult};

use super::Reconciler;

impl Reconciler {
    /// Search contacts. Filters the remote cannot express run locally after
    /// translation; `total` counts every match before pagination.
    #[tracing::instrument(skip(self, params), fields(page = params.page, limit = params.limit))]
    pub async fn search(&self, params: &SearchParams) -> SyncResult<SearchResult> {
        let _timer = crate::time_operation!("reconciler", "search");

        let records = match self.records_for(params).await {
            Ok(records) => records,
            Err(e) => {
                crate::metrics::record_search_query("error", 0);
                return Err(e);
            }
        };

        let mut contacts: Vec<Contact> = records.iter().map(|r| self.translator.from_remote(r)).collect();
        sort_newest_first(&mut contacts, params.order_by);

        let result = search::apply(params, contacts);
        debug!(total = result.total, returned = result.contacts.len(), "Search complete");
        crate::metrics::record_search_query("success", result.total);
        Ok(result)
    }

    /// Totals, category breakdown and recent activity over the snapshot.
    pub async fn analytics(&self) -> SyncResult<Analytics> {
        let _timer = crate::time_operation!("reconciler", "analytics");
        let snapshot = self.load_snapshot().await?;
        let contacts: Vec<Contact> = snapshot.iter().map(|r| self.translator.from_remote(r)).collect();
        Ok(Analytics::compute(&contacts, self.translator.categories(), now_millis()))
    }

    async fn records_for(&self, params: &SearchParams) -> SyncResult<Arc<Vec<RemoteRecord>>> {
        if !params.include_archived {
            return self.load_snapshot().await;
        }
        let query = params.remote_query(self.config.page_size);
        let records = self.fetch_all(&query).await.map_err(|e| match e {
            SyncError::Remote(remote) => SyncError::SnapshotUnavailable(remote),
            other => other,
        })?;
        Ok(Arc::new(records))
    }
}

fn sort_newest_first(contacts: &mut [Contact], order_by: OrderBy) {
    match order_by {
        OrderBy::Created => contacts.sort_by_key(|c| Reverse(c.created_at)),
        OrderBy::Updated => contacts.sort_by_key(|c| Reverse(c.updated_at)),
        OrderBy::Id => contacts.sort_by(|a, b| b.id.cmp(&a.id)),
    }
}
