// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Contact reconciler.
//!
//! The [`Reconciler`] ties the components together:
//! - [`FieldTranslator`] for Contact ⇄ RemoteRecord
//! - a [`CrmStore`] for remote calls
//! - [`BatchExecutor`] with a shared [`Throttle`] and [`RetryPolicy`](crate::RetryPolicy)
//! - [`SnapshotCache`] for the remote listing
//!
//! # Run phases
//!
//! ```text
//! Idle → Loading → Diffing → Executing → Reporting → Idle
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use contact_sync::{Contact, ContactField, CrmSyncConfig, Reconciler, RunPhase};
//! use contact_sync::remote::InMemoryCrm;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut config = CrmSyncConfig { batch_delay_ms: 0, ..Default::default() };
//! config.fields.set(ContactField::Email, "cf-email");
//!
//! let crm = Arc::new(InMemoryCrm::new());
//! let reconciler = Reconciler::new(config, crm.clone()).unwrap();
//! assert_eq!(reconciler.phase(), RunPhase::Idle);
//!
//! let report = reconciler.sync(&[Contact::new("Ada", "Lovelace", "ada@example.com")]).await.unwrap();
//! assert_eq!(report.created, 1);
//! assert_eq!(crm.len(), 1);
//! # }
//! ```

mod api;
mod diff;
mod search_api;
mod types;

pub use diff::{plan, PlannedUpdate, RemoteIndex, SyncPlan};
pub use types::{RecordFailure, RunPhase, SyncReport};

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::batching::BatchExecutor;
use crate::config::CrmSyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::mapping::FieldTranslator;
use crate::remote::{CrmStore, ListQuery, RemoteError, RemoteRecord};
use crate::resilience::Throttle;
use crate::search::SnapshotCache;

/// Reconciles local contacts with the remote CRM.
///
/// `Send + Sync`; share it behind an `Arc`. Sync runs on one instance are
/// serialized; search and analytics may run alongside them.
pub struct Reconciler {
    pub(super) config: CrmSyncConfig,
    pub(super) store: Arc<dyn CrmStore>,
    pub(super) translator: Arc<FieldTranslator>,
    pub(super) throttle: Arc<Throttle>,
    pub(super) executor: BatchExecutor,
    pub(super) cache: SnapshotCache,
    pub(super) phase: watch::Sender<RunPhase>,
    pub(super) phase_rx: watch::Receiver<RunPhase>,
    /// Held for the duration of a sync run
    pub(super) run_lock: Mutex<()>,
}

impl Reconciler {
    /// Create a reconciler with its own throttle built from `config`.
    pub fn new(config: CrmSyncConfig, store: Arc<dyn CrmStore>) -> SyncResult<Self> {
        let throttle = Arc::new(config.throttle());
        Self::with_throttle(config, store, throttle)
    }

    /// Create a reconciler that draws from an existing throttle, e.g. one
    /// shared by several reconcilers against the same remote quota.
    pub fn with_throttle(config: CrmSyncConfig, store: Arc<dyn CrmStore>, throttle: Arc<Throttle>) -> SyncResult<Self> {
        config.validate_engine()?;

        let translator = Arc::new(config.translator());
        let lossy: Vec<&'static str> = translator.lossy_fields().iter().map(|f| f.key()).collect();
        if !lossy.is_empty() {
            info!(fields = ?lossy, "Contact fields without a remote slot will not round-trip");
        }

        let executor = BatchExecutor::new(config.batch_config(), config.retry.clone(), Arc::clone(&throttle));
        let cache = SnapshotCache::new(config.snapshot_ttl());
        let (phase, phase_rx) = watch::channel(RunPhase::Idle);

        Ok(Self {
            config,
            store,
            translator,
            throttle,
            executor,
            cache,
            phase,
            phase_rx,
            run_lock: Mutex::new(()),
        })
    }

    /// Get current run phase.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        *self.phase_rx.borrow()
    }

    /// Get a receiver to watch phase changes.
    #[must_use]
    pub fn phase_receiver(&self) -> watch::Receiver<RunPhase> {
        self.phase_rx.clone()
    }

    #[must_use]
    pub fn config(&self) -> &CrmSyncConfig {
        &self.config
    }

    #[must_use]
    pub fn translator(&self) -> &FieldTranslator {
        &self.translator
    }

    #[must_use]
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Forget the cached snapshot; the next read fetches from the remote.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    pub(super) fn set_phase(&self, phase: RunPhase) {
        debug!(phase = %phase, "Run phase");
        crate::metrics::set_run_phase(phase.as_str());
        self.phase.send_replace(phase);
    }

    /// One throttled, retried remote call.
    pub(super) async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let throttle = &self.throttle;
        self.config
            .retry
            .execute(operation, || {
                let attempt = f();
                async move {
                    throttle.acquire().await;
                    attempt.await.map_err(SyncError::from)
                }
            })
            .await
    }

    /// Every page of `query`. A collection larger than `max_remote_records`
    /// is a configuration error; a partial listing is never returned.
    pub(super) async fn fetch_all(&self, query: &ListQuery) -> SyncResult<Vec<RemoteRecord>> {
        let max_records = self.config.max_remote_records;
        let mut records = Vec::new();
        let mut page = query.page;
        loop {
            let page_query = query.with_page(page);
            let batch = self.call("list", || self.store.list(&page_query)).await?;
            let last = batch.last_page || batch.records.is_empty();
            records.extend(batch.records);
            if last {
                break;
            }
            if records.len() >= max_records {
                warn!(fetched = records.len(), max_records, "Remote record limit reached before the last page");
                return Err(SyncError::Configuration(format!(
                    "remote collection holds more than {max_records} records (max_remote_records)"
                )));
            }
            page += 1;
        }
        Ok(records)
    }

    /// Cached snapshot, or a fresh full listing. Failure is fatal for the caller.
    pub(super) async fn load_snapshot(&self) -> SyncResult<Arc<Vec<RemoteRecord>>> {
        if let Some(snapshot) = self.cache.get() {
            debug!(records = snapshot.len(), "Using cached remote snapshot");
            return Ok(snapshot);
        }

        let generation = self.cache.generation();
        let records = self
            .fetch_all(&self.config.snapshot_query())
            .await
            .map_err(|e| match e {
                SyncError::Remote(remote) => SyncError::SnapshotUnavailable(remote),
                other => other,
            })?;
        debug!(records = records.len(), "Fetched remote snapshot");
        Ok(self.cache.insert(records, generation))
    }
}
