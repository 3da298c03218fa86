//! Write API: batch sync, single-record upsert, delete and get.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::batching::BatchOutcome;
use crate::contact::{now_millis, Contact};
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteRecord;

use super::diff::{self, PlannedUpdate, RemoteIndex};
use super::{Reconciler, RunPhase, SyncReport};

impl Reconciler {
    /// Reconcile `contacts` with the remote CRM.
    ///
    /// Returns a report even when individual records fail. Only a missing
    /// remote snapshot or a configuration problem is an `Err`.
    pub async fn sync(&self, contacts: &[Contact]) -> SyncResult<SyncReport> {
        self.sync_with_cancel(contacts, &CancellationToken::new()).await
    }

    /// [`sync`](Self::sync) that stops starting new batches once `cancel`
    /// fires. In-flight records finish and are counted; the report is
    /// marked `cancelled`.
    #[tracing::instrument(skip(self, contacts, cancel), fields(contacts = contacts.len()))]
    pub async fn sync_with_cancel(&self, contacts: &[Contact], cancel: &CancellationToken) -> SyncResult<SyncReport> {
        let _run = self.run_lock.lock().await;
        let started = Instant::now();

        let result = self.run(contacts, cancel).await;
        self.set_phase(RunPhase::Idle);

        let status = match &result {
            Ok(report) if report.cancelled => "cancelled",
            Ok(report) if report.is_success() => "success",
            Ok(_) => "partial",
            Err(_) => "failed",
        };
        crate::metrics::record_sync_run(status, started.elapsed());
        result
    }

    async fn run(&self, contacts: &[Contact], cancel: &CancellationToken) -> SyncResult<SyncReport> {
        self.set_phase(RunPhase::Loading);
        let snapshot = match self.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Sync aborted: remote snapshot unavailable");
                return Err(e);
            }
        };

        self.set_phase(RunPhase::Diffing);
        let index = RemoteIndex::build(&snapshot, &self.translator);
        let plan = diff::plan(contacts, &snapshot, &index, &self.translator, self.config.skip_unchanged);
        info!(
            remote_records = snapshot.len(),
            to_create = plan.to_create.len(),
            to_update = plan.to_update.len(),
            invalid = plan.invalid,
            skipped = plan.skipped,
            unchanged = plan.unchanged,
            "Sync plan ready"
        );

        let mut report = SyncReport {
            invalid: plan.invalid,
            skipped: plan.skipped,
            unchanged: plan.unchanged,
            ..Default::default()
        };

        self.set_phase(RunPhase::Executing);
        let wrote = !plan.to_create.is_empty() || !plan.to_update.is_empty();

        let store = Arc::clone(&self.store);
        let translator = Arc::clone(&self.translator);
        let created = self
            .executor
            .run_batched(
                "create",
                plan.to_create,
                move |contact: Contact| {
                    let store = Arc::clone(&store);
                    let translator = Arc::clone(&translator);
                    async move {
                        require_email(&contact)?;
                        let record = translator.to_remote(&contact);
                        Ok::<_, SyncError>(store.create(&record).await?)
                    }
                },
                cancel,
            )
            .await;
        let create_fatal = absorb_outcome(&mut report, created, |c| c.email.clone(), |n, r| r.created += n);

        let updated = match create_fatal {
            Some(_) => None,
            None => {
                let store = Arc::clone(&self.store);
                let translator = Arc::clone(&self.translator);
                Some(
                    self.executor
                        .run_batched(
                            "update",
                            plan.to_update,
                            move |planned: PlannedUpdate| {
                                let store = Arc::clone(&store);
                                let translator = Arc::clone(&translator);
                                async move {
                                    let record = translator.to_remote(&planned.contact);
                                    Ok::<_, SyncError>(store.update(&planned.remote_id, &record).await?)
                                }
                            },
                            cancel,
                        )
                        .await,
                )
            }
        };
        let update_fatal = updated.and_then(|outcome| {
            absorb_outcome(&mut report, outcome, |p| p.contact.email.clone(), |n, r| r.updated += n)
        });

        if wrote {
            self.cache.invalidate();
        }

        if let Some(fatal) = create_fatal.or(update_fatal) {
            warn!(error = %fatal, "Sync aborted by configuration error");
            return Err(fatal);
        }

        self.set_phase(RunPhase::Reporting);
        for failure in &report.failures {
            warn!(email = %failure.email, reason = %failure.reason, "Record sync failed");
        }
        crate::metrics::record_sync_outcome("created", report.created);
        crate::metrics::record_sync_outcome("updated", report.updated);
        crate::metrics::record_sync_outcome("error", report.errors);
        crate::metrics::record_sync_outcome("invalid", report.invalid);
        crate::metrics::record_sync_outcome("skipped", report.skipped);
        crate::metrics::record_sync_outcome("unchanged", report.unchanged);
        info!(
            created = report.created,
            updated = report.updated,
            errors = report.errors,
            invalid = report.invalid,
            skipped = report.skipped,
            unchanged = report.unchanged,
            cancelled = report.cancelled,
            "Sync run complete"
        );
        Ok(report)
    }

    /// Create or update one contact, matching by email against the current
    /// snapshot. Returns the contact with its remote id and timestamps.
    #[tracing::instrument(skip(self, contact))]
    pub async fn create_or_update(&self, contact: &Contact) -> SyncResult<Contact> {
        require_email(contact)?;
        let snapshot = self.load_snapshot().await?;
        let index = RemoteIndex::build(&snapshot, &self.translator);

        let mut merged = contact.clone();
        let written = match index.lookup(&contact.email).and_then(|pos| snapshot.get(pos)) {
            Some(existing) => {
                merged.absorb(&self.translator.from_remote(existing));
                let record = self.translator.to_remote(&merged);
                let result = self.call("update", || self.store.update(&existing.id, &record)).await;
                self.cache.invalidate();
                result?
            }
            None => {
                let record = self.translator.to_remote(&merged);
                let result = self.call("create", || self.store.create(&record)).await;
                self.cache.invalidate();
                result?
            }
        };

        stamp(&mut merged, &written);
        Ok(merged)
    }

    /// Delete a remote record. Deleting an id that is already gone succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        let result = self.call("delete", || self.store.delete(id)).await;
        self.cache.invalidate();
        result
    }

    /// Fetch and translate one remote record.
    pub async fn get(&self, id: &str) -> SyncResult<Option<Contact>> {
        let record = self.call("get", || self.store.get(id)).await?;
        Ok(record.map(|r| self.translator.from_remote(&r)))
    }
}

fn require_email(contact: &Contact) -> SyncResult<()> {
    if contact.has_email() {
        Ok(())
    } else {
        Err(SyncError::Validation("email is required".into()))
    }
}

/// Take id and timestamps from the remote's answer, falling back to now.
fn stamp(contact: &mut Contact, written: &RemoteRecord) {
    if !written.id.is_empty() {
        contact.id = Some(written.id.clone());
    }
    let now = now_millis();
    contact.created_at = written.created_at.or(contact.created_at).or(Some(now));
    contact.updated_at = Some(written.updated_at.unwrap_or(now));
}

/// Fold one executor outcome into the report; returns its fatal error, if any.
fn absorb_outcome<T>(
    report: &mut SyncReport,
    outcome: BatchOutcome<T, RemoteRecord>,
    email_of: impl Fn(&T) -> String,
    count: impl FnOnce(usize, &mut SyncReport),
) -> Option<SyncError> {
    count(outcome.succeeded.len(), report);
    for (item, err) in &outcome.failed {
        report.record_failure(email_of(item), err.to_string());
    }
    for _ in 0..outcome.aborted {
        report.record_failure(String::new(), "task aborted");
    }
    report.cancelled |= outcome.cancelled;
    outcome.fatal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrmSyncConfig;
    use crate::mapping::ContactField;
    use crate::remote::{CrmStore, InMemoryCrm};

    fn config() -> CrmSyncConfig {
        let mut config = CrmSyncConfig {
            batch_delay_ms: 0,
            ..Default::default()
        };
        config.fields.set(ContactField::Email, "cf-email");
        config.fields.set(ContactField::Tags, "cf-tags");
        config
    }

    #[tokio::test]
    async fn test_create_or_update_creates_then_updates() {
        let crm = Arc::new(InMemoryCrm::new());
        let reconciler = Reconciler::new(config(), crm.clone()).unwrap();

        let mut contact = Contact::new("Ada", "Lovelace", "ada@x.com");
        contact.tags.insert("founder".into());
        let first = reconciler.create_or_update(&contact).await.unwrap();
        assert!(first.id.is_some());
        assert!(first.created_at.is_some());
        assert_eq!(crm.create_calls(), 1);

        let mut again = Contact::new("Ada", "Lovelace", "ADA@x.com");
        again.tags.insert("speaker".into());
        let second = reconciler.create_or_update(&again).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(crm.create_calls(), 1);
        assert_eq!(crm.update_calls(), 1);
        assert!(second.tags.contains("founder"));
        assert!(second.tags.contains("speaker"));
    }

    #[tokio::test]
    async fn test_create_or_update_requires_email() {
        let crm = Arc::new(InMemoryCrm::new());
        let reconciler = Reconciler::new(config(), crm.clone()).unwrap();
        let err = reconciler.create_or_update(&Contact::new("No", "Email", "")).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(crm.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_invalidates() {
        let crm = Arc::new(InMemoryCrm::new());
        let reconciler = Reconciler::new(config(), crm.clone()).unwrap();
        let saved = reconciler.create_or_update(&Contact::new("A", "B", "a@b.c")).await.unwrap();
        let id = saved.id.unwrap();

        reconciler.load_snapshot().await.unwrap();
        reconciler.delete(&id).await.unwrap();
        reconciler.delete(&id).await.unwrap();
        assert!(reconciler.cache().stats().cached_records.is_none());
        assert!(crm.is_empty());
        assert_eq!(reconciler.get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_translates() {
        let crm = Arc::new(InMemoryCrm::new());
        let reconciler = Reconciler::new(config(), crm.clone()).unwrap();
        let record = reconciler.translator().to_remote(&Contact::new("Grace", "Hopper", "grace@x.com"));
        let created = crm.create(&record).await.unwrap();

        let contact = reconciler.get(&created.id).await.unwrap().unwrap();
        assert_eq!(contact.first_name, "Grace");
        assert_eq!(contact.email, "grace@x.com");
    }
}
