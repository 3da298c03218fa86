//! In-process [`CrmStore`] with the remote's observable semantics: assigned
//! ids, server timestamps, partial updates, paging and idempotent delete.
//! Call counters let tests assert exactly which operations a run issued.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{CrmStore, CustomField, ListQuery, OrderBy, RecordPage, RemoteError, RemoteRecord};
use crate::contact::now_millis;

#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    record: RemoteRecord,
}

#[derive(Debug, Default)]
pub struct InMemoryCrm {
    data: DashMap<String, Stored>,
    next_id: AtomicU64,
    creates: AtomicUsize,
    gets: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl InMemoryCrm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as-is. An empty id is assigned; timestamps are kept when
    /// present so tests can place records in time.
    pub fn insert(&self, mut record: RemoteRecord) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        if record.id.is_empty() {
            record.id = format!("mem-{seq}");
        }
        let now = now_millis();
        record.created_at.get_or_insert(now);
        record.updated_at.get_or_insert(now);
        let id = record.id.clone();
        self.data.insert(id.clone(), Stored { seq, record });
        id
    }

    /// Get current record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All records in creation order.
    #[must_use]
    pub fn records(&self) -> Vec<RemoteRecord> {
        let mut stored: Vec<Stored> = self.data.iter().map(|r| r.value().clone()).collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.record).collect()
    }

    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Clear all records (counters are kept)
    pub fn clear(&self) {
        self.data.clear();
    }
}

/// Fields present in `patch` replace stored ones by id; the rest are kept.
fn merge_fields(stored: &mut Vec<CustomField>, patch: &[CustomField]) {
    for field in patch {
        match stored.iter_mut().find(|f| f.id == field.id) {
            Some(existing) => existing.value.clone_from(&field.value),
            None => stored.push(field.clone()),
        }
    }
}

fn compare(order_by: OrderBy, a: &Stored, b: &Stored) -> CmpOrdering {
    let primary = match order_by {
        OrderBy::Created => a.record.created_at.cmp(&b.record.created_at),
        OrderBy::Updated => a.record.updated_at.cmp(&b.record.updated_at),
        OrderBy::Id => a.record.id.cmp(&b.record.id),
    };
    primary.then(a.seq.cmp(&b.seq))
}

#[async_trait]
impl CrmStore for InMemoryCrm {
    async fn create(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = now_millis();
        let stored = RemoteRecord {
            id: format!("mem-{seq}"),
            name: record.name.clone(),
            custom_fields: record.custom_fields.iter().filter(|f| f.value.is_some()).cloned().collect(),
            created_at: Some(now),
            updated_at: Some(now),
            archived: false,
        };
        self.data.insert(stored.id.clone(), Stored { seq, record: stored.clone() });
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<RemoteRecord>, RemoteError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.get(id).map(|r| r.value().record.clone()))
    }

    async fn update(&self, id: &str, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut entry = self
            .data
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        let stored = &mut entry.value_mut().record;
        if !record.name.is_empty() {
            stored.name.clone_from(&record.name);
        }
        merge_fields(&mut stored.custom_fields, &record.custom_fields);
        stored.updated_at = Some(now_millis().max(stored.updated_at.unwrap_or(0)));
        Ok(stored.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.data.remove(id);
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<RecordPage, RemoteError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let mut matching: Vec<Stored> = self
            .data
            .iter()
            .filter(|r| query.include_archived || !r.value().record.archived)
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by(|a, b| compare(query.order_by, a, b));
        if query.reverse {
            matching.reverse();
        }

        let total = matching.len();
        let page_size = query.page_size.max(1);
        let start = query.page.saturating_mul(page_size);
        let records: Vec<RemoteRecord> = matching
            .into_iter()
            .skip(start)
            .take(page_size)
            .map(|s| s.record)
            .collect();
        let last_page = start.saturating_add(page_size) >= total;

        Ok(RecordPage {
            records,
            page: query.page,
            last_page,
        })
    }
}
