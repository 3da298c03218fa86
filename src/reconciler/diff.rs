// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Snapshot index and create/update classification.
//!
//! Pure and synchronous: no remote calls happen here.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::contact::{normalize_email, Contact};
use crate::mapping::FieldTranslator;
use crate::remote::RemoteRecord;

/// Normalized email → position in the snapshot. The first record carrying
/// an email wins; later remote duplicates are never touched.
#[derive(Debug, Default)]
pub struct RemoteIndex {
    by_email: HashMap<String, usize>,
    duplicates: usize,
    without_email: usize,
}

impl RemoteIndex {
    #[must_use]
    pub fn build(snapshot: &[RemoteRecord], translator: &FieldTranslator) -> Self {
        let mut index = Self::default();
        for (pos, record) in snapshot.iter().enumerate() {
            let email = normalize_email(&translator.from_remote(record).email);
            if email.is_empty() {
                index.without_email += 1;
                continue;
            }
            if index.by_email.contains_key(&email) {
                index.duplicates += 1;
                continue;
            }
            index.by_email.insert(email, pos);
        }
        if index.duplicates > 0 {
            warn!(duplicates = index.duplicates, "Remote snapshot has several records per email; first match wins");
        }
        if index.without_email > 0 {
            debug!(records = index.without_email, "Remote records without email ignored for matching");
        }
        index
    }

    #[must_use]
    pub fn lookup(&self, email: &str) -> Option<usize> {
        self.by_email.get(&normalize_email(email)).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }

    /// Remote records that share an email with an earlier one.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

/// A matched contact, already merged with what the remote holds.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub remote_id: String,
    pub contact: Contact,
}

#[derive(Debug, Default)]
pub struct SyncPlan {
    pub to_create: Vec<Contact>,
    pub to_update: Vec<PlannedUpdate>,
    pub invalid: usize,
    pub skipped: usize,
    pub unchanged: usize,
}

/// Classify every local contact against the snapshot.
///
/// - no email → `invalid`
/// - email seen earlier in `contacts` → `skipped`
/// - email absent from the index → `to_create`
/// - otherwise → `to_update`, with the local contact absorbing the remote one;
///   with `skip_unchanged`, an update that would change nothing is `unchanged`
#[must_use]
pub fn plan(
    contacts: &[Contact],
    snapshot: &[RemoteRecord],
    index: &RemoteIndex,
    translator: &FieldTranslator,
    skip_unchanged: bool,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(contacts.len());

    for contact in contacts {
        if !contact.has_email() {
            plan.invalid += 1;
            continue;
        }
        let email = contact.normalized_email();
        if !seen.insert(email.clone()) {
            debug!(email = %email, "Duplicate email in input, skipping");
            plan.skipped += 1;
            continue;
        }

        let Some(record) = index.lookup(&email).and_then(|pos| snapshot.get(pos)) else {
            plan.to_create.push(contact.clone());
            continue;
        };

        let mut merged = contact.clone();
        merged.absorb(&translator.from_remote(record));
        merged.id = Some(record.id.clone());

        if skip_unchanged && record.payload_matches(&translator.to_remote(&merged)) {
            plan.unchanged += 1;
            continue;
        }
        plan.to_update.push(PlannedUpdate {
            remote_id: record.id.clone(),
            contact: merged,
        });
    }
    plan
}
