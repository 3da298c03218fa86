// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Aggregate counts over a translated snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::contact::Contact;
use crate::mapping::CategoryTable;

/// Bucket for contacts with no resolvable category.
pub const UNCATEGORIZED: &str = "uncategorized";

pub const RECENTLY_ADDED_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;
pub const RECENTLY_UPDATED_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub total_contacts: usize,
    /// Category label → count. Sums to `total_contacts`.
    pub by_category: BTreeMap<String, usize>,
    /// Created within the last 7 days.
    pub recently_added: usize,
    /// Updated within the last 24 hours.
    pub recently_updated: usize,
}

impl Analytics {
    /// Both windows include their boundary: `now - ts <= window`.
    #[must_use]
    pub fn compute(contacts: &[Contact], categories: &CategoryTable, now_ms: i64) -> Self {
        let mut out = Self {
            total_contacts: contacts.len(),
            ..Default::default()
        };

        for contact in contacts {
            let bucket = contact
                .engagement_level
                .map_or(UNCATEGORIZED, |level| categories.category_for(level).label.as_str());
            *out.by_category.entry(bucket.to_string()).or_insert(0) += 1;

            if within(contact.created_at, now_ms, RECENTLY_ADDED_WINDOW_MS) {
                out.recently_added += 1;
            }
            if within(contact.updated_at, now_ms, RECENTLY_UPDATED_WINDOW_MS) {
                out.recently_updated += 1;
            }
        }
        out
    }
}

fn within(timestamp: Option<i64>, now_ms: i64, window_ms: i64) -> bool {
    timestamp.is_some_and(|ts| now_ms.saturating_sub(ts) <= window_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::EngagementLevel;

    const NOW: i64 = 1_700_000_000_000;

    fn contact(level: Option<EngagementLevel>, created: Option<i64>, updated: Option<i64>) -> Contact {
        Contact {
            engagement_level: level,
            created_at: created,
            updated_at: updated,
            ..Contact::new("A", "B", "a@b.c")
        }
    }

    #[test]
    fn test_categories_never_drop_records() {
        let contacts = vec![
            contact(Some(EngagementLevel::High), None, None),
            contact(Some(EngagementLevel::High), None, None),
            contact(Some(EngagementLevel::Low), None, None),
            contact(None, None, None),
        ];
        let stats = Analytics::compute(&contacts, &CategoryTable::default(), NOW);

        assert_eq!(stats.total_contacts, 4);
        assert_eq!(stats.by_category.get("High Engagement"), Some(&2));
        assert_eq!(stats.by_category.get("Low Engagement"), Some(&1));
        assert_eq!(stats.by_category.get(UNCATEGORIZED), Some(&1));
        assert_eq!(stats.by_category.values().sum::<usize>(), stats.total_contacts);
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let contacts = vec![
            contact(None, Some(NOW - RECENTLY_ADDED_WINDOW_MS), Some(NOW - RECENTLY_UPDATED_WINDOW_MS)),
            contact(None, Some(NOW - RECENTLY_ADDED_WINDOW_MS - 1), Some(NOW - RECENTLY_UPDATED_WINDOW_MS - 1)),
            contact(None, None, None),
        ];
        let stats = Analytics::compute(&contacts, &CategoryTable::default(), NOW);

        assert_eq!(stats.recently_added, 1);
        assert_eq!(stats.recently_updated, 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = Analytics::compute(&[], &CategoryTable::default(), NOW);
        assert_eq!(stats, Analytics::default());
    }
}
