//! Client-side filtering and pagination.
//!
//! The remote list endpoint only knows paging, ordering and the archived
//! flag. Everything else in [`SearchParams`] is evaluated here against the
//! translated [`Contact`], and pagination is reapplied afterwards so `total`
//! counts every match.

use serde::{Deserialize, Serialize};

use crate::contact::{Contact, EngagementLevel};
use crate::remote::{ListQuery, OrderBy};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Case-insensitive substring over name, email and tags.
    pub query: Option<String>,
    pub engagement: Option<EngagementLevel>,
    /// Exact relationship match, case-insensitive.
    pub relationship: Option<String>,
    pub letter_submitted: Option<bool>,
    pub volunteer_signup: Option<bool>,
    pub willing_to_testify: Option<bool>,
    pub include_archived: bool,
    pub order_by: OrderBy,
    /// One-based.
    pub page: usize,
    pub limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: None,
            engagement: None,
            relationship: None,
            letter_submitted: None,
            volunteer_signup: None,
            willing_to_testify: None,
            include_archived: false,
            order_by: OrderBy::Created,
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchParams {
    /// Free-text search with default paging.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query: Some(text.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: usize, limit: usize) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// The part of these params the remote evaluates natively.
    #[must_use]
    pub fn remote_query(&self, page_size: usize) -> ListQuery {
        ListQuery {
            page: 0,
            page_size,
            order_by: self.order_by,
            reverse: true,
            include_archived: self.include_archived,
        }
    }

    /// Whether `contact` satisfies every client-side filter.
    #[must_use]
    pub fn matches(&self, contact: &Contact) -> bool {
        if let Some(level) = self.engagement {
            if contact.engagement_level != Some(level) {
                return false;
            }
        }
        if let Some(wanted) = self.relationship.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let actual = contact.relationship.as_deref().unwrap_or("").trim();
            if !actual.eq_ignore_ascii_case(wanted) {
                return false;
            }
        }
        let flags = [
            (self.letter_submitted, contact.letter_submitted),
            (self.volunteer_signup, contact.volunteer_signup),
            (self.willing_to_testify, contact.willing_to_testify),
        ];
        if flags.iter().any(|(want, have)| want.is_some_and(|w| w != *have)) {
            return false;
        }
        match self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => matches_text(contact, &q.to_lowercase()),
            None => true,
        }
    }

    fn effective_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_LIMIT,
            n => n.min(MAX_LIMIT),
        }
    }
}

/// A match in any one field is enough.
fn matches_text(contact: &Contact, needle: &str) -> bool {
    let name = format!("{} {}", contact.first_name, contact.last_name);
    name.to_lowercase().contains(needle)
        || contact.email.to_lowercase().contains(needle)
        || contact.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub contacts: Vec<Contact>,
    /// Matches before pagination.
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl SearchResult {
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.limit.max(1))
    }
}

/// Filter `contacts` and cut out the requested page.
#[must_use]
pub fn apply(params: &SearchParams, contacts: Vec<Contact>) -> SearchResult {
    let matching: Vec<Contact> = contacts.into_iter().filter(|c| params.matches(c)).collect();
    let total = matching.len();
    let page = params.page.max(1);
    let limit = params.effective_limit();

    let contacts = matching
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    SearchResult {
        contacts,
        total,
        page,
        limit,
    }
}
