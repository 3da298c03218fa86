//! Contact data structure.
//!
//! The [`Contact`] is the canonical internal record of a supporter. It flows
//! into the reconciler from form submissions and imports, and comes back out
//! with a remote `id` and timestamps once it has been written to the CRM.
//!
//! # Example
//!
//! ```
//! use contact_sync::{Contact, EngagementLevel};
//!
//! let mut contact = Contact::new("Ada", "Lovelace", " Ada@Example.com ");
//! contact.engagement_level = Some(EngagementLevel::High);
//!
//! assert_eq!(contact.normalized_email(), "ada@example.com");
//! assert_eq!(contact.display_name(), "Ada Lovelace");
//! assert!(contact.id.is_none());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How engaged a supporter currently is.
///
/// Derived elsewhere; the engine only uses it to pick a remote category label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    /// All levels, highest first.
    pub const ALL: [EngagementLevel; 3] = [Self::High, Self::Medium, Self::Low];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of `high`, `medium`, `low`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engagement level '{0}'")]
pub struct UnknownEngagementLevel(pub String);

impl FromStr for EngagementLevel {
    type Err = UnknownEngagementLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(UnknownEngagementLevel(s.to_string())),
        }
    }
}

/// Internal, canonical supporter record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    /// Remote-assigned id; `None` until the first successful remote write.
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Join key for reconciliation (compared after [`normalize_email`]).
    pub email: String,
    pub phone: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    /// Free-form relationship to the cause ("supporter", "volunteer", ...).
    pub relationship: Option<String>,
    /// Ordinal strength indicator, 0 = unknown.
    pub connection_strength: u8,
    pub engagement_level: Option<EngagementLevel>,

    /// Append-only; ordering irrelevant.
    pub pages_visited: Vec<String>,
    /// Seconds.
    pub time_on_site: u64,
    /// Append-only; ordering irrelevant.
    pub stories_read: Vec<String>,

    /// Conversion flags are monotonic: once true, never reverted by this engine.
    pub letter_submitted: bool,
    pub volunteer_signup: bool,
    pub willing_to_testify: bool,

    /// Opaque score computed elsewhere, passed through.
    pub lead_score: f64,
    pub tags: BTreeSet<String>,

    /// Epoch millis, refreshed only on successful remote write.
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Contact {
    /// Create a not-yet-synced contact with the minimal identifying fields.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    /// Email in the form used as the reconciliation key.
    #[must_use]
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }

    #[must_use]
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }

    /// Single display string used for the remote `name`.
    ///
    /// Falls back to the email when both name parts are blank, since the
    /// remote requires a non-empty name.
    #[must_use]
    pub fn display_name(&self) -> String {
        let joined = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let joined = joined.trim();
        if joined.is_empty() {
            self.email.trim().to_string()
        } else {
            joined.to_string()
        }
    }

    /// Fold a previously stored version of this contact into `self` so that
    /// append-only and monotonic fields never regress.
    ///
    /// Behavioural lists become the union (local order first), conversion
    /// flags are OR-ed, and counters keep the maximum. Identity fields and
    /// free text keep the local value unless the local one is empty.
    pub fn absorb(&mut self, stored: &Contact) {
        union_into(&mut self.pages_visited, &stored.pages_visited);
        union_into(&mut self.stories_read, &stored.stories_read);

        self.letter_submitted |= stored.letter_submitted;
        self.volunteer_signup |= stored.volunteer_signup;
        self.willing_to_testify |= stored.willing_to_testify;

        self.time_on_site = self.time_on_site.max(stored.time_on_site);
        self.connection_strength = self.connection_strength.max(stored.connection_strength);
        if stored.lead_score > self.lead_score {
            self.lead_score = stored.lead_score;
        }

        self.tags.extend(stored.tags.iter().cloned());

        fill_if_empty(&mut self.phone, &stored.phone);
        fill_if_empty(&mut self.zip_code, &stored.zip_code);
        fill_if_empty(&mut self.address, &stored.address);
        fill_if_empty(&mut self.relationship, &stored.relationship);
        if self.engagement_level.is_none() {
            self.engagement_level = stored.engagement_level;
        }
        if self.id.is_none() {
            self.id.clone_from(&stored.id);
        }
        if self.created_at.is_none() {
            self.created_at = stored.created_at;
        }
    }
}

fn union_into(target: &mut Vec<String>, extra: &[String]) {
    for value in extra {
        if !target.iter().any(|existing| existing == value) {
            target.push(value.clone());
        }
    }
}

fn fill_if_empty(target: &mut Option<String>, stored: &Option<String>) {
    let empty = target.as_deref().map_or(true, |s| s.trim().is_empty());
    if empty && stored.is_some() {
        target.clone_from(stored);
    }
}

/// Lower-cased, trimmed email used as the join key.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
