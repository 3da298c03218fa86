// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Semantic field name → opaque remote field id.
//!
//! The ids are stable per deployment. They are either configured directly
//! (see [`FieldIds::from_map`]) or discovered once from the remote
//! field-listing endpoint with [`FieldIds::resolve`]. A mismatch between this
//! table and the remote schema is a configuration error, not a code defect.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::remote::FieldDefinition;

/// Every Contact attribute that can live in a remote custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactField {
    Email,
    Phone,
    ZipCode,
    Address,
    Relationship,
    ConnectionStrength,
    EngagementCategory,
    PagesVisited,
    TimeOnSite,
    StoriesRead,
    LetterSubmitted,
    VolunteerSignup,
    WillingToTestify,
    LeadScore,
    Tags,
}

impl ContactField {
    pub const ALL: [ContactField; 15] = [
        Self::Email,
        Self::Phone,
        Self::ZipCode,
        Self::Address,
        Self::Relationship,
        Self::ConnectionStrength,
        Self::EngagementCategory,
        Self::PagesVisited,
        Self::TimeOnSite,
        Self::StoriesRead,
        Self::LetterSubmitted,
        Self::VolunteerSignup,
        Self::WillingToTestify,
        Self::LeadScore,
        Self::Tags,
    ];

    /// Configuration key (`CRM_FIELD_MAP` keys, serde field names).
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::ZipCode => "zip_code",
            Self::Address => "address",
            Self::Relationship => "relationship",
            Self::ConnectionStrength => "connection_strength",
            Self::EngagementCategory => "engagement_category",
            Self::PagesVisited => "pages_visited",
            Self::TimeOnSite => "time_on_site",
            Self::StoriesRead => "stories_read",
            Self::LetterSubmitted => "letter_submitted",
            Self::VolunteerSignup => "volunteer_signup",
            Self::WillingToTestify => "willing_to_testify",
            Self::LeadScore => "lead_score",
            Self::Tags => "tags",
        }
    }

    /// Field name as it appears in the remote field listing.
    #[must_use]
    pub fn remote_name(&self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::ZipCode => "Zip Code",
            Self::Address => "Address",
            Self::Relationship => "Relationship",
            Self::ConnectionStrength => "Connection Strength",
            Self::EngagementCategory => "Engagement Category",
            Self::PagesVisited => "Pages Visited",
            Self::TimeOnSite => "Time On Site",
            Self::StoriesRead => "Stories Read",
            Self::LetterSubmitted => "Letter Submitted",
            Self::VolunteerSignup => "Volunteer Signup",
            Self::WillingToTestify => "Willing To Testify",
            Self::LeadScore => "Lead Score",
            Self::Tags => "Tags",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Remote field id per Contact attribute. `None` means the attribute has no
/// remote slot and is dropped on the way out (see
/// [`FieldTranslator::lossy_fields`](crate::FieldTranslator::lossy_fields)).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldIds {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    pub relationship: Option<String>,
    pub connection_strength: Option<String>,
    pub engagement_category: Option<String>,
    pub pages_visited: Option<String>,
    pub time_on_site: Option<String>,
    pub stories_read: Option<String>,
    pub letter_submitted: Option<String>,
    pub volunteer_signup: Option<String>,
    pub willing_to_testify: Option<String>,
    pub lead_score: Option<String>,
    pub tags: Option<String>,
}

impl FieldIds {
    #[must_use]
    pub fn get(&self, field: ContactField) -> Option<&str> {
        self.slot(field).as_deref().filter(|id| !id.trim().is_empty())
    }

    pub fn set(&mut self, field: ContactField, id: impl Into<String>) {
        *self.slot_mut(field) = Some(id.into());
    }

    fn slot(&self, field: ContactField) -> &Option<String> {
        match field {
            ContactField::Email => &self.email,
            ContactField::Phone => &self.phone,
            ContactField::ZipCode => &self.zip_code,
            ContactField::Address => &self.address,
            ContactField::Relationship => &self.relationship,
            ContactField::ConnectionStrength => &self.connection_strength,
            ContactField::EngagementCategory => &self.engagement_category,
            ContactField::PagesVisited => &self.pages_visited,
            ContactField::TimeOnSite => &self.time_on_site,
            ContactField::StoriesRead => &self.stories_read,
            ContactField::LetterSubmitted => &self.letter_submitted,
            ContactField::VolunteerSignup => &self.volunteer_signup,
            ContactField::WillingToTestify => &self.willing_to_testify,
            ContactField::LeadScore => &self.lead_score,
            ContactField::Tags => &self.tags,
        }
    }

    fn slot_mut(&mut self, field: ContactField) -> &mut Option<String> {
        match field {
            ContactField::Email => &mut self.email,
            ContactField::Phone => &mut self.phone,
            ContactField::ZipCode => &mut self.zip_code,
            ContactField::Address => &mut self.address,
            ContactField::Relationship => &mut self.relationship,
            ContactField::ConnectionStrength => &mut self.connection_strength,
            ContactField::EngagementCategory => &mut self.engagement_category,
            ContactField::PagesVisited => &mut self.pages_visited,
            ContactField::TimeOnSite => &mut self.time_on_site,
            ContactField::StoriesRead => &mut self.stories_read,
            ContactField::LetterSubmitted => &mut self.letter_submitted,
            ContactField::VolunteerSignup => &mut self.volunteer_signup,
            ContactField::WillingToTestify => &mut self.willing_to_testify,
            ContactField::LeadScore => &mut self.lead_score,
            ContactField::Tags => &mut self.tags,
        }
    }

    /// Build from `{semantic key: field id}`. Unknown keys are rejected.
    pub fn from_map(map: &HashMap<String, String>) -> SyncResult<Self> {
        let mut ids = Self::default();
        for (key, id) in map {
            let field = ContactField::from_key(key.trim()).ok_or_else(|| {
                SyncError::Configuration(format!("unknown contact field '{key}' in field map"))
            })?;
            ids.set(field, id.trim());
        }
        Ok(ids)
    }

    /// Match remote field definitions by name (case-insensitive). Fields with
    /// no remote counterpart stay unmapped; a missing email field is an error.
    pub fn resolve(definitions: &[FieldDefinition]) -> SyncResult<Self> {
        let mut ids = Self::default();
        for field in ContactField::ALL {
            if let Some(def) = definitions
                .iter()
                .find(|d| d.name.trim().eq_ignore_ascii_case(field.remote_name()))
            {
                ids.set(field, def.id.clone());
            }
        }
        ids.validate()?;
        Ok(ids)
    }

    /// Attributes with no configured remote slot.
    #[must_use]
    pub fn unmapped(&self) -> Vec<ContactField> {
        ContactField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub(crate) fn validate(&self) -> SyncResult<()> {
        if self.get(ContactField::Email).is_none() {
            return Err(SyncError::Configuration(
                "no remote field id configured for 'email'; reconciliation needs it as the join key".into(),
            ));
        }
        let mut seen: HashMap<&str, ContactField> = HashMap::new();
        for field in ContactField::ALL {
            if let Some(id) = self.get(field) {
                if let Some(other) = seen.insert(id, field) {
                    return Err(SyncError::Configuration(format!(
                        "field id '{id}' is mapped to both '{other}' and '{field}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
