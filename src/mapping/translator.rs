//! Bidirectional Contact ⇄ RemoteRecord translation.
//!
//! Pure functions, no I/O. Encoding rules per attribute:
//!
//! | Contact attribute | Remote shape | Omitted when |
//! |---|---|---|
//! | first + last name | record `name` (single string) | never (falls back to email) |
//! | email, phone, zip, address, relationship | text | empty |
//! | engagement level | single-select `[category id]` | no level |
//! | pages visited, stories read, tags | text joined with `", "` | empty |
//! | connection strength, time on site, lead score | number | zero |
//! | conversion flags | text `"true"` | false |
//!
//! Omitting instead of sending `""`/`false` matters: the remote reads an
//! explicit empty value as "clear this field". It is also what keeps the
//! conversion flags monotonic.
//!
//! Lossy attributes: anything whose field id is not configured (see
//! [`FieldTranslator::lossy_fields`]), and the first/last split, which is
//! rebuilt by splitting the remote name on its first space.

use crate::contact::{Contact, EngagementLevel};
use crate::mapping::category::{CategoryLabel, CategoryTable};
use crate::mapping::fields::{ContactField, FieldIds};
use crate::remote::{CustomField, CustomValue, RemoteRecord};

/// Separator for list-valued attributes stored in plain-text fields.
pub const LIST_DELIMITER: &str = ", ";

const TRUE_TEXT: &str = "true";

#[derive(Debug, Clone)]
pub struct FieldTranslator {
    fields: FieldIds,
    categories: CategoryTable,
}

impl FieldTranslator {
    pub fn new(fields: FieldIds, categories: CategoryTable) -> Self {
        Self { fields, categories }
    }

    #[must_use]
    pub fn fields(&self) -> &FieldIds {
        &self.fields
    }

    #[must_use]
    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    #[must_use]
    pub fn engagement_to_category(&self, level: &str) -> Option<&CategoryLabel> {
        self.categories.engagement_to_category(level)
    }

    /// Contact attributes that do not survive a trip through the remote.
    #[must_use]
    pub fn lossy_fields(&self) -> Vec<ContactField> {
        self.fields.unmapped()
    }

    pub fn to_remote(&self, contact: &Contact) -> RemoteRecord {
        let mut out = Vec::new();

        self.push_text(&mut out, ContactField::Email, Some(contact.email.trim()));
        self.push_text(&mut out, ContactField::Phone, contact.phone.as_deref());
        self.push_text(&mut out, ContactField::ZipCode, contact.zip_code.as_deref());
        self.push_text(&mut out, ContactField::Address, contact.address.as_deref());
        self.push_text(&mut out, ContactField::Relationship, contact.relationship.as_deref());

        if let Some(level) = contact.engagement_level {
            if let Some(field_id) = self.fields.get(ContactField::EngagementCategory) {
                let category = self.categories.category_for(level);
                out.push(CustomField::new(field_id, CustomValue::SingleSelect(category.id.clone())));
            }
        }

        self.push_list(&mut out, ContactField::PagesVisited, contact.pages_visited.iter());
        self.push_list(&mut out, ContactField::StoriesRead, contact.stories_read.iter());
        self.push_list(&mut out, ContactField::Tags, contact.tags.iter());

        self.push_number(&mut out, ContactField::ConnectionStrength, f64::from(contact.connection_strength));
        self.push_number(&mut out, ContactField::TimeOnSite, contact.time_on_site as f64);
        self.push_number(&mut out, ContactField::LeadScore, contact.lead_score);

        self.push_flag(&mut out, ContactField::LetterSubmitted, contact.letter_submitted);
        self.push_flag(&mut out, ContactField::VolunteerSignup, contact.volunteer_signup);
        self.push_flag(&mut out, ContactField::WillingToTestify, contact.willing_to_testify);

        RemoteRecord {
            id: contact.id.clone().unwrap_or_default(),
            name: contact.display_name(),
            custom_fields: out,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
            archived: false,
        }
    }

    /// Never fails: missing or malformed fields become their zero value.
    pub fn from_remote(&self, record: &RemoteRecord) -> Contact {
        let email = self.text(record, ContactField::Email).unwrap_or_default();
        let (first_name, last_name) = split_name(&record.name, &email);

        Contact {
            id: Some(record.id.clone()).filter(|id| !id.is_empty()),
            first_name,
            last_name,
            email,
            phone: self.text(record, ContactField::Phone),
            zip_code: self.text(record, ContactField::ZipCode),
            address: self.text(record, ContactField::Address),
            relationship: self.text(record, ContactField::Relationship),
            connection_strength: self
                .number(record, ContactField::ConnectionStrength)
                .map_or(0, |n| n.clamp(0.0, f64::from(u8::MAX)) as u8),
            engagement_level: self.engagement(record),
            pages_visited: self.list(record, ContactField::PagesVisited),
            time_on_site: self.number(record, ContactField::TimeOnSite).map_or(0, |n| n.max(0.0) as u64),
            stories_read: self.list(record, ContactField::StoriesRead),
            letter_submitted: self.flag(record, ContactField::LetterSubmitted),
            volunteer_signup: self.flag(record, ContactField::VolunteerSignup),
            willing_to_testify: self.flag(record, ContactField::WillingToTestify),
            lead_score: self.number(record, ContactField::LeadScore).unwrap_or(0.0),
            tags: self.list(record, ContactField::Tags).into_iter().collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Category label a record resolves to, if any.
    #[must_use]
    pub fn category_label(&self, record: &RemoteRecord) -> Option<&str> {
        self.engagement(record)
            .map(|level| self.categories.category_for(level).label.as_str())
    }

    // ── encoding ──────────────────────────────────────────────────────

    fn push_text(&self, out: &mut Vec<CustomField>, field: ContactField, value: Option<&str>) {
        let Some(field_id) = self.fields.get(field) else { return };
        if let Some(text) = value.map(str::trim).filter(|s| !s.is_empty()) {
            out.push(CustomField::new(field_id, CustomValue::Text(text.to_string())));
        }
    }

    fn push_list<'a>(&self, out: &mut Vec<CustomField>, field: ContactField, values: impl Iterator<Item = &'a String>) {
        let Some(field_id) = self.fields.get(field) else { return };
        let joined = values
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(LIST_DELIMITER);
        if !joined.is_empty() {
            out.push(CustomField::new(field_id, CustomValue::Text(joined)));
        }
    }

    fn push_number(&self, out: &mut Vec<CustomField>, field: ContactField, value: f64) {
        let Some(field_id) = self.fields.get(field) else { return };
        if value != 0.0 && value.is_finite() {
            out.push(CustomField::new(field_id, CustomValue::Number(value)));
        }
    }

    fn push_flag(&self, out: &mut Vec<CustomField>, field: ContactField, value: bool) {
        let Some(field_id) = self.fields.get(field) else { return };
        if value {
            out.push(CustomField::new(field_id, CustomValue::Text(TRUE_TEXT.to_string())));
        }
    }

    // ── decoding ──────────────────────────────────────────────────────

    fn value<'r>(&self, record: &'r RemoteRecord, field: ContactField) -> Option<&'r CustomValue> {
        self.fields.get(field).and_then(|id| record.field(id))
    }

    fn text(&self, record: &RemoteRecord, field: ContactField) -> Option<String> {
        match self.value(record, field)? {
            CustomValue::Text(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            CustomValue::Number(n) => Some(n.to_string()),
            CustomValue::SingleSelect(_) => None,
        }
    }

    fn list(&self, record: &RemoteRecord, field: ContactField) -> Vec<String> {
        self.value(record, field)
            .and_then(CustomValue::as_text)
            .map(split_list)
            .unwrap_or_default()
    }

    fn number(&self, record: &RemoteRecord, field: ContactField) -> Option<f64> {
        self.value(record, field)
            .and_then(CustomValue::as_number)
            .filter(|n| n.is_finite())
    }

    fn flag(&self, record: &RemoteRecord, field: ContactField) -> bool {
        match self.value(record, field) {
            Some(CustomValue::Text(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
            Some(CustomValue::Number(n)) => *n != 0.0,
            _ => false,
        }
    }

    fn engagement(&self, record: &RemoteRecord) -> Option<EngagementLevel> {
        self.value(record, ContactField::EngagementCategory)
            .and_then(CustomValue::as_select)
            .and_then(|id| self.categories.level_for_id(id))
    }
}

/// Split a text value on [`LIST_DELIMITER`], dropping empty tokens. A bare
/// comma stays inside its token.
#[must_use]
pub fn split_list(text: &str) -> Vec<String> {
    text.split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// First whitespace-delimited token is the first name, the rest the last name.
/// A name that is just the email (the fallback on write) yields empty parts.
fn split_name(name: &str, email: &str) -> (String, String) {
    let name = name.trim();
    if name.is_empty() || (!email.is_empty() && name.eq_ignore_ascii_case(email)) {
        return (String::new(), String::new());
    }
    match name.split_once(char::is_whitespace) {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}
