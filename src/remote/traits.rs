//! Remote record types and the [`CrmStore`] seam.
//!
//! The remote CRM addresses custom fields by opaque id and stores loosely
//! typed values. [`CustomValue`] narrows those values to the three shapes the
//! engine writes; anything else read back from the wire becomes `None` on the
//! field instead of failing the whole record.

use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("remote record not found: {0}")]
    NotFound(String),
    #[error("remote returned HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("failed to parse remote response: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Retryable failures: HTTP 429, any 5xx, network and timeout errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Network(_) | Self::Timeout(_) => true,
            Self::NotFound(_) | Self::Parse(_) => false,
        }
    }

    /// HTTP status carried by the error, if any (404 for `NotFound`).
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Http { retry_after_secs, .. } => *retry_after_secs,
            _ => None,
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Http { .. } if self.is_transient() => "http_transient",
            Self::Http { .. } => "http_permanent",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Parse(_) => "parse",
        }
    }
}

/// A custom field value in one of the shapes the remote accepts.
///
/// Wire encoding: `Text` is a JSON string, `Number` a JSON number, and
/// `SingleSelect` an array holding exactly the option id.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    Text(String),
    Number(f64),
    SingleSelect(String),
}

impl CustomValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; numeric strings are coerced.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::SingleSelect(_) => None,
        }
    }

    #[must_use]
    pub fn as_select(&self) -> Option<&str> {
        match self {
            Self::SingleSelect(id) => Some(id),
            _ => None,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::Array(items) => match items.first() {
                Some(Value::String(id)) => Some(Self::SingleSelect(id.clone())),
                Some(Value::Number(n)) => Some(Self::SingleSelect(n.to_string())),
                _ => None,
            },
            Value::Bool(b) => Some(Self::Text(b.to_string())),
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl Serialize for CustomValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::SingleSelect(id) => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(id)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for CustomValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value)
            .ok_or_else(|| de::Error::custom(format!("unsupported custom field value: {value}")))
    }
}

/// Reads any JSON value and keeps it only if it is a supported shape.
fn lenient_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<CustomValue>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(CustomValue::from_json))
}

/// One `{id, value}` pair of a remote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_value", skip_serializing_if = "Option::is_none")]
    pub value: Option<CustomValue>,
}

impl CustomField {
    pub fn new(id: impl Into<String>, value: CustomValue) -> Self {
        Self {
            id: id.into(),
            value: Some(value),
        }
    }
}

/// Epoch millis that the wire may send as a number or a numeric string.
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// External representation of a contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote-assigned id; empty for a record that has not been written yet.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default, rename = "date_created", deserialize_with = "lenient_millis", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, rename = "date_updated", deserialize_with = "lenient_millis", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub archived: bool,
}

impl RemoteRecord {
    /// Value of the custom field with the given id, if present and well-formed.
    #[must_use]
    pub fn field(&self, field_id: &str) -> Option<&CustomValue> {
        self.custom_fields
            .iter()
            .find(|f| f.id == field_id)
            .and_then(|f| f.value.as_ref())
    }

    /// The body sent on create/update.
    #[must_use]
    pub fn payload(&self) -> RecordPayload<'_> {
        RecordPayload {
            name: &self.name,
            custom_fields: &self.custom_fields,
        }
    }

    /// Whether writing `other` over `self` would change nothing the payload carries.
    #[must_use]
    pub fn payload_matches(&self, other: &RemoteRecord) -> bool {
        self.name == other.name
            && other
                .custom_fields
                .iter()
                .all(|f| f.value.is_none() || self.field(&f.id) == f.value.as_ref())
    }
}

/// Wire body for create/update: `{name, custom_fields}`.
#[derive(Debug, Serialize)]
pub struct RecordPayload<'a> {
    pub name: &'a str,
    pub custom_fields: &'a [CustomField],
}

/// Remote-side ordering for list calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    Created,
    Updated,
    Id,
}

impl OrderBy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Id => "id",
        }
    }
}

/// Filters and paging the remote list endpoint understands natively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Zero-based page index.
    pub page: usize,
    pub page_size: usize,
    pub order_by: OrderBy,
    /// Newest first when true.
    pub reverse: bool,
    pub include_archived: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 100,
            order_by: OrderBy::Created,
            reverse: true,
            include_archived: false,
        }
    }
}

impl ListQuery {
    #[must_use]
    pub fn with_page(&self, page: usize) -> Self {
        Self { page, ..self.clone() }
    }
}

/// One page of a list call. `last_page` is the paging cursor: callers keep
/// asking for `page + 1` until it is true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    pub records: Vec<RemoteRecord>,
    pub page: usize,
    pub last_page: bool,
}

/// A custom field definition from the remote field-listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub type_config: FieldTypeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldTypeConfig {
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

/// A dropdown option of a single-select field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub name: String,
}

/// Operations the engine needs from the remote CRM.
///
/// Implementations own no business logic and make no retry decisions; they
/// classify failures through [`RemoteError::is_transient`].
#[async_trait]
pub trait CrmStore: Send + Sync {
    async fn create(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError>;
    async fn get(&self, id: &str) -> Result<Option<RemoteRecord>, RemoteError>;
    async fn update(&self, id: &str, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError>;
    /// Deleting an id that no longer exists is not an error.
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
    /// One page; callers advance `query.page` until `last_page`.
    async fn list(&self, query: &ListQuery) -> Result<RecordPage, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transient_classification() {
        let http = |status| RemoteError::Http { status, message: String::new(), retry_after_secs: None };
        assert!(http(429).is_transient());
        assert!(http(500).is_transient());
        assert!(http(503).is_transient());
        assert!(!http(400).is_transient());
        assert!(!http(401).is_transient());
        assert!(!http(422).is_transient());
        assert!(RemoteError::Network("reset".into()).is_transient());
        assert!(RemoteError::Timeout("30s".into()).is_transient());
        assert!(!RemoteError::NotFound("x".into()).is_transient());
        assert!(!RemoteError::Parse("bad".into()).is_transient());
    }

    #[test]
    fn test_custom_value_wire_shapes() {
        let fields = vec![
            CustomField::new("f1", CustomValue::Text("hi".into())),
            CustomField::new("f2", CustomValue::Number(3.5)),
            CustomField::new("f3", CustomValue::SingleSelect("opt-1".into())),
        ];
        let encoded = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            encoded,
            json!([
                {"id": "f1", "value": "hi"},
                {"id": "f2", "value": 3.5},
                {"id": "f3", "value": ["opt-1"]},
            ])
        );
    }

    #[test]
    fn test_record_tolerates_malformed_fields() {
        let record: RemoteRecord = serde_json::from_value(json!({
            "id": "abc",
            "name": "Jo Doe",
            "date_created": "1700000000000",
            "date_updated": 1700000001000_i64,
            "custom_fields": [
                {"id": "f1", "name": "Email", "value": "jo@x.com"},
                {"id": "f2", "value": {"nested": true}},
                {"id": "f3"},
                {"id": "f4", "value": []},
                {"id": "f5", "value": null}
            ]
        }))
        .unwrap();

        assert_eq!(record.created_at, Some(1_700_000_000_000));
        assert_eq!(record.updated_at, Some(1_700_000_001_000));
        assert_eq!(record.field("f1"), Some(&CustomValue::Text("jo@x.com".into())));
        assert_eq!(record.field("f2"), None);
        assert_eq!(record.field("f3"), None);
        assert_eq!(record.field("f4"), None);
        assert_eq!(record.field("f5"), None);
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_payload_shape() {
        let record = RemoteRecord {
            id: "r1".into(),
            name: "Jo".into(),
            custom_fields: vec![CustomField::new("f1", CustomValue::Text("x".into()))],
            created_at: Some(1),
            ..Default::default()
        };
        let body = serde_json::to_value(record.payload()).unwrap();
        assert_eq!(body, json!({"name": "Jo", "custom_fields": [{"id": "f1", "value": "x"}]}));
    }

    #[test]
    fn test_payload_matches() {
        let stored = RemoteRecord {
            id: "r1".into(),
            name: "Jo".into(),
            custom_fields: vec![
                CustomField::new("f1", CustomValue::Text("x".into())),
                CustomField::new("f2", CustomValue::Number(1.0)),
            ],
            ..Default::default()
        };
        let same = RemoteRecord {
            name: "Jo".into(),
            custom_fields: vec![CustomField::new("f1", CustomValue::Text("x".into()))],
            ..Default::default()
        };
        let changed = RemoteRecord {
            name: "Jo".into(),
            custom_fields: vec![CustomField::new("f2", CustomValue::Number(2.0))],
            ..Default::default()
        };
        assert!(stored.payload_matches(&same));
        assert!(!stored.payload_matches(&changed));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(CustomValue::Text(" 42 ".into()).as_number(), Some(42.0));
        assert_eq!(CustomValue::Text("n/a".into()).as_number(), None);
        assert_eq!(CustomValue::SingleSelect("1".into()).as_number(), None);
    }
}
