//! Configuration for the contact sync engine.
//!
//! # Example
//!
//! ```
//! use contact_sync::{CrmSyncConfig, ContactField};
//!
//! // Minimal config (uses defaults)
//! let config = CrmSyncConfig::default();
//! assert_eq!(config.batch_size, 5);
//! assert_eq!(config.requests_per_minute, 100);
//!
//! // Full config
//! let mut config = CrmSyncConfig {
//!     api_token: "pk_123".into(),
//!     list_id: "901".into(),
//!     batch_size: 10,
//!     batch_delay_ms: 500,
//!     ..Default::default()
//! };
//! config.fields.set(ContactField::Email, "cf-email");
//! assert!(config.validate().is_ok());
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::batching::BatchConfig;
use crate::contact::EngagementLevel;
use crate::error::{SyncError, SyncResult};
use crate::mapping::{CategoryTable, FieldIds, FieldTranslator};
use crate::remote::ListQuery;
use crate::resilience::{RetryPolicy, Throttle};

pub const ENV_API_TOKEN: &str = "CRM_API_TOKEN";
pub const ENV_LIST_ID: &str = "CRM_LIST_ID";
pub const ENV_BASE_URL: &str = "CRM_BASE_URL";
pub const ENV_FIELD_MAP: &str = "CRM_FIELD_MAP";
pub const ENV_CATEGORY_MAP: &str = "CRM_CATEGORY_MAP";

/// Configuration for the contact sync engine.
///
/// All fields have sensible defaults. At minimum, production use needs
/// `api_token`, `list_id` and the email field id in `fields`.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmSyncConfig {
    /// Remote API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer credential (never logged)
    #[serde(default)]
    pub api_token: String,

    /// Target collection (list) id
    #[serde(default)]
    pub list_id: String,

    /// Semantic field → remote custom field id
    #[serde(default)]
    pub fields: FieldIds,

    /// Engagement level → dropdown option
    #[serde(default)]
    pub categories: CategoryTable,

    /// Records per batch, also the concurrency bound (default: 5)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Remote quota (default: 100/min)
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Snapshot paging
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_remote_records")]
    pub max_remote_records: usize,

    /// Snapshot cache TTL (default: 60 minutes)
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Skip updates whose payload already matches the remote record
    #[serde(default)]
    pub skip_unchanged: bool,
}

fn default_base_url() -> String { "https://api.clickup.com/api/v2".into() }
fn default_batch_size() -> usize { 5 }
fn default_batch_delay_ms() -> u64 { 1_000 }
fn default_requests_per_minute() -> u32 { 100 }
fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_page_size() -> usize { 100 }
fn default_max_remote_records() -> usize { 50_000 }
fn default_snapshot_ttl_secs() -> u64 { 60 * 60 }

impl Default for CrmSyncConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: String::new(),
            list_id: String::new(),
            fields: FieldIds::default(),
            categories: CategoryTable::default(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            requests_per_minute: default_requests_per_minute(),
            request_timeout_ms: default_request_timeout_ms(),
            page_size: default_page_size(),
            max_remote_records: default_max_remote_records(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            retry: RetryPolicy::default(),
            skip_unchanged: false,
        }
    }
}

impl CrmSyncConfig {
    /// Read `CRM_API_TOKEN`, `CRM_LIST_ID`, `CRM_BASE_URL`, `CRM_FIELD_MAP`
    /// and `CRM_CATEGORY_MAP`; everything else keeps its default.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let mut config = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = read(ENV_API_TOKEN) {
            config.api_token = token;
        }
        if let Some(list_id) = read(ENV_LIST_ID) {
            config.list_id = list_id;
        }
        if let Some(url) = read(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(raw) = read(ENV_FIELD_MAP) {
            let map: HashMap<String, String> = serde_json::from_str(&raw)
                .map_err(|e| SyncError::Configuration(format!("{ENV_FIELD_MAP} is not a JSON object of strings: {e}")))?;
            config.fields = FieldIds::from_map(&map)?;
        }
        if let Some(raw) = read(ENV_CATEGORY_MAP) {
            let map: HashMap<String, String> = serde_json::from_str(&raw)
                .map_err(|e| SyncError::Configuration(format!("{ENV_CATEGORY_MAP} is not a JSON object of strings: {e}")))?;
            for (level, id) in map {
                let level: EngagementLevel = level
                    .parse()
                    .map_err(|e| SyncError::Configuration(format!("{ENV_CATEGORY_MAP}: {e}")))?;
                config.categories.set(level, id.trim());
            }
        }
        Ok(config)
    }

    /// Full check, including the remote credential and collection id.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api_token.trim().is_empty() {
            return Err(SyncError::Configuration(format!("{ENV_API_TOKEN} is not set")));
        }
        if self.list_id.trim().is_empty() {
            return Err(SyncError::Configuration(format!("{ENV_LIST_ID} is not set")));
        }
        self.validate_engine()
    }

    /// Everything the engine itself needs, independent of the transport.
    pub(crate) fn validate_engine(&self) -> SyncResult<()> {
        self.fields.validate()?;
        self.categories.validate()?;
        if self.batch_size == 0 {
            return Err(SyncError::Configuration("batch_size must be at least 1".into()));
        }
        if self.requests_per_minute == 0 {
            return Err(SyncError::Configuration("requests_per_minute must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(SyncError::Configuration("page_size must be at least 1".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        }
    }

    #[must_use]
    pub fn throttle(&self) -> Throttle {
        Throttle::per_minute(self.requests_per_minute)
    }

    #[must_use]
    pub fn translator(&self) -> FieldTranslator {
        FieldTranslator::new(self.fields.clone(), self.categories.clone())
    }

    #[must_use]
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }

    /// Query used to load the full snapshot: oldest first, archived excluded.
    #[must_use]
    pub fn snapshot_query(&self) -> ListQuery {
        ListQuery {
            page: 0,
            page_size: self.page_size,
            reverse: false,
            ..Default::default()
        }
    }
}
