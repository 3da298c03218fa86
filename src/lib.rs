//! # Contact Sync
//!
//! Reconciles local supporter contacts with a schema-rigid remote CRM that is
//! reachable only through a rate-limited HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Reconciler                          │
//! │  • sync(contacts) → SyncReport                             │
//! │  • create_or_update / delete / get                         │
//! │  • search(params) / analytics()                            │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐ ┌───────────────────┐ ┌───────────────────┐
//! │ FieldTranslator │ │  BatchExecutor    │ │  SnapshotCache    │
//! │ Contact ⇄ Remote│ │  batches + delay  │ │  TTL + eager      │
//! │ pure, no I/O    │ │  Throttle + Retry │ │  invalidation     │
//! └─────────────────┘ └───────────────────┘ └───────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CrmStore (trait)                         │
//! │  • HttpCrmClient: reqwest, bearer auth, typed errors       │
//! │  • InMemoryCrm: tests and demos                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use contact_sync::{Contact, CrmSyncConfig, Reconciler};
//! use contact_sync::remote::HttpCrmClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), contact_sync::SyncError> {
//!     let config = CrmSyncConfig::from_env()?;
//!     config.validate()?;
//!
//!     let client = Arc::new(HttpCrmClient::new(&config)?);
//!     let reconciler = Reconciler::new(config, client)?;
//!
//!     let report = reconciler
//!         .sync(&[Contact::new("Ada", "Lovelace", "ada@example.com")])
//!         .await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Email matching**: case-insensitive, first match wins, never a duplicate create
//! - **Bounded concurrency**: batch size is the parallelism limit, with a delay between batches
//! - **Throttling**: token bucket per reconciler, sized to the remote quota
//! - **Retry Logic**: configurable policy, one retry by default, honours `Retry-After`
//! - **Partial failure**: per-record errors are counted, never abort the run
//! - **Cancellation**: in-flight work finishes, partial counts are returned
//!
//! ## Configuration
//!
//! See [`CrmSyncConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`reconciler`]: The main [`Reconciler`]
//! - [`mapping`]: Field ids, category table and the translator
//! - [`remote`]: The [`CrmStore`] seam and its implementations
//! - [`batching`]: Rate-limited batch executor
//! - [`resilience`]: Retry policy and throttle
//! - [`search`]: Client-side filters, analytics and the snapshot cache

pub mod batching;
pub mod config;
pub mod contact;
pub mod error;
pub mod mapping;
pub mod metrics;
pub mod reconciler;
pub mod remote;
pub mod resilience;
pub mod search;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use batching::{BatchConfig, BatchExecutor, BatchOutcome};
pub use config::CrmSyncConfig;
pub use contact::{normalize_email, now_millis, Contact, EngagementLevel, UnknownEngagementLevel};
pub use error::{SyncError, SyncResult};
pub use mapping::{split_list, CategoryLabel, CategoryTable, ContactField, FieldIds, FieldTranslator, LIST_DELIMITER};
pub use metrics::LatencyTimer;
pub use reconciler::{Reconciler, RecordFailure, RunPhase, SyncReport};
pub use remote::{CrmStore, CustomField, CustomValue, HttpCrmClient, InMemoryCrm, RemoteError, RemoteRecord};
pub use resilience::{RetryPolicy, Throttle};
pub use search::{Analytics, SearchParams, SearchResult, SnapshotCache};
