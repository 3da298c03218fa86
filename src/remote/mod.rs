//! Remote CRM access.
//!
//! - [`CrmStore`]: the operations the engine depends on
//! - [`HttpCrmClient`]: reqwest adapter for the real service
//! - [`InMemoryCrm`]: in-process implementation for tests and demos

pub mod http;
pub mod memory;
pub mod traits;

pub use http::HttpCrmClient;
pub use memory::InMemoryCrm;
pub use traits::{
    CrmStore, CustomField, CustomValue, FieldDefinition, FieldOption, FieldTypeConfig, ListQuery,
    OrderBy, RecordPage, RecordPayload, RemoteError, RemoteRecord,
};
