//! Field mapping between [`Contact`](crate::Contact) and
//! [`RemoteRecord`](crate::remote::RemoteRecord).
//!
//! ```text
//! Contact ──to_remote──▶ RemoteRecord { name, custom_fields: [{id, value}] }
//!    ▲                          │
//!    └────────from_remote───────┘
//! ```
//!
//! - [`FieldIds`]: semantic attribute → opaque remote field id
//! - [`CategoryTable`]: engagement level → single-select option id
//! - [`FieldTranslator`]: the pure translation functions

mod category;
mod fields;
mod translator;

pub use category::{CategoryLabel, CategoryTable};
pub use fields::{ContactField, FieldIds};
pub use translator::{split_list, FieldTranslator, LIST_DELIMITER};
