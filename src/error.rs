//! Engine-level error taxonomy.
//!
//! | Variant | Scope | Handling |
//! |---|---|---|
//! | `Validation` | one record | counted as a failure in the run report |
//! | `Remote` (transient) | one record | retried per [`RetryPolicy`](crate::RetryPolicy), then counted |
//! | `Remote` (permanent) | one record | counted, never retried |
//! | `Configuration` | whole operation | aborts immediately |
//! | `SnapshotUnavailable` | whole run | aborts; diffing is impossible |

use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("could not load remote snapshot: {0}")]
    SnapshotUnavailable(#[source] RemoteError),
    #[error("operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether a retry might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Remote(e) | Self::SnapshotUnavailable(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Errors that must abort the whole operation rather than one record.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::SnapshotUnavailable(_))
    }

    /// Short label for metrics and failure reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration(_) => "configuration",
            Self::Remote(e) => e.kind(),
            Self::SnapshotUnavailable(_) => "snapshot",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
