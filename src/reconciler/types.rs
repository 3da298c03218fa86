//! Public types for the reconciler.

use serde::{Deserialize, Serialize};

/// Where a sync run currently is.
///
/// Use [`super::Reconciler::phase()`] to check the current phase or
/// [`super::Reconciler::phase_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run in progress
    Idle,
    /// Fetching (or reusing) the remote snapshot
    Loading,
    /// Classifying local contacts against the snapshot
    Diffing,
    /// Creates and updates in flight
    Executing,
    /// Counting results
    Reporting,
}

impl RunPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Diffing => "diffing",
            Self::Executing => "executing",
            Self::Reporting => "reporting",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Loading => write!(f, "Loading"),
            Self::Diffing => write!(f, "Diffing"),
            Self::Executing => write!(f, "Executing"),
            Self::Reporting => write!(f, "Reporting"),
        }
    }
}

/// One record that could not be written. Carries the email only, never the
/// rest of the contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub email: String,
    pub reason: String,
}

/// Outcome of a sync run.
///
/// `errors` always equals `failures.len()`. Contacts without an email are
/// `invalid`; later duplicates of an email in the same input are `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub errors: usize,
    pub invalid: usize,
    pub skipped: usize,
    /// Matched but identical to the remote record (only with `skip_unchanged`)
    pub unchanged: usize,
    /// The run was cancelled; counts cover only the work that finished
    pub cancelled: bool,
    pub failures: Vec<RecordFailure>,
}

impl SyncReport {
    /// No record failed to write.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }

    /// Contacts that reached a final, consistent state remotely.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.unchanged
    }

    pub(crate) fn record_failure(&mut self, email: impl Into<String>, reason: impl Into<String>) {
        self.errors += 1;
        self.failures.push(RecordFailure {
            email: email.into(),
            reason: reason.into(),
        });
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} updated={} unchanged={} errors={} invalid={} skipped={}",
            self.created, self.updated, self.unchanged, self.errors, self.invalid, self.skipped
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
