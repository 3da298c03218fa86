// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded retry for remote calls.
//!
//! Which failures are retried is configuration, not code: the status set and
//! whether network/timeout errors count are fields on [`RetryPolicy`]. The
//! default allows exactly one retry after a fixed backoff so the runtime of a
//! sync stays predictable.
//!
//! # Example
//!
//! ```
//! use contact_sync::RetryPolicy;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_retries, 1);
//! assert!(policy.retryable_statuses.contains(&429));
//!
//! let none = RetryPolicy::disabled();
//! assert_eq!(none.max_retries, 0);
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::remote::RemoteError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default: 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed wait before each retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Upper bound for a server-requested `Retry-After`.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// HTTP statuses worth retrying. Defaults to the transient set: 429 and
    /// every 5xx.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,

    /// Retry network errors and timeouts.
    #[serde(default = "default_retry_network")]
    pub retry_network: bool,
}

fn default_max_retries() -> u32 { 1 }
fn default_backoff_ms() -> u64 { 2_000 }
fn default_max_delay_ms() -> u64 { 60_000 }
fn default_retryable_statuses() -> Vec<u16> { std::iter::once(429).chain(500..=599).collect() }
fn default_retry_network() -> bool { true }

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            max_delay_ms: default_max_delay_ms(),
            retryable_statuses: default_retryable_statuses(),
            retry_network: default_retry_network(),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Same rules with a custom fixed backoff.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = backoff.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether this policy treats `error` as retryable at all.
    #[must_use]
    pub fn is_retryable(&self, error: &SyncError) -> bool {
        match error {
            SyncError::Remote(RemoteError::Http { status, .. }) => self.retryable_statuses.contains(status),
            SyncError::Remote(RemoteError::Network(_) | RemoteError::Timeout(_)) => self.retry_network,
            _ => false,
        }
    }

    /// Whether attempt number `attempt` (0-based, already failed) may be retried.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &SyncError) -> bool {
        attempt < self.max_retries && self.is_retryable(error)
    }

    /// Wait before the next attempt: the server's `Retry-After` when given
    /// (capped at `max_delay_ms`), otherwise the fixed backoff.
    #[must_use]
    pub fn delay_for(&self, error: &SyncError) -> Duration {
        let requested = match error {
            SyncError::Remote(e) => e.retry_after_secs(),
            _ => None,
        };
        match requested {
            Some(secs) => Duration::from_millis(secs.saturating_mul(1000).min(self.max_delay_ms)),
            None => Duration::from_millis(self.backoff_ms),
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// retries are exhausted. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = operation_name, attempts = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !self.should_retry(attempt, &err) {
                        if attempt > 0 {
                            warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                error = %err,
                                "Giving up after retry"
                            );
                        }
                        return Err(err);
                    }

                    let delay = self.delay_for(&err);
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    crate::metrics::record_retry(operation_name, err.kind());

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
