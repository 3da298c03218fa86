// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rate-limited batch execution.
//!
//! Items are cut into contiguous batches of `batch_size`. A batch runs
//! concurrently (one task per item, so parallelism never exceeds the batch
//! size), then the executor sleeps `batch_delay` before the next one.
//!
//! ```text
//! items ─┬─ batch 0 ─▶ [task task task] ─ join ─┐
//!        │                                     sleep(batch_delay)
//!        ├─ batch 1 ─▶ [task task task] ─ join ─┘
//!        └─ ...
//! task = throttle.acquire() → op(item) → retry per policy
//! ```
//!
//! One item failing never stops the run. Each task returns its own result and
//! the orchestrating loop collects them; workers share nothing mutable.
//! Result order follows completion, not input: correlate by item identity.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use contact_sync::{BatchConfig, BatchExecutor, RetryPolicy, Throttle, SyncError};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let executor = BatchExecutor::new(
//!     BatchConfig { batch_size: 2, batch_delay: Duration::ZERO },
//!     RetryPolicy::disabled(),
//!     Arc::new(Throttle::unlimited()),
//! );
//!
//! let outcome = executor
//!     .run_batched("double", vec![1, 2, 3], |n: i32| async move { Ok::<_, SyncError>(n * 2) }, &CancellationToken::new())
//!     .await;
//!
//! let mut doubled = outcome.succeeded.clone();
//! doubled.sort();
//! assert_eq!(doubled, vec![2, 4, 6]);
//! assert!(outcome.failed.is_empty());
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::resilience::{RetryPolicy, Throttle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Items per batch, which is also the concurrency bound.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_secs(1),
        }
    }
}

/// What happened to every item handed to [`BatchExecutor::run_batched`].
#[derive(Debug)]
pub struct BatchOutcome<T, R> {
    pub succeeded: Vec<R>,
    pub failed: Vec<(T, SyncError)>,
    /// Tasks that panicked; their item cannot be recovered.
    pub aborted: usize,
    /// Items never dispatched because of cancellation or a fatal error.
    pub not_started: usize,
    pub cancelled: bool,
    /// First error that must abort the whole operation.
    pub fatal: Option<SyncError>,
    pub batches: usize,
}

impl<T, R> Default for BatchOutcome<T, R> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            aborted: 0,
            not_started: 0,
            cancelled: false,
            fatal: None,
            batches: 0,
        }
    }
}

impl<T, R> BatchOutcome<T, R> {
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.failed.len() + self.aborted
    }
}

pub struct BatchExecutor {
    config: BatchConfig,
    retry: RetryPolicy,
    throttle: Arc<Throttle>,
}

impl BatchExecutor {
    pub fn new(config: BatchConfig, retry: RetryPolicy, throttle: Arc<Throttle>) -> Self {
        Self {
            config: BatchConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            retry,
            throttle,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `op` over `items` in throttled, bounded batches.
    ///
    /// Cancelling `cancel` lets the current batch finish and starts no new one.
    pub async fn run_batched<T, R, F, Fut>(
        &self,
        operation: &'static str,
        items: Vec<T>,
        op: F,
        cancel: &CancellationToken,
    ) -> BatchOutcome<T, R>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, SyncError>> + Send + 'static,
    {
        let total = items.len();
        let op = Arc::new(op);
        let mut outcome = BatchOutcome::default();
        let mut pending = items.into_iter().peekable();

        while pending.peek().is_some() {
            if outcome.batches > 0 && !self.config.batch_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = sleep(self.config.batch_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                outcome.not_started = pending.count();
                warn!(operation, not_started = outcome.not_started, "Batch run cancelled");
                break;
            }

            let batch: Vec<T> = pending.by_ref().take(self.config.batch_size).collect();
            debug!(operation, batch = outcome.batches, size = batch.len(), "Dispatching batch");
            crate::metrics::record_batch_size(operation, batch.len());

            let mut tasks = JoinSet::new();
            for item in batch {
                let op = Arc::clone(&op);
                let throttle = Arc::clone(&self.throttle);
                let retry = self.retry.clone();
                tasks.spawn(async move {
                    let owned = item.clone();
                    let (op, throttle) = (&op, &throttle);
                    let result = retry
                        .execute(operation, move || {
                            let item = owned.clone();
                            async move {
                                throttle.acquire().await;
                                (**op)(item).await
                            }
                        })
                        .await;
                    (item, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(value))) => outcome.succeeded.push(value),
                    Ok((item, Err(err))) => {
                        if err.is_fatal() && outcome.fatal.is_none() {
                            outcome.fatal = Some(err.clone());
                        }
                        outcome.failed.push((item, err));
                    }
                    Err(join_err) => {
                        error!(operation, error = %join_err, "Batch task aborted");
                        outcome.aborted += 1;
                    }
                }
            }
            outcome.batches += 1;

            if let Some(fatal) = &outcome.fatal {
                outcome.not_started = pending.count();
                error!(operation, error = %fatal, not_started = outcome.not_started, "Fatal error, stopping batch run");
                break;
            }
        }

        info!(
            operation,
            total,
            succeeded = outcome.succeeded.len(),
            failed = outcome.error_count(),
            batches = outcome.batches,
            cancelled = outcome.cancelled,
            "Batch run finished"
        );
        outcome
    }
}
