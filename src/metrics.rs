// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for contact-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `contact_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: create, get, update, delete, list, list_fields, sync, search
//! - `status`: success, not_found, error
//! - `outcome`: created, updated, error, invalid, skipped, unchanged

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record one HTTP call to the remote CRM
pub fn record_remote_request(operation: &str, status: &str) {
    counter!(
        "contact_sync_remote_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record remote call latency
pub fn record_remote_latency(operation: &str, duration: Duration) {
    histogram!(
        "contact_sync_remote_request_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a classified remote failure
pub fn record_remote_error(operation: &str, kind: &str) {
    counter!(
        "contact_sync_remote_errors_total",
        "operation" => operation.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a retry attempt
pub fn record_retry(operation: &str, kind: &str) {
    counter!(
        "contact_sync_retries_total",
        "operation" => operation.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record time spent waiting on the request throttle
pub fn record_throttle_wait(waited: Duration) {
    histogram!("contact_sync_throttle_wait_seconds").record(waited.as_secs_f64());
}

/// Record how many items a dispatched batch carried
pub fn record_batch_size(operation: &str, count: usize) {
    histogram!(
        "contact_sync_batch_size",
        "operation" => operation.to_string()
    )
    .record(count as f64);
}

/// Record per-record sync outcomes for one run
pub fn record_sync_outcome(outcome: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "contact_sync_records_total",
        "outcome" => outcome.to_string()
    )
    .increment(count as u64);
}

/// Record a finished sync run
pub fn record_sync_run(status: &str, duration: Duration) {
    counter!(
        "contact_sync_runs_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("contact_sync_run_seconds").record(duration.as_secs_f64());
}

/// Track run phase transitions
pub fn set_run_phase(phase: &str) {
    counter!(
        "contact_sync_phase_transitions_total",
        "phase" => phase.to_string()
    )
    .increment(1);
}

/// Record a snapshot cache lookup
pub fn record_snapshot_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(
        "contact_sync_snapshot_cache_total",
        "result" => result
    )
    .increment(1);
}

/// Set snapshot size and cache hit rate
pub fn set_snapshot_stats(records: usize, hit_rate: f64) {
    gauge!("contact_sync_snapshot_records").set(records as f64);
    gauge!("contact_sync_snapshot_cache_hit_rate").set(hit_rate);
}

/// Record a search call
pub fn record_search_query(status: &str, results: usize) {
    counter!(
        "contact_sync_search_queries_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("contact_sync_search_results").record(results as f64);
}

/// Record latency of an engine-level operation
pub fn record_latency(component: &str, operation: &str, duration: Duration) {
    histogram!(
        "contact_sync_operation_seconds",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    component: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.component, self.operation, self.start.elapsed());
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($component:expr, $op:expr) => {
        $crate::metrics::LatencyTimer::new($component, $op)
    };
}
