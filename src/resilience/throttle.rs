// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Token-bucket throttle for outbound CRM requests.
//!
//! Each [`Throttle`] is an ordinary value owned by whoever constructs it, so
//! two reconcilers (or two tests) never share a bucket by accident.
//!
//! ```text
//!   refill: rate tokens/sec, up to `burst`
//!   acquire(): take 1 token, or sleep until one is due
//! ```

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    /// Tokens per second.
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(refill_rate: f64, capacity: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }
}

#[derive(Debug)]
pub struct Throttle {
    bucket: Option<Mutex<TokenBucket>>,
}

impl Throttle {
    /// `rate_per_sec` steady-state requests per second, `burst` bucket size.
    #[must_use]
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        if rate_per_sec <= 0.0 || !rate_per_sec.is_finite() {
            return Self::unlimited();
        }
        Self {
            bucket: Some(Mutex::new(TokenBucket::new(rate_per_sec, f64::from(burst.max(1))))),
        }
    }

    /// Requests per minute with a full minute's budget as burst, matching how
    /// the remote counts its quota.
    #[must_use]
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(f64::from(requests_per_minute) / 60.0, requests_per_minute)
    }

    /// No throttling at all.
    #[must_use]
    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.bucket.is_some()
    }

    /// Wait for a token. Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let Some(bucket) = &self.bucket else {
            return Duration::ZERO;
        };
        let started = Instant::now();
        loop {
            // Guard dropped before awaiting.
            let wait = bucket.lock().try_acquire();
            match wait {
                Ok(()) => {
                    let waited = started.elapsed();
                    if !waited.is_zero() {
                        trace!(waited_ms = waited.as_millis() as u64, "Throttle token acquired after wait");
                        crate::metrics::record_throttle_wait(waited);
                    }
                    return waited;
                }
                Err(delay) => sleep(delay).await,
            }
        }
    }

    /// Tokens currently available (for tests and diagnostics).
    #[must_use]
    pub fn available(&self) -> f64 {
        match &self.bucket {
            Some(bucket) => {
                let mut b = bucket.lock();
                b.refill();
                b.tokens
            }
            None => f64::INFINITY,
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::per_minute(100)
    }
}
