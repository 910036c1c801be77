//! Retry policy with exponential backoff for exchange order submission.
//!
//! # Retryable Errors
//!
//! | Retryable | Non-Retryable |
//! |-----------|---------------|
//! | HTTP 429 / 418 (rate limited, IP ban) | HTTP 400 (bad request) |
//! | HTTP 5xx | HTTP 401/403 (auth errors) |
//! | Network timeouts | Filter failures (-1013, -4164, ...) |
//! | Exchange `-1003` (too many requests) | Insufficient balance (-2019) |
//! | Exchange `-1007` (timeout, status unknown) | Duplicate client order id (-4116) |
//!
//! Retries reuse the same client order id, so a request that reached the
//! exchange before timing out cannot be filled twice.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exchange code for "too many requests".
pub const EXCHANGE_TOO_MANY_REQUESTS: i64 = -1003;

/// Exchange code for "timeout waiting for backend; execution status unknown".
pub const EXCHANGE_BACKEND_TIMEOUT: i64 = -1007;

/// Retry policy configuration for exchange calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRetryPolicy {
    /// Maximum number of retries after the first attempt (default: 3).
    pub max_attempts: u32,
    /// Initial backoff duration (default: 200ms).
    pub initial_backoff: Duration,
    /// Maximum backoff duration (default: 10s).
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth (default: 2.0).
    pub backoff_multiplier: f64,
    /// Jitter factor for randomization (default: 0.2 = ±20%).
    pub jitter_factor: f64,
}

impl Default for ExchangeRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl ExchangeRetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Calculator for exponential backoff with jitter.
#[derive(Debug)]
pub struct ExponentialBackoffCalculator {
    current_attempt: u32,
    max_attempts: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoffCalculator {
    /// Create a new backoff calculator from a retry policy.
    #[must_use]
    pub const fn new(policy: &ExchangeRetryPolicy) -> Self {
        Self {
            current_attempt: 0,
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            jitter_factor: policy.jitter_factor,
        }
    }

    /// Next backoff duration with jitter, or `None` once retries are exhausted.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.max_attempts {
            return None;
        }

        let base_ms = self.base_backoff_ms();
        let capped_ms = self.apply_jitter(base_ms).min(self.max_backoff_ms);
        self.current_attempt += 1;

        Some(Duration::from_millis(capped_ms))
    }

    fn base_backoff_ms(&self) -> u64 {
        let multiplier = self.backoff_multiplier.powi(self.current_attempt as i32);
        let backoff = (self.initial_backoff_ms as f64 * multiplier) as u64;
        backoff.min(self.max_backoff_ms)
    }

    /// Random value in `[backoff * (1 - jitter), backoff * (1 + jitter)]`.
    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 {
            return backoff_ms;
        }
        let jitter_range = backoff_ms as f64 * self.jitter_factor;
        let min = (backoff_ms as f64 - jitter_range).max(0.0);
        let max = backoff_ms as f64 + jitter_range;
        rand::rng().random_range(min..=max) as u64
    }

    /// Retries consumed so far.
    #[must_use]
    pub const fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Whether more retries are available.
    #[must_use]
    pub const fn has_remaining_attempts(&self) -> bool {
        self.current_attempt < self.max_attempts
    }

    /// Use a server-provided delay in place of the computed one.
    ///
    /// Still consumes an attempt; returns `None` once retries are exhausted.
    pub fn override_delay(&mut self, delay: Duration) -> Option<Duration> {
        if !self.has_remaining_attempts() {
            return None;
        }
        self.current_attempt += 1;
        Some(delay.min(Duration::from_millis(self.max_backoff_ms)))
    }
}

/// Error categories for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Transient failure.
    Retryable,
    /// Permanent failure; retrying cannot help.
    NonRetryable,
    /// Rate limited; honour `Retry-After` when present.
    RateLimited,
}

impl ErrorCategory {
    /// Whether a retry may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable | Self::RateLimited)
    }
}

/// Categorize an HTTP status code.
#[must_use]
pub const fn categorize_status(status_code: u16) -> ErrorCategory {
    match status_code {
        429 | 418 => ErrorCategory::RateLimited,
        408 | 500..=599 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Categorize an exchange error code, if it carries retry meaning.
#[must_use]
pub const fn categorize_exchange_code(code: i64) -> Option<ErrorCategory> {
    match code {
        EXCHANGE_TOO_MANY_REQUESTS => Some(ErrorCategory::RateLimited),
        EXCHANGE_BACKEND_TIMEOUT => Some(ErrorCategory::Retryable),
        _ => None,
    }
}

/// Parse a `Retry-After` header given in seconds.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
