//! Rate limit and retry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::{ExchangeRetryPolicy, RateLimitSettings};

/// Exchange rate budgets. Required: there is no safe default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Exchange weight limit per minute.
    pub weight_limit_per_minute: u32,
    /// Exchange request limit per second.
    pub request_limit_per_second: u32,
    /// Fraction of the weight limit to use.
    #[serde(default = "default_buffer_pct")]
    pub buffer_pct: f64,
    /// Maximum wait for capacity; `null` waits indefinitely.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: Option<u64>,
}

impl RateLimitConfig {
    /// Limiter settings.
    #[must_use]
    pub fn to_settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            weight_limit_per_minute: self.weight_limit_per_minute,
            request_limit_per_second: self.request_limit_per_second,
            buffer_pct: self.buffer_pct,
            acquire_timeout: self.acquire_timeout_ms.map(Duration::from_millis),
        }
    }
}

const fn default_buffer_pct() -> f64 {
    0.8
}

#[allow(clippy::unnecessary_wraps)]
const fn default_acquire_timeout_ms() -> Option<u64> {
    Some(30_000)
}

/// Exchange submission retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor per retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Random spread, 0.0 to 1.0.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// Retry policy.
    #[must_use]
    pub const fn to_policy(&self) -> ExchangeRetryPolicy {
        ExchangeRetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    200
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.2
}
