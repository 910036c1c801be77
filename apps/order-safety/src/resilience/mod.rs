//! Resilience patterns for exchange calls.
//!
//! A shared [`RateLimiter`] keeps outbound traffic under the exchange's
//! weight and request budgets; [`ExchangeRetryPolicy`] decides how transient
//! submission failures are retried.

mod rate_limiter;
mod retry;

pub use rate_limiter::{RateLimitError, RateLimitSettings, RateLimitUsage, RateLimiter};
pub use retry::{
    EXCHANGE_BACKEND_TIMEOUT, EXCHANGE_TOO_MANY_REQUESTS, ErrorCategory, ExchangeRetryPolicy,
    ExponentialBackoffCalculator, categorize_exchange_code, categorize_status, parse_retry_after,
};
