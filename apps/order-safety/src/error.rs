//! Crate-level error taxonomy.
//!
//! Each component owns its error enum; [`OrderSafetyError`] wraps them for
//! callers that drive the whole placement flow, and [`ErrorCode`] gives a
//! stable reason string for logs and dashboards.
//!
//! | Code | Raised by | Retry? |
//! |------|-----------|--------|
//! | `PRECISION_VIOLATION` | PrecisionGate | caller resizes/reprices |
//! | `INVALID_CONFIGURATION` | config, id factory, limiter setup | fatal at startup |
//! | `ENVIRONMENT_MISMATCH` | placement flow | never |
//! | `PERSISTENCE_FAILURE` | idempotency store, audit logger | operator |
//! | `RATE_LIMITED` | rate limiter timeout/cancel | later |
//! | `ORDER_REJECTED` | exchange, permanent | never |
//! | `EXCHANGE_UNAVAILABLE` | exchange, retries exhausted | later |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::ExchangeError;
use crate::audit::AuditError;
use crate::config::ConfigError;
use crate::idempotency::{ClientIdError, IdempotencyError};
use crate::models::Environment;
use crate::precision::PrecisionError;
use crate::resilience::RateLimitError;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Price/quantity/notional constraint violated.
    PrecisionViolation,
    /// Configuration cannot be used.
    InvalidConfiguration,
    /// Intent targets a different environment than the pipeline.
    EnvironmentMismatch,
    /// Durable state could not be written or read.
    PersistenceFailure,
    /// Rate limit capacity was not obtained.
    RateLimited,
    /// Exchange refused the order.
    OrderRejected,
    /// Exchange unreachable or overloaded after retries.
    ExchangeUnavailable,
}

impl ErrorCode {
    /// Reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::PrecisionViolation => "PRECISION_VIOLATION",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::EnvironmentMismatch => "ENVIRONMENT_MISMATCH",
            Self::PersistenceFailure => "PERSISTENCE_FAILURE",
            Self::RateLimited => "RATE_LIMITED",
            Self::OrderRejected => "ORDER_REJECTED",
            Self::ExchangeUnavailable => "EXCHANGE_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Any failure of the order safety core.
#[derive(Debug, Error)]
pub enum OrderSafetyError {
    /// Order failed normalization.
    #[error(transparent)]
    Precision(#[from] PrecisionError),

    /// Client id configuration is unusable.
    #[error(transparent)]
    ClientId(#[from] ClientIdError),

    /// Idempotency store failure.
    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),

    /// Rate limiter failure.
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// Audit trail failure.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Exchange failure after `attempts` tries.
    #[error("exchange submission failed after {attempts} attempt(s): {source}")]
    Exchange {
        /// Attempts made, including the first.
        attempts: u32,
        /// Last exchange error.
        source: ExchangeError,
    },

    /// Intent environment differs from the pipeline's.
    #[error("environment mismatch: pipeline is {expected}, intent is {actual}")]
    EnvironmentMismatch {
        /// Pipeline environment.
        expected: Environment,
        /// Intent environment.
        actual: Environment,
    },

    /// A failure whose audit record could not be written either.
    #[error("{source}; audit record not written: {audit}")]
    Unaudited {
        /// The failure being audited.
        source: Box<OrderSafetyError>,
        /// Why the audit write failed.
        audit: AuditError,
    },
}

impl OrderSafetyError {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Precision(_) => ErrorCode::PrecisionViolation,
            Self::ClientId(_) | Self::Config(_) => ErrorCode::InvalidConfiguration,
            Self::RateLimit(RateLimitError::InvalidConfig(_)) => ErrorCode::InvalidConfiguration,
            Self::RateLimit(_) => ErrorCode::RateLimited,
            Self::Idempotency(_) | Self::Audit(_) => ErrorCode::PersistenceFailure,
            Self::EnvironmentMismatch { .. } => ErrorCode::EnvironmentMismatch,
            Self::Unaudited { source, .. } => source.code(),
            Self::Exchange { source, .. } => {
                if source.category().is_retryable() {
                    ErrorCode::ExchangeUnavailable
                } else {
                    ErrorCode::OrderRejected
                }
            }
        }
    }
}
