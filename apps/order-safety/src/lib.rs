// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Order Safety - exchange order safety and audit core.
//!
//! Every order passes through these components before and after it reaches
//! the exchange:
//!
//! - `precision`: exact-decimal tick/step normalization, filter bounds,
//!   protective-order nudging
//! - `idempotency`: deterministic client order ids and a durable
//!   intent → id store
//! - `resilience`: sliding-window rate limiting and exchange retry policy
//! - `audit`: redacted, hash-chained, day-rotated audit trail
//! - `application`: the exchange port and the placement use case that wires
//!   the components together
//!
//! # Example
//!
//! ```rust,ignore
//! use order_safety::application::PlaceOrderUseCase;
//!
//! let use_case = PlaceOrderUseCase::new(exchange, store, limiter, audit);
//! let outcome = use_case.place(&intent, &filters, Some(last_price)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Exchange port and order placement flow.
pub mod application;

/// Hash-chained audit trail.
pub mod audit;

/// YAML configuration.
pub mod config;

/// Crate-level error taxonomy.
pub mod error;

/// Client order ids and the idempotency store.
pub mod idempotency;

/// Shared data model.
pub mod models;

/// Price/quantity normalization.
pub mod precision;

/// Rate limiting and retries.
pub mod resilience;

/// Diagnostic logging setup.
pub mod telemetry;

pub use application::{ExchangePort, PlaceOrderOutcome, PlaceOrderUseCase};
pub use audit::{AuditLevel, AuditLogger, AuditRecord, AuditRegistry};
pub use error::{ErrorCode, OrderSafetyError};
pub use idempotency::{ClientOrderIdFactory, IdempotencyStore};
pub use models::{Environment, MarketFilterSnapshot, OrderIntent, OrderSide, OrderType};
pub use precision::{PrecisionError, PrecisionGate};
pub use resilience::RateLimiter;
