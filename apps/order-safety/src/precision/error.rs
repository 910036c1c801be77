//! Precision gate errors.

use rust_decimal::Decimal;
use thiserror::Error;

/// A price, quantity, or notional constraint was violated.
///
/// Always surfaced to the caller and never retried inside the gate: the
/// caller decides whether to resize, reprice, or abandon the order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrecisionError {
    /// An input that must be strictly positive was not.
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Offending input.
        field: &'static str,
        /// Value received.
        value: Decimal,
    },

    /// Flooring to the exchange increment left nothing.
    #[error("{field} {value} rounds to zero at increment {increment}")]
    RoundsToZero {
        /// Offending input.
        field: &'static str,
        /// Value before rounding.
        value: Decimal,
        /// Tick or step used.
        increment: Decimal,
    },

    /// Price below `min_price`.
    #[error("price {price} below min_price {min}")]
    BelowMinPrice {
        /// Normalized price.
        price: Decimal,
        /// Exchange floor.
        min: Decimal,
    },

    /// Price above `max_price`.
    #[error("price {price} above max_price {max}")]
    AboveMaxPrice {
        /// Normalized price.
        price: Decimal,
        /// Exchange ceiling.
        max: Decimal,
    },

    /// Quantity below `min_qty`.
    #[error("quantity {qty} below min_qty {min}")]
    BelowMinQty {
        /// Normalized quantity.
        qty: Decimal,
        /// Exchange floor.
        min: Decimal,
    },

    /// Quantity above `max_qty`.
    #[error("quantity {qty} above max_qty {max}")]
    AboveMaxQty {
        /// Normalized quantity.
        qty: Decimal,
        /// Exchange ceiling.
        max: Decimal,
    },

    /// `price * qty` below a notional floor.
    #[error("notional {notional} below {limit} {min}")]
    BelowMinNotional {
        /// Computed notional.
        notional: Decimal,
        /// Which limit tripped (`min_notional` or `min_cost`).
        limit: &'static str,
        /// Exchange floor.
        min: Decimal,
    },

    /// A market order arrived without a reference price.
    #[error("current_price required for market order")]
    MissingReferencePrice,

    /// A filter needed for the computation is absent from the snapshot.
    #[error("{filter} unavailable in market filters")]
    MissingFilter {
        /// Filter name.
        filter: &'static str,
    },
}

impl PrecisionError {
    /// Short machine-readable reason, used as the audit `reason` field.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NonPositive { .. } => "NON_POSITIVE_INPUT",
            Self::RoundsToZero { .. } => "ROUNDS_TO_ZERO",
            Self::BelowMinPrice { .. } => "BELOW_MIN_PRICE",
            Self::AboveMaxPrice { .. } => "ABOVE_MAX_PRICE",
            Self::BelowMinQty { .. } => "BELOW_MIN_QTY",
            Self::AboveMaxQty { .. } => "ABOVE_MAX_QTY",
            Self::BelowMinNotional { .. } => "BELOW_MIN_NOTIONAL",
            Self::MissingReferencePrice => "MISSING_REFERENCE_PRICE",
            Self::MissingFilter { .. } => "MISSING_FILTER",
        }
    }
}
