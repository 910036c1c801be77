//! Exchange Port (Driven Port)
//!
//! Interface for sending normalized orders to an exchange.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{OrderSide, OrderType};
use crate::precision::{NormalizedOrder, ProtectivePlan};
use crate::resilience::{ErrorCategory, categorize_exchange_code, categorize_status};

/// Exchange code for "duplicate client order id".
pub const DUPLICATE_CLIENT_ORDER_ID: i64 = -4116;

/// Request to place an order on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Idempotent client order id.
    pub client_order_id: String,
    /// Exchange symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Step-aligned quantity.
    pub quantity: Decimal,
    /// Tick-aligned limit price.
    pub price: Option<Decimal>,
    /// Tick-aligned trigger price for stop/take-profit orders.
    pub stop_price: Option<Decimal>,
    /// Only reduce an existing position.
    pub reduce_only: bool,
}

impl SubmitOrderRequest {
    /// Request for a normalized entry order.
    #[must_use]
    pub fn from_normalized(
        client_order_id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        order_type: OrderType,
        normalized: &NormalizedOrder,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            symbol: symbol.into(),
            side,
            order_type,
            quantity: normalized.quantity,
            price: normalized.price,
            stop_price: None,
            reduce_only: false,
        }
    }

    /// Reduce-only request for a planned stop-loss/take-profit.
    #[must_use]
    pub fn protective(
        client_order_id: impl Into<String>,
        symbol: impl Into<String>,
        plan: &ProtectivePlan,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            symbol: symbol.into(),
            side: plan.side,
            order_type: plan.order_type,
            quantity: plan.quantity,
            price: None,
            stop_price: Some(plan.trigger_price),
            reduce_only: true,
        }
    }
}

/// Acknowledgment from the exchange after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange-assigned order id.
    pub exchange_order_id: String,
    /// Client order id echoed back.
    pub client_order_id: String,
    /// Exchange status string (e.g. `NEW`, `FILLED`).
    pub status: String,
    /// Quantity filled so far.
    pub filled_qty: Decimal,
}

/// Exchange port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// HTTP error response.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Exchange error code from the body, if any.
        code: Option<i64>,
        /// Error message.
        message: String,
        /// `Retry-After` hint.
        retry_after: Option<Duration>,
    },

    /// Request timed out; the order may or may not exist.
    #[error("Exchange request timed out: {message}")]
    Timeout {
        /// Error details.
        message: String,
    },

    /// Connection-level failure before a response.
    #[error("Exchange connection error: {message}")]
    Network {
        /// Error details.
        message: String,
    },

    /// Order refused by the exchange.
    #[error("Order rejected ({code}): {message}")]
    Rejected {
        /// Exchange error code.
        code: i64,
        /// Rejection reason.
        message: String,
    },
}

impl ExchangeError {
    /// Retry category for this failure.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http { status, code, .. } => code
                .and_then(categorize_exchange_code)
                .unwrap_or_else(|| categorize_status(*status)),
            Self::Timeout { .. } | Self::Network { .. } => ErrorCategory::Retryable,
            Self::Rejected { code, .. } => {
                categorize_exchange_code(*code).unwrap_or(ErrorCategory::NonRetryable)
            }
        }
    }

    /// Server-provided retry delay.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Exchange error code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Http { code, .. } => *code,
            Self::Rejected { code, .. } => Some(*code),
            Self::Timeout { .. } | Self::Network { .. } => None,
        }
    }

    /// The exchange already holds an order with this client order id.
    #[must_use]
    pub const fn is_duplicate_order(&self) -> bool {
        matches!(self.code(), Some(DUPLICATE_CLIENT_ORDER_ID))
    }
}

/// Port for exchange order submission.
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Submit an order. Implementations must send `client_order_id` verbatim.
    async fn submit_order(&self, request: &SubmitOrderRequest) -> Result<OrderAck, ExchangeError>;
}
