//! Order intents as handed to the safety core by the strategy layer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Environment;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy (opens or adds to a long, reduces a short).
    Buy,
    /// Sell (opens or adds to a short, reduces a long).
    Sell,
}

impl OrderSide {
    /// The opposite side.
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Wire representation used by the exchange.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop-market order (protective stop-loss).
    StopMarket,
    /// Take-profit market order.
    TakeProfitMarket,
}

impl OrderType {
    /// Whether the order carries its own limit price.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        matches!(self, Self::Limit)
    }

    /// Wire representation used by the exchange.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopMarket => "STOP_MARKET",
            Self::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an order logically is, before normalization.
///
/// `intent_key` must be stable across retries of the same logical action and
/// distinct across different actions; it is the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Deployment environment.
    pub env: Environment,
    /// Strategy name.
    pub strategy: String,
    /// Exchange symbol (e.g. `BTC/USDT`).
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price; absent for market orders.
    pub price: Option<Decimal>,
    /// Requested quantity in base units.
    pub quantity: Decimal,
    /// Caller-supplied semantic fingerprint of this action.
    pub intent_key: String,
}

impl OrderIntent {
    /// Create a market order intent.
    #[must_use]
    pub fn market(
        env: Environment,
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        intent_key: impl Into<String>,
    ) -> Self {
        Self {
            env,
            strategy: strategy.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            price: None,
            quantity,
            intent_key: intent_key.into(),
        }
    }

    /// Create a limit order intent.
    #[must_use]
    pub fn limit(
        env: Environment,
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        intent_key: impl Into<String>,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market(env, strategy, symbol, side, quantity, intent_key)
        }
    }
}
