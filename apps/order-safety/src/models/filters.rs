//! Per-symbol exchange filters.
//!
//! The exchange client fetches market metadata and hands it over in the
//! shape of [`ExchangeMarket`]; [`MarketFilterSnapshot::from_market`] reduces
//! it to the handful of bounds the precision gate enforces.
//!
//! # Filter sources
//!
//! | Snapshot field | Primary source | Fallback |
//! |----------------|----------------|----------|
//! | `tick` | `PRICE_FILTER.tickSize` | `10^-precision.price` |
//! | `min_price` / `max_price` | `PRICE_FILTER` | - |
//! | `step` | `LOT_SIZE.stepSize` | `MARKET_LOT_SIZE`, then `10^-precision.amount` |
//! | `min_qty` / `max_qty` | `LOT_SIZE` | `MARKET_LOT_SIZE` |
//! | `min_notional` | `MIN_NOTIONAL` / `NOTIONAL` | - |
//! | `min_cost` | `limits.cost.min` | - |
//!
//! Exchanges publish `0` for "no bound"; zero and negative values are treated
//! as absent.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Largest scale `rust_decimal` can represent.
const MAX_PRECISION_DIGITS: u32 = 28;

/// Immutable per-fetch view of a symbol's numeric constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketFilterSnapshot {
    /// Price increment.
    pub tick: Option<Decimal>,
    /// Lowest accepted price.
    pub min_price: Option<Decimal>,
    /// Highest accepted price.
    pub max_price: Option<Decimal>,
    /// Quantity increment.
    pub step: Option<Decimal>,
    /// Smallest accepted quantity.
    pub min_qty: Option<Decimal>,
    /// Largest accepted quantity.
    pub max_qty: Option<Decimal>,
    /// Minimum `price * qty` from the notional filter.
    pub min_notional: Option<Decimal>,
    /// Separate minimum order cost (`limits.cost.min`).
    pub min_cost: Option<Decimal>,
}

impl MarketFilterSnapshot {
    /// Derive a snapshot from exchange market metadata.
    #[must_use]
    pub fn from_market(market: &ExchangeMarket) -> Self {
        let mut snapshot = Self::default();
        let mut market_lot: Option<(Option<Decimal>, Option<Decimal>, Option<Decimal>)> = None;

        for filter in &market.info.filters {
            match filter {
                ExchangeFilter::PriceFilter {
                    tick_size,
                    min_price,
                    max_price,
                } => {
                    snapshot.tick = positive(*tick_size);
                    snapshot.min_price = positive(*min_price);
                    snapshot.max_price = positive(*max_price);
                }
                ExchangeFilter::LotSize {
                    step_size,
                    min_qty,
                    max_qty,
                } => {
                    snapshot.step = positive(*step_size);
                    snapshot.min_qty = positive(*min_qty);
                    snapshot.max_qty = positive(*max_qty);
                }
                ExchangeFilter::MarketLotSize {
                    step_size,
                    min_qty,
                    max_qty,
                } => {
                    market_lot = Some((positive(*step_size), positive(*min_qty), positive(*max_qty)));
                }
                ExchangeFilter::MinNotional { min_notional }
                | ExchangeFilter::Notional { min_notional } => {
                    if let Some(value) = positive(*min_notional) {
                        snapshot.min_notional =
                            Some(snapshot.min_notional.map_or(value, |v| v.max(value)));
                    }
                }
                ExchangeFilter::Other => {}
            }
        }

        if let Some((step, min_qty, max_qty)) = market_lot {
            snapshot.step = snapshot.step.or(step);
            snapshot.min_qty = snapshot.min_qty.or(min_qty);
            snapshot.max_qty = snapshot.max_qty.or(max_qty);
        }

        if snapshot.tick.is_none() {
            snapshot.tick = market.precision.price.and_then(precision_to_increment);
        }
        if snapshot.step.is_none() {
            snapshot.step = market.precision.amount.and_then(precision_to_increment);
        }

        snapshot.min_cost = positive(market.limits.cost.min);
        snapshot
    }

    /// The binding notional floor: the larger of the notional filter and the
    /// minimum cost limit, when either is present.
    #[must_use]
    pub fn effective_min_notional(&self) -> Option<Decimal> {
        match (self.min_notional, self.min_cost) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Market metadata as returned by the exchange client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeMarket {
    /// Unified symbol.
    #[serde(default)]
    pub symbol: String,
    /// Digit-count precision fallback.
    #[serde(default)]
    pub precision: MarketPrecision,
    /// Aggregated limits.
    #[serde(default)]
    pub limits: MarketLimits,
    /// Raw exchange payload.
    #[serde(default)]
    pub info: MarketInfo,
}

/// `precision` block: decimal digits for price and amount.
///
/// Some clients publish the increment itself (e.g. `0.01`) instead of a digit
/// count; both forms are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketPrecision {
    /// Price digits (or tick).
    pub price: Option<Decimal>,
    /// Amount digits (or step).
    pub amount: Option<Decimal>,
}

/// `limits` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketLimits {
    /// Order cost limits.
    #[serde(default)]
    pub cost: MinMax,
}

/// Min/max pair.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinMax {
    /// Lower bound.
    pub min: Option<Decimal>,
    /// Upper bound.
    pub max: Option<Decimal>,
}

/// Raw exchange payload holding the filter list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketInfo {
    /// Exchange filters.
    #[serde(default)]
    pub filters: Vec<ExchangeFilter>,
}

/// A single exchange filter, tagged by `filterType`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "filterType")]
pub enum ExchangeFilter {
    /// Price bounds and tick size.
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter {
        /// Tick size.
        tick_size: Option<Decimal>,
        /// Minimum price.
        min_price: Option<Decimal>,
        /// Maximum price.
        max_price: Option<Decimal>,
    },
    /// Quantity bounds for limit orders.
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        /// Step size.
        step_size: Option<Decimal>,
        /// Minimum quantity.
        min_qty: Option<Decimal>,
        /// Maximum quantity.
        max_qty: Option<Decimal>,
    },
    /// Quantity bounds for market orders.
    #[serde(rename = "MARKET_LOT_SIZE", rename_all = "camelCase")]
    MarketLotSize {
        /// Step size.
        step_size: Option<Decimal>,
        /// Minimum quantity.
        min_qty: Option<Decimal>,
        /// Maximum quantity.
        max_qty: Option<Decimal>,
    },
    /// Legacy notional floor.
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional {
        /// Minimum notional (`notional` on futures venues).
        #[serde(alias = "notional")]
        min_notional: Option<Decimal>,
    },
    /// Current notional floor.
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional {
        /// Minimum notional.
        #[serde(alias = "notional")]
        min_notional: Option<Decimal>,
    },
    /// Any filter the gate does not enforce.
    #[serde(other)]
    Other,
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

/// Convert a `precision` entry to an increment.
///
/// Whole numbers are digit counts (`2` → `0.01`); fractions below one are
/// already increments.
fn precision_to_increment(precision: Decimal) -> Option<Decimal> {
    if precision < Decimal::ZERO {
        return None;
    }
    if precision.fract().is_zero() {
        let digits = precision.to_u32()?;
        return Some(Decimal::new(1, digits.min(MAX_PRECISION_DIGITS)));
    }
    if precision < Decimal::ONE {
        return Some(precision);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_market() -> ExchangeMarket {
        let raw = serde_json::json!({
            "symbol": "BTC/USDT",
            "precision": { "price": 1, "amount": 3 },
            "limits": { "cost": { "min": 5 } },
            "info": {
                "filters": [
                    { "filterType": "PRICE_FILTER", "tickSize": "0.10", "minPrice": "556.80", "maxPrice": "4529764" },
                    { "filterType": "LOT_SIZE", "stepSize": "0.001", "minQty": "0.001", "maxQty": "1000" },
                    { "filterType": "MARKET_LOT_SIZE", "stepSize": "0.001", "minQty": "0.001", "maxQty": "120" },
                    { "filterType": "MAX_NUM_ORDERS", "limit": 200 },
                    { "filterType": "MIN_NOTIONAL", "notional": "100" },
                    { "filterType": "PERCENT_PRICE", "multiplierUp": "1.0500" }
                ]
            }
        });
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_snapshot_from_explicit_filters() {
        let snapshot = MarketFilterSnapshot::from_market(&btc_market());

        assert_eq!(snapshot.tick, Some(dec!(0.10)));
        assert_eq!(snapshot.min_price, Some(dec!(556.80)));
        assert_eq!(snapshot.max_price, Some(dec!(4529764)));
        assert_eq!(snapshot.step, Some(dec!(0.001)));
        assert_eq!(snapshot.min_qty, Some(dec!(0.001)));
        // LOT_SIZE wins over MARKET_LOT_SIZE
        assert_eq!(snapshot.max_qty, Some(dec!(1000)));
        assert_eq!(snapshot.min_notional, Some(dec!(100)));
        assert_eq!(snapshot.min_cost, Some(dec!(5)));
        assert_eq!(snapshot.effective_min_notional(), Some(dec!(100)));
    }

    #[test]
    fn test_snapshot_falls_back_to_precision_digits() {
        let raw = serde_json::json!({
            "symbol": "DOGE/USDT",
            "precision": { "price": 5, "amount": 0 },
            "info": { "filters": [] }
        });
        let market: ExchangeMarket = serde_json::from_value(raw).unwrap();
        let snapshot = MarketFilterSnapshot::from_market(&market);

        assert_eq!(snapshot.tick, Some(dec!(0.00001)));
        assert_eq!(snapshot.step, Some(dec!(1)));
        assert_eq!(snapshot.min_notional, None);
        assert_eq!(snapshot.min_cost, None);
    }

    #[test]
    fn test_precision_given_as_increment() {
        let raw = serde_json::json!({
            "precision": { "price": 0.01, "amount": 0.1 }
        });
        let market: ExchangeMarket = serde_json::from_value(raw).unwrap();
        let snapshot = MarketFilterSnapshot::from_market(&market);

        assert_eq!(snapshot.tick, Some(dec!(0.01)));
        assert_eq!(snapshot.step, Some(dec!(0.1)));
    }

    #[test]
    fn test_zero_bounds_are_absent() {
        let raw = serde_json::json!({
            "info": { "filters": [
                { "filterType": "PRICE_FILTER", "tickSize": "0.01", "minPrice": "0", "maxPrice": "0" }
            ] }
        });
        let market: ExchangeMarket = serde_json::from_value(raw).unwrap();
        let snapshot = MarketFilterSnapshot::from_market(&market);

        assert_eq!(snapshot.tick, Some(dec!(0.01)));
        assert!(snapshot.min_price.is_none());
        assert!(snapshot.max_price.is_none());
    }

    #[test]
    fn test_market_lot_size_fills_gaps() {
        let raw = serde_json::json!({
            "info": { "filters": [
                { "filterType": "MARKET_LOT_SIZE", "stepSize": "0.01", "minQty": "0.01", "maxQty": "50" },
                { "filterType": "NOTIONAL", "minNotional": "5" }
            ] }
        });
        let market: ExchangeMarket = serde_json::from_value(raw).unwrap();
        let snapshot = MarketFilterSnapshot::from_market(&market);

        assert_eq!(snapshot.step, Some(dec!(0.01)));
        assert_eq!(snapshot.max_qty, Some(dec!(50)));
        assert_eq!(snapshot.min_notional, Some(dec!(5)));
    }

    #[test]
    fn test_effective_min_notional_takes_larger_floor() {
        let snapshot = MarketFilterSnapshot {
            min_notional: Some(dec!(5)),
            min_cost: Some(dec!(10)),
            ..Default::default()
        };
        assert_eq!(snapshot.effective_min_notional(), Some(dec!(10)));

        let cost_only = MarketFilterSnapshot {
            min_cost: Some(dec!(1)),
            ..Default::default()
        };
        assert_eq!(cost_only.effective_min_notional(), Some(dec!(1)));
    }
}
