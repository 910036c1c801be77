//! Precision gate: the last numeric check before an order leaves the process.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PrecisionError;
use super::adjust::{StepRounding, TickRounding, round_to_step, round_to_tick};
use crate::models::MarketFilterSnapshot;

/// Price and quantity after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedOrder {
    /// Tick-aligned price (absent for market orders).
    pub price: Option<Decimal>,
    /// Step-aligned quantity.
    pub quantity: Decimal,
    /// The notional floor that was enforced, if any.
    pub min_notional: Option<Decimal>,
}

impl NormalizedOrder {
    /// Notional at the given reference price.
    #[must_use]
    pub fn notional(&self, reference_price: Decimal) -> Decimal {
        self.price.unwrap_or(reference_price) * self.quantity
    }
}

/// Validates and normalizes an order's price and quantity against a symbol's
/// exchange filters.
///
/// Pure: it either returns values inside every bound or fails with a
/// [`PrecisionError`]. It floors to the exchange increments but never clamps
/// a value into range.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecisionGate {
    trace_adjustments: bool,
}

impl PrecisionGate {
    /// Create a gate without diagnostic logging.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trace_adjustments: false,
        }
    }

    /// Log before/after values whenever rounding changed an input.
    #[must_use]
    pub const fn with_tracing(mut self) -> Self {
        self.trace_adjustments = true;
        self
    }

    /// Normalize `price`/`qty` and check them against `filters`.
    ///
    /// `current_price` is the reference price for market orders; when `price`
    /// is given it takes precedence for the notional check.
    ///
    /// # Checks (in order)
    ///
    /// 1. `qty > 0`, `price > 0` when given
    /// 2. floor price to tick, quantity to step
    /// 3. effective price = normalized price or `current_price`
    /// 4. `min_price`, `max_price`, `min_qty`, `max_qty`
    /// 5. notional against `min_notional`, then `min_cost`
    pub fn normalize(
        &self,
        price: Option<Decimal>,
        qty: Decimal,
        filters: &MarketFilterSnapshot,
        current_price: Option<Decimal>,
    ) -> Result<NormalizedOrder, PrecisionError> {
        if qty <= Decimal::ZERO {
            return Err(PrecisionError::NonPositive {
                field: "quantity",
                value: qty,
            });
        }
        if let Some(p) = price.filter(|p| *p <= Decimal::ZERO) {
            return Err(PrecisionError::NonPositive {
                field: "price",
                value: p,
            });
        }

        let price_norm = match (price, filters.tick) {
            (Some(p), Some(tick)) => {
                let rounded = round_to_tick(p, tick, TickRounding::Down);
                if rounded <= Decimal::ZERO {
                    return Err(PrecisionError::RoundsToZero {
                        field: "price",
                        value: p,
                        increment: tick,
                    });
                }
                Some(rounded)
            }
            (p, _) => p,
        };

        let qty_norm = filters
            .step
            .map_or(qty, |step| round_to_step(qty, step, StepRounding::Down));

        let effective_price = match (price_norm, current_price) {
            (Some(p), _) => p,
            (None, Some(current)) if current > Decimal::ZERO => current,
            (None, Some(current)) => {
                return Err(PrecisionError::NonPositive {
                    field: "current_price",
                    value: current,
                });
            }
            (None, None) => return Err(PrecisionError::MissingReferencePrice),
        };

        if let Some(p) = price_norm {
            if let Some(min) = filters.min_price.filter(|min| p < *min) {
                return Err(PrecisionError::BelowMinPrice { price: p, min });
            }
            if let Some(max) = filters.max_price.filter(|max| p > *max) {
                return Err(PrecisionError::AboveMaxPrice { price: p, max });
            }
        }

        if let Some(min) = filters.min_qty.filter(|min| qty_norm < *min) {
            return Err(PrecisionError::BelowMinQty { qty: qty_norm, min });
        }
        if qty_norm <= Decimal::ZERO {
            return Err(PrecisionError::RoundsToZero {
                field: "quantity",
                value: qty,
                increment: filters.step.unwrap_or(Decimal::ZERO),
            });
        }
        if let Some(max) = filters.max_qty.filter(|max| qty_norm > *max) {
            return Err(PrecisionError::AboveMaxQty { qty: qty_norm, max });
        }

        let notional = effective_price * qty_norm;
        if let Some(min) = filters.min_notional.filter(|min| notional < *min) {
            return Err(PrecisionError::BelowMinNotional {
                notional,
                limit: "min_notional",
                min,
            });
        }
        if let Some(min) = filters.min_cost.filter(|min| notional < *min) {
            return Err(PrecisionError::BelowMinNotional {
                notional,
                limit: "min_cost",
                min,
            });
        }

        if self.trace_adjustments && (price_norm != price || qty_norm != qty) {
            tracing::debug!(
                price_in = ?price,
                price_out = ?price_norm,
                qty_in = %qty,
                qty_out = %qty_norm,
                %notional,
                "Order normalized to exchange filters"
            );
        }

        Ok(NormalizedOrder {
            price: price_norm,
            quantity: qty_norm,
            min_notional: filters.effective_min_notional(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn gate() -> PrecisionGate {
        PrecisionGate::new().with_tracing()
    }

    fn btc_filters() -> MarketFilterSnapshot {
        MarketFilterSnapshot {
            tick: Some(dec!(0.1)),
            min_price: Some(dec!(100)),
            max_price: Some(dec!(1000000)),
            step: Some(dec!(0.001)),
            min_qty: Some(dec!(0.001)),
            max_qty: Some(dec!(100)),
            min_notional: Some(dec!(5)),
            min_cost: None,
        }
    }

    #[test]
    fn test_normalize_floors_price_and_quantity() {
        let filters = MarketFilterSnapshot {
            tick: Some(dec!(0.0001)),
            step: Some(dec!(0.001)),
            min_notional: Some(dec!(5)),
            ..Default::default()
        };

        let result = gate()
            .normalize(Some(dec!(100.12345)), dec!(0.12345), &filters, None)
            .unwrap();

        assert_eq!(result.price, Some(dec!(100.1234)));
        assert_eq!(result.quantity, dec!(0.123));
        assert_eq!(result.min_notional, Some(dec!(5)));
        assert!(dec!(100.1234) * dec!(0.123) >= dec!(5));
    }

    #[test]
    fn test_normalize_rejects_small_notional() {
        let filters = MarketFilterSnapshot {
            min_notional: Some(dec!(5)),
            ..Default::default()
        };

        let err = gate()
            .normalize(Some(dec!(10.0)), dec!(0.01), &filters, None)
            .unwrap_err();

        assert!(matches!(err, PrecisionError::BelowMinNotional { .. }));
        assert!(err.to_string().contains("notional"));
    }

    #[test]
    fn test_market_order_requires_current_price() {
        let err = gate()
            .normalize(None, dec!(1.0), &btc_filters(), None)
            .unwrap_err();

        assert_eq!(err, PrecisionError::MissingReferencePrice);
        assert!(err.to_string().contains("current_price required"));
    }

    #[test]
    fn test_market_order_uses_current_price_for_notional() {
        let result = gate()
            .normalize(None, dec!(0.0105), &btc_filters(), Some(dec!(60000)))
            .unwrap();

        assert_eq!(result.price, None);
        assert_eq!(result.quantity, dec!(0.010));

        let err = gate()
            .normalize(None, dec!(0.001), &btc_filters(), Some(dec!(1000)))
            .unwrap_err();
        assert!(matches!(err, PrecisionError::BelowMinNotional { .. }));
    }

    #[test_case(Some(dec!(50)), dec!(1) ; "below min price")]
    #[test_case(Some(dec!(2000000)), dec!(1) ; "above max price")]
    #[test_case(Some(dec!(1000)), dec!(0.0005) ; "below min qty")]
    #[test_case(Some(dec!(1000)), dec!(150) ; "above max qty")]
    #[test_case(Some(dec!(1000)), dec!(0.004) ; "below min notional")]
    #[test_case(Some(dec!(0)), dec!(1) ; "zero price")]
    #[test_case(Some(dec!(1000)), dec!(-1) ; "negative qty")]
    fn test_normalize_rejects_out_of_bounds(price: Option<Decimal>, qty: Decimal) {
        assert!(gate().normalize(price, qty, &btc_filters(), None).is_err());
    }

    #[test]
    fn test_bound_checks_run_in_order() {
        // Both price and quantity are out of range; price is reported first
        let err = gate()
            .normalize(Some(dec!(50)), dec!(1000), &btc_filters(), None)
            .unwrap_err();
        assert!(matches!(err, PrecisionError::BelowMinPrice { .. }));
    }

    #[test]
    fn test_min_cost_enforced_separately() {
        let filters = MarketFilterSnapshot {
            min_notional: Some(dec!(5)),
            min_cost: Some(dec!(20)),
            ..Default::default()
        };

        let err = gate()
            .normalize(Some(dec!(10)), dec!(1), &filters, None)
            .unwrap_err();

        assert_eq!(
            err,
            PrecisionError::BelowMinNotional {
                notional: dec!(10),
                limit: "min_cost",
                min: dec!(20),
            }
        );
    }

    #[test]
    fn test_never_clamps_into_range() {
        // Quantity 100.0009 floors to 100.000 which is within max_qty;
        // 100.5 floors to 100.5 and must be rejected, not clamped to 100.
        let ok = gate()
            .normalize(Some(dec!(1000)), dec!(100.0009), &btc_filters(), None)
            .unwrap();
        assert_eq!(ok.quantity, dec!(100));

        let err = gate()
            .normalize(Some(dec!(1000)), dec!(100.5), &btc_filters(), None)
            .unwrap_err();
        assert!(matches!(err, PrecisionError::AboveMaxQty { .. }));
    }

    #[test]
    fn test_quantity_that_rounds_to_zero_without_min_qty() {
        let filters = MarketFilterSnapshot {
            step: Some(dec!(1)),
            ..Default::default()
        };
        let err = gate()
            .normalize(Some(dec!(10)), dec!(0.5), &filters, None)
            .unwrap_err();
        assert!(matches!(err, PrecisionError::RoundsToZero { field: "quantity", .. }));
    }

    #[test]
    fn test_missing_filters_pass_values_through() {
        let result = gate()
            .normalize(Some(dec!(1.23456789)), dec!(3.3333), &MarketFilterSnapshot::default(), None)
            .unwrap();
        assert_eq!(result.price, Some(dec!(1.23456789)));
        assert_eq!(result.quantity, dec!(3.3333));
        assert_eq!(result.min_notional, None);
    }
}
