//! Stop-loss / take-profit planning against a live market price.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::PrecisionError;
use super::adjust::{ensure_minimums, min_price_buffer, nudge_price};
use crate::models::{MarketFilterSnapshot, OrderSide, OrderType};

/// Kind of protective order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectiveKind {
    /// Stop-loss.
    StopLoss,
    /// Take-profit.
    TakeProfit,
}

impl ProtectiveKind {
    /// Exchange order type used for this protective order.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        match self {
            Self::StopLoss => OrderType::StopMarket,
            Self::TakeProfit => OrderType::TakeProfitMarket,
        }
    }
}

/// Distance and sizing rules for protective orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectiveSettings {
    /// Minimum distance from the market in ticks.
    pub min_ticks: u32,
    /// Minimum distance from the market in basis points.
    pub min_bps: Decimal,
    /// Raise quantity to exchange minimums instead of failing.
    pub allow_qty_increase: bool,
}

impl Default for ProtectiveSettings {
    fn default() -> Self {
        Self {
            min_ticks: 2,
            min_bps: Decimal::new(5, 0),
            allow_qty_increase: false,
        }
    }
}

/// A requested protective order for an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectiveOrderRequest {
    /// Side of the open position.
    pub position_side: OrderSide,
    /// Stop-loss or take-profit.
    pub kind: ProtectiveKind,
    /// Desired trigger price.
    pub trigger_price: Decimal,
    /// Quantity to protect.
    pub quantity: Decimal,
    /// Live market price.
    pub current_price: Decimal,
}

/// Exchange-legal protective order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectivePlan {
    /// Order side (opposite of the position).
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Tick-aligned trigger price on the legal side of the market.
    pub trigger_price: Decimal,
    /// Step-aligned quantity satisfying exchange minimums.
    pub quantity: Decimal,
    /// Whether the trigger price was moved.
    pub price_adjusted: bool,
}

/// Plan a protective order.
///
/// The required distance is the larger of `settings.min_ticks` and the
/// basis-point buffer expressed in whole ticks.
pub fn plan_protective_order(
    request: &ProtectiveOrderRequest,
    filters: &MarketFilterSnapshot,
    settings: &ProtectiveSettings,
) -> Result<ProtectivePlan, PrecisionError> {
    let tick = filters
        .tick
        .ok_or(PrecisionError::MissingFilter { filter: "tick" })?;

    let buffer = min_price_buffer(request.current_price, tick, settings.min_bps, settings.min_ticks);
    let buffer_ticks = (buffer / tick).ceil();
    let min_ticks = buffer_ticks
        .to_u32()
        .unwrap_or(u32::MAX)
        .max(settings.min_ticks);

    let is_sl = request.kind == ProtectiveKind::StopLoss;
    let trigger_price = nudge_price(
        request.trigger_price,
        request.current_price,
        tick,
        request.position_side,
        is_sl,
        min_ticks,
    )?;

    if let Some(min) = filters.min_price.filter(|min| trigger_price < *min) {
        return Err(PrecisionError::BelowMinPrice {
            price: trigger_price,
            min,
        });
    }
    if let Some(max) = filters.max_price.filter(|max| trigger_price > *max) {
        return Err(PrecisionError::AboveMaxPrice {
            price: trigger_price,
            max,
        });
    }

    let quantity = ensure_minimums(
        request.quantity,
        trigger_price,
        filters.step.unwrap_or(Decimal::ZERO),
        filters.min_qty,
        filters.effective_min_notional(),
        settings.allow_qty_increase,
    )?;
    if let Some(max) = filters.max_qty.filter(|max| quantity > *max) {
        return Err(PrecisionError::AboveMaxQty { qty: quantity, max });
    }

    Ok(ProtectivePlan {
        side: request.position_side.opposite(),
        order_type: request.kind.order_type(),
        trigger_price,
        quantity,
        price_adjusted: trigger_price != request.trigger_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filters() -> MarketFilterSnapshot {
        MarketFilterSnapshot {
            tick: Some(dec!(0.1)),
            step: Some(dec!(0.001)),
            min_qty: Some(dec!(0.001)),
            max_qty: Some(dec!(50)),
            min_notional: Some(dec!(5)),
            ..Default::default()
        }
    }

    #[test]
    fn test_long_stop_kept_when_far_enough() {
        let request = ProtectiveOrderRequest {
            position_side: OrderSide::Buy,
            kind: ProtectiveKind::StopLoss,
            trigger_price: dec!(95),
            quantity: dec!(0.5),
            current_price: dec!(100),
        };

        let plan = plan_protective_order(&request, &filters(), &ProtectiveSettings::default()).unwrap();

        assert_eq!(plan.side, OrderSide::Sell);
        assert_eq!(plan.order_type, OrderType::StopMarket);
        assert_eq!(plan.trigger_price, dec!(95));
        assert_eq!(plan.quantity, dec!(0.5));
        assert!(!plan.price_adjusted);
    }

    #[test]
    fn test_bps_buffer_widens_distance() {
        // 50 bps of 1000 = 5.0 → 50 ticks, beats min_ticks 2
        let settings = ProtectiveSettings {
            min_bps: dec!(50),
            ..Default::default()
        };
        let request = ProtectiveOrderRequest {
            position_side: OrderSide::Buy,
            kind: ProtectiveKind::TakeProfit,
            trigger_price: dec!(1001),
            quantity: dec!(0.01),
            current_price: dec!(1000),
        };

        let plan = plan_protective_order(&request, &filters(), &settings).unwrap();

        assert_eq!(plan.order_type, OrderType::TakeProfitMarket);
        assert_eq!(plan.trigger_price, dec!(1005));
        assert!(plan.price_adjusted);
    }

    #[test]
    fn test_short_stop_on_wrong_side_is_moved_above() {
        let request = ProtectiveOrderRequest {
            position_side: OrderSide::Sell,
            kind: ProtectiveKind::StopLoss,
            trigger_price: dec!(99),
            quantity: dec!(1),
            current_price: dec!(100),
        };

        let plan = plan_protective_order(&request, &filters(), &ProtectiveSettings::default()).unwrap();

        assert_eq!(plan.side, OrderSide::Buy);
        assert_eq!(plan.trigger_price, dec!(100.2));
    }

    #[test]
    fn test_quantity_raised_when_allowed() {
        let settings = ProtectiveSettings {
            allow_qty_increase: true,
            ..Default::default()
        };
        let request = ProtectiveOrderRequest {
            position_side: OrderSide::Buy,
            kind: ProtectiveKind::StopLoss,
            trigger_price: dec!(90),
            quantity: dec!(0.01),
            current_price: dec!(100),
        };

        let plan = plan_protective_order(&request, &filters(), &settings).unwrap();
        // 5 / 90 = 0.0555.. → 0.056
        assert_eq!(plan.quantity, dec!(0.056));

        let strict = plan_protective_order(&request, &filters(), &ProtectiveSettings::default());
        assert!(matches!(strict, Err(PrecisionError::BelowMinNotional { .. })));
    }

    #[test]
    fn test_requires_tick_filter() {
        let request = ProtectiveOrderRequest {
            position_side: OrderSide::Buy,
            kind: ProtectiveKind::StopLoss,
            trigger_price: dec!(90),
            quantity: dec!(1),
            current_price: dec!(100),
        };
        let result = plan_protective_order(
            &request,
            &MarketFilterSnapshot::default(),
            &ProtectiveSettings::default(),
        );
        assert_eq!(result, Err(PrecisionError::MissingFilter { filter: "tick" }));
    }
}
