//! Exact-decimal rounding and nudging primitives.
//!
//! All arithmetic is done in [`Decimal`]; binary floats are never used for
//! tick/step rounding.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::PrecisionError;
use crate::models::OrderSide;

/// Basis points per unit.
const BPS_DIVISOR: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Rounding mode for prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickRounding {
    /// Nearest tick, ties to even (no systematic bias across many orders).
    Nearest,
    /// Floor to a tick multiple.
    Down,
    /// Ceil to a tick multiple.
    Up,
}

/// Rounding mode for quantities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRounding {
    /// Floor to a step multiple (conservative default).
    #[default]
    Down,
    /// Ceil to a step multiple (used to satisfy minimums).
    Up,
}

impl From<StepRounding> for TickRounding {
    fn from(mode: StepRounding) -> Self {
        match mode {
            StepRounding::Down => Self::Down,
            StepRounding::Up => Self::Up,
        }
    }
}

/// Round `price` to a multiple of `tick`.
///
/// A non-positive `tick` leaves the price untouched.
#[must_use]
pub fn round_to_tick(price: Decimal, tick: Decimal, mode: TickRounding) -> Decimal {
    let strategy = match mode {
        TickRounding::Nearest => RoundingStrategy::MidpointNearestEven,
        TickRounding::Down => RoundingStrategy::ToNegativeInfinity,
        TickRounding::Up => RoundingStrategy::ToPositiveInfinity,
    };
    round_to_increment(price, tick, strategy)
}

/// Round `qty` to a multiple of `step`.
///
/// A non-positive `step` leaves the quantity untouched.
#[must_use]
pub fn round_to_step(qty: Decimal, step: Decimal, mode: StepRounding) -> Decimal {
    round_to_tick(qty, step, mode.into())
}

fn round_to_increment(value: Decimal, increment: Decimal, strategy: RoundingStrategy) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    let units = (value / increment).round_dp_with_strategy(0, strategy);
    units * increment
}

/// Minimum distance a protective order keeps from its reference price.
///
/// The larger of an absolute floor (`min_ticks * tick`) and a relative floor
/// (`ref_price * min_bps / 10000`).
#[must_use]
pub fn min_price_buffer(ref_price: Decimal, tick: Decimal, min_bps: Decimal, min_ticks: u32) -> Decimal {
    let tick_floor = Decimal::from(min_ticks) * tick.max(Decimal::ZERO);
    let bps_floor = ref_price.abs() * min_bps.max(Decimal::ZERO) / BPS_DIVISOR;
    tick_floor.max(bps_floor)
}

/// Move a protective price onto the legal side of `current_price`.
///
/// `side` is the position side. A long's stop-loss and a short's take-profit
/// must sit strictly below `current_price`; a long's take-profit and a short's
/// stop-loss strictly above. The price must also be at least `min_ticks`
/// (never less than one) ticks away.
///
/// Wrong-side or equal prices are relocated to `current_price ∓ min_ticks *
/// tick`; correctly sided prices that are too close are pushed out by the
/// missing distance. The result is rounded to a tick multiple away from
/// `current_price`, so rounding can never land it back on the wrong side.
pub fn nudge_price(
    price: Decimal,
    current_price: Decimal,
    tick: Decimal,
    side: OrderSide,
    is_sl: bool,
    min_ticks: u32,
) -> Result<Decimal, PrecisionError> {
    if current_price <= Decimal::ZERO {
        return Err(PrecisionError::NonPositive {
            field: "current_price",
            value: current_price,
        });
    }
    if tick <= Decimal::ZERO {
        return Err(PrecisionError::MissingFilter { filter: "tick" });
    }

    let want_less = matches!((side, is_sl), (OrderSide::Buy, true) | (OrderSide::Sell, false));
    let gap = Decimal::from(min_ticks.max(1)) * tick;

    let nudged = if want_less {
        let limit = current_price - gap;
        let target = if price >= current_price || current_price - price < gap {
            limit
        } else {
            price
        };
        round_to_tick(target, tick, TickRounding::Down)
    } else {
        let limit = current_price + gap;
        let target = if price <= current_price || price - current_price < gap {
            limit
        } else {
            price
        };
        round_to_tick(target, tick, TickRounding::Up)
    };

    if nudged <= Decimal::ZERO {
        return Err(PrecisionError::NonPositive {
            field: "nudged price",
            value: nudged,
        });
    }

    if nudged != price {
        tracing::debug!(
            %price,
            %current_price,
            %nudged,
            side = %side,
            is_sl,
            "Protective price nudged"
        );
    }

    Ok(nudged)
}

/// Floor `qty` to `step`, then enforce `min_qty` and `min_notional / price`.
///
/// With `allow_increase` the quantity is bumped up to the smallest
/// step-aligned value satisfying both floors; otherwise a violation is an
/// error.
pub fn ensure_minimums(
    qty: Decimal,
    price: Decimal,
    step: Decimal,
    min_qty: Option<Decimal>,
    min_notional: Option<Decimal>,
    allow_increase: bool,
) -> Result<Decimal, PrecisionError> {
    if qty <= Decimal::ZERO {
        return Err(PrecisionError::NonPositive {
            field: "quantity",
            value: qty,
        });
    }

    let rounded = round_to_step(qty, step, StepRounding::Down);

    let qty_floor = min_qty.unwrap_or(Decimal::ZERO);
    let notional_floor = match min_notional {
        Some(min) if min > Decimal::ZERO => {
            if price <= Decimal::ZERO {
                return Err(PrecisionError::NonPositive {
                    field: "price",
                    value: price,
                });
            }
            min / price
        }
        _ => Decimal::ZERO,
    };
    let required = qty_floor.max(notional_floor);

    if rounded >= required && rounded > Decimal::ZERO {
        return Ok(rounded);
    }

    if !allow_increase {
        if rounded < qty_floor {
            return Err(PrecisionError::BelowMinQty {
                qty: rounded,
                min: qty_floor,
            });
        }
        if let Some(min) = min_notional.filter(|_| rounded < notional_floor) {
            return Err(PrecisionError::BelowMinNotional {
                notional: rounded * price,
                limit: "min_notional",
                min,
            });
        }
        return Err(PrecisionError::RoundsToZero {
            field: "quantity",
            value: qty,
            increment: step,
        });
    }

    let mut bumped = round_to_step(required, step, StepRounding::Up);
    if bumped <= Decimal::ZERO {
        bumped = step;
    }
    if bumped <= Decimal::ZERO {
        return Err(PrecisionError::RoundsToZero {
            field: "quantity",
            value: qty,
            increment: step,
        });
    }

    tracing::debug!(%qty, %rounded, %bumped, "Quantity raised to exchange minimums");
    Ok(bumped)
}
