//! Exchange precision handling.
//!
//! - [`adjust`]: exact-decimal rounding and nudging primitives
//! - [`PrecisionGate`]: validates and normalizes an order against filters
//! - [`plan_protective_order`]: places stop-loss/take-profit on the legal
//!   side of a live price

pub mod adjust;
mod error;
mod gate;
mod protective;

pub use adjust::{
    StepRounding, TickRounding, ensure_minimums, min_price_buffer, nudge_price, round_to_step,
    round_to_tick,
};
pub use error::PrecisionError;
pub use gate::{NormalizedOrder, PrecisionGate};
pub use protective::{
    ProtectiveKind, ProtectiveOrderRequest, ProtectivePlan, ProtectiveSettings,
    plan_protective_order,
};
