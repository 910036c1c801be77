//! Application Use Cases

mod place_order;

pub use place_order::{DEFAULT_ORDER_WEIGHT, PlaceOrderOutcome, PlaceOrderUseCase};
