//! Core data model shared by every safety component.

mod environment;
mod filters;
mod order;

pub use environment::Environment;
pub use filters::{
    ExchangeFilter, ExchangeMarket, MarketFilterSnapshot, MarketInfo, MarketLimits,
    MarketPrecision, MinMax,
};
pub use order::{OrderIntent, OrderSide, OrderType};
