//! Application Layer
//!
//! - **Ports**: interfaces for reaching the exchange
//! - **Use Cases**: the order placement flow

pub mod ports;
pub mod use_cases;

pub use ports::*;
pub use use_cases::*;
