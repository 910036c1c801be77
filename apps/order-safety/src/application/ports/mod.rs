//! Application Ports
//!
//! Driven ports: how the safety core reaches external systems.

mod exchange_port;

pub use exchange_port::{
    DUPLICATE_CLIENT_ORDER_ID, ExchangeError, ExchangePort, OrderAck, SubmitOrderRequest,
};
