//! Exactly-once order submission support.
//!
//! [`ClientOrderIdFactory`] derives a short, stable id from an order intent;
//! [`IdempotencyStore`] remembers which intents already have an id so a retry
//! never produces a second live order.

mod client_id;
mod error;
mod lock;
mod store;

pub use client_id::{
    ClientIdError, ClientOrderIdFactory, DEFAULT_CLIENT_ID_MAX_LEN, MIN_CLIENT_ID_LEN,
    make_client_id, sanitize_component, validate_max_len,
};
pub use error::IdempotencyError;
pub use lock::{FileLock, FileLockGuard, NoOpFileLock};
pub use store::{DEFAULT_TTL_DAYS, IdempotencyRecord, IdempotencyStore, Reservation};
