//! Client id and protective order configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::idempotency::{ClientIdError, ClientOrderIdFactory, DEFAULT_CLIENT_ID_MAX_LEN};
use crate::precision::ProtectiveSettings;

/// Client order id configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdConfig {
    /// Exchange limit on client order id length.
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl Default for ClientIdConfig {
    fn default() -> Self {
        Self {
            max_len: default_max_len(),
        }
    }
}

impl ClientIdConfig {
    /// Id factory for this length.
    pub fn factory(&self) -> Result<ClientOrderIdFactory, ClientIdError> {
        ClientOrderIdFactory::new(self.max_len)
    }
}

const fn default_max_len() -> usize {
    DEFAULT_CLIENT_ID_MAX_LEN
}

/// Stop-loss/take-profit distance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectiveConfig {
    /// Minimum distance from market, in ticks.
    #[serde(default = "default_min_ticks")]
    pub min_ticks: u32,
    /// Minimum distance from market, in basis points.
    #[serde(default = "default_min_bps")]
    pub min_bps: Decimal,
    /// Round protective quantities up to exchange minimums.
    #[serde(default)]
    pub allow_qty_increase: bool,
}

impl Default for ProtectiveConfig {
    fn default() -> Self {
        Self {
            min_ticks: default_min_ticks(),
            min_bps: default_min_bps(),
            allow_qty_increase: false,
        }
    }
}

impl ProtectiveConfig {
    /// Planner settings.
    #[must_use]
    pub const fn to_settings(&self) -> ProtectiveSettings {
        ProtectiveSettings {
            min_ticks: self.min_ticks,
            min_bps: self.min_bps,
            allow_qty_increase: self.allow_qty_increase,
        }
    }
}

const fn default_min_ticks() -> u32 {
    2
}

const fn default_min_bps() -> Decimal {
    Decimal::from_parts(5, 0, 0, false, 0)
}
