//! Deployment environment for exchange connectivity.

use serde::{Deserialize, Serialize};

/// Deployment environment (TESTNET or LIVE).
///
/// Every environment owns its own idempotency file and audit trail; the two
/// never share files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Exchange sandbox - real API, simulated funds.
    #[default]
    Testnet,
    /// Production exchange - real orders with real money.
    Live,
}

impl Environment {
    /// Returns true if this is the production environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Returns true if this is the sandbox environment.
    #[must_use]
    pub const fn is_testnet(&self) -> bool {
        matches!(self, Self::Testnet)
    }

    /// Lowercase slug used in file names (`audit_{slug}_{date}.jsonl`).
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::Testnet => "testnet",
            Self::Live => "live",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Testnet => write!(f, "TESTNET"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TESTNET" | "TEST" | "SANDBOX" => Ok(Self::Testnet),
            "LIVE" | "PROD" | "PRODUCTION" => Ok(Self::Live),
            _ => Err(format!("Invalid environment: {s}. Must be TESTNET or LIVE.")),
        }
    }
}
