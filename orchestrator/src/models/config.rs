//! Hub configuration

use serde::{Deserialize, Serialize};

use crate::models::{Cycles, TimestampMillis, TokenUlps};

/// Hub-side configuration relevant to deployments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Whether the hub currently accepts new deployments
    pub is_deployment_available: bool,

    /// Fixed cycles cost of running the deployment workflow itself
    pub deployment_cycles_cost: Cycles,

    /// Safety buffer applied to the expense amount, in permyriad
    pub deployment_expenses_amount_buffer_permyriad: u64,

    /// Decimal places the expense amount is rounded up to (0-8)
    pub deployment_expenses_amount_decimal_places: u8,

    /// How long a deployment allowance stays valid
    pub deployment_allowance_expiration_timeout_millis: TimestampMillis,

    /// Ledger fee per token transfer
    pub ledger_fee_ulps: TokenUlps,
}

/// Live token/cycles exchange rate, in cycles-permyriad per token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionRate {
    /// Quoted by the minter
    Minter {
        cycles_permyriad_per_token: u64,
        timestamp_seconds: u64,
    },
    /// Fixed by hub configuration
    Fixed { cycles_permyriad_per_token: u64 },
}

impl ConversionRate {
    pub fn cycles_permyriad_per_token(&self) -> u64 {
        match self {
            ConversionRate::Minter {
                cycles_permyriad_per_token,
                ..
            } => *cycles_permyriad_per_token,
            ConversionRate::Fixed {
                cycles_permyriad_per_token,
            } => *cycles_permyriad_per_token,
        }
    }
}
