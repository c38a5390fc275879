//! Deployment expense calculator
//!
//! Pure fixed-point arithmetic over cycles and token ulps. Computes the
//! total cycles a deployment requires and the token amount the deployer
//! must approve, including the configured safety buffer and rounding.
//! Gates whether a deployment may start at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Cycles, TimestampMillis};

/// Permyriad denominator (1 permyriad = 1/10_000)
pub const PERMYRIAD_DENOMINATOR: u128 = 10_000;

/// Atomic decimal places of the value token (1 token = 10^8 ulps)
pub const TOKEN_DECIMAL_PLACES: u8 = 8;

/// Contract violations of the calculator inputs. Returned, never thrown
/// past the module boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpensesError {
    #[error("exchange rate must be strictly positive")]
    ZeroExchangeRate,

    #[error("decimal places must be in range 0-{TOKEN_DECIMAL_PLACES}, got {0}")]
    InvalidDecimalPlaces(u8),

    #[error("arithmetic overflow while calculating deployment expenses")]
    Overflow,

    #[error(
        "buffered expenses amount {buffered_ulps} does not cover two ledger fees of {fee_ulps}"
    )]
    BelowMinimalCost { buffered_ulps: u128, fee_ulps: u128 },
}

/// Everything the calculator needs, gathered from the hub config, the
/// template and the live conversion rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseParameters {
    pub contract_initial_cycles: Cycles,
    pub deployment_cycles_cost: Cycles,
    pub cycles_permyriad_per_token: u64,
    pub ledger_fee_ulps: u64,
    pub amount_buffer_permyriad: u64,
    pub amount_decimal_places: u8,
    pub allowance_expiration_timeout_millis: TimestampMillis,
}

/// Calculated deployment expenses. Immutable once computed; recomputed
/// from scratch whenever any input changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expenses {
    pub deployment_cycles_cost: Cycles,
    pub contract_initial_cycles: Cycles,
    pub cost_buffer_cycles: Cycles,
    pub total_required_cycles: Cycles,

    pub cycles_permyriad_per_token: u64,

    pub buffered_amount_ulps: u128,
    pub ledger_fee_ulps: u64,
    pub total_cost_ulps: u128,

    pub allowance_expiration_timeout_millis: TimestampMillis,
}

/// Calculate the full expense breakdown for one deployment.
///
/// Rejects inputs whose buffered amount would not cover the minimal
/// possible cost of two ledger fees: one for moving tokens onto the
/// transit account and one for moving them off it.
pub fn calculate_deployment_expenses(params: &ExpenseParameters) -> Result<Expenses, ExpensesError> {
    if params.amount_decimal_places > TOKEN_DECIMAL_PLACES {
        return Err(ExpensesError::InvalidDecimalPlaces(
            params.amount_decimal_places,
        ));
    }

    let cost_buffer_cycles = cost_buffer_cycles(
        params.deployment_cycles_cost,
        params.contract_initial_cycles,
        params.amount_buffer_permyriad,
    )?;
    let total_required_cycles = params
        .deployment_cycles_cost
        .checked_add(params.contract_initial_cycles)
        .and_then(|sum| sum.checked_add(cost_buffer_cycles))
        .ok_or(ExpensesError::Overflow)?;

    let amount_ulps = expenses_amount_ulps(
        params.deployment_cycles_cost,
        params.contract_initial_cycles,
        params.cycles_permyriad_per_token,
    )?;
    let buffered_amount_ulps = buffered_expenses_amount_ulps(
        amount_ulps,
        params.amount_buffer_permyriad,
        params.amount_decimal_places,
    )?;

    // The minimal viable transfer covers two fee-bearing hops; anything at
    // or below that cannot fund the deployment.
    let fee_ulps = params.ledger_fee_ulps as u128;
    let minimal_cost_ulps = fee_ulps.checked_mul(2).ok_or(ExpensesError::Overflow)?;
    if buffered_amount_ulps <= minimal_cost_ulps {
        return Err(ExpensesError::BelowMinimalCost {
            buffered_ulps: buffered_amount_ulps,
            fee_ulps,
        });
    }

    let total_cost_ulps = buffered_amount_ulps
        .checked_add(fee_ulps)
        .ok_or(ExpensesError::Overflow)?;

    Ok(Expenses {
        deployment_cycles_cost: params.deployment_cycles_cost,
        contract_initial_cycles: params.contract_initial_cycles,
        cost_buffer_cycles,
        total_required_cycles,

        cycles_permyriad_per_token: params.cycles_permyriad_per_token,

        buffered_amount_ulps,
        ledger_fee_ulps: params.ledger_fee_ulps,
        total_cost_ulps,

        allowance_expiration_timeout_millis: params.allowance_expiration_timeout_millis,
    })
}

/// Raw token amount for the cycles a deployment consumes: integer division
/// truncating toward zero, matching the hub's own arithmetic.
pub fn expenses_amount_ulps(
    deployment_cycles_cost: Cycles,
    contract_initial_cycles: Cycles,
    cycles_permyriad_per_token: u64,
) -> Result<u128, ExpensesError> {
    if cycles_permyriad_per_token == 0 {
        return Err(ExpensesError::ZeroExchangeRate);
    }
    deployment_cycles_cost
        .checked_add(contract_initial_cycles)
        .map(|sum| sum / cycles_permyriad_per_token as u128)
        .ok_or(ExpensesError::Overflow)
}

/// Amount plus the permyriad safety buffer, rounded up to the configured
/// precision
pub fn buffered_expenses_amount_ulps(
    amount_ulps: u128,
    amount_buffer_permyriad: u64,
    amount_decimal_places: u8,
) -> Result<u128, ExpensesError> {
    let buffer = amount_ulps
        .checked_mul(amount_buffer_permyriad as u128)
        .map(|product| product / PERMYRIAD_DENOMINATOR)
        .ok_or(ExpensesError::Overflow)?;
    let sum = amount_ulps.checked_add(buffer).ok_or(ExpensesError::Overflow)?;
    round_ulps_ceil(sum, amount_decimal_places)
}

/// Permyriad safety buffer over the total cycles cost
pub fn cost_buffer_cycles(
    deployment_cycles_cost: Cycles,
    contract_initial_cycles: Cycles,
    amount_buffer_permyriad: u64,
) -> Result<Cycles, ExpensesError> {
    deployment_cycles_cost
        .checked_add(contract_initial_cycles)
        .and_then(|sum| sum.checked_mul(amount_buffer_permyriad as u128))
        .map(|product| product / PERMYRIAD_DENOMINATOR)
        .ok_or(ExpensesError::Overflow)
}

/// Round a ulps amount up to the nearest multiple of `10^(8 - decimal_places)`.
///
/// `decimal_places` is the precision kept after the decimal point in whole
/// tokens: 0 rounds up to a whole token, 8 keeps full ulps precision.
pub fn round_ulps_ceil(amount: u128, decimal_places: u8) -> Result<u128, ExpensesError> {
    if decimal_places > TOKEN_DECIMAL_PLACES {
        return Err(ExpensesError::InvalidDecimalPlaces(decimal_places));
    }

    let base = 10u128.pow((TOKEN_DECIMAL_PLACES - decimal_places) as u32);

    if amount % base == 0 {
        Ok(amount)
    } else {
        (amount / base)
            .checked_add(1)
            .and_then(|quotient| quotient.checked_mul(base))
            .ok_or(ExpensesError::Overflow)
    }
}
