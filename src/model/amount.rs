//! Integer amount math for the share/asset ledger.
//!
//! All asset and share quantities are `u128` values in the underlying
//! token's smallest unit. Conversions between the two always go through
//! [`mul_div`] with an explicit rounding direction so that every
//! operation rounds in favor of the pool, never the caller.

use crate::error::{Result, VaultError};

/// Basis-point denominator: 10_000 BPS = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Scale for the locked-profit degradation rate. A per-second rate equal
/// to the full coefficient releases the entire buffer in one second.
pub const DEGRADATION_COEFFICIENT: u128 = 1_000_000_000_000_000_000;

/// Sentinel meaning "no TVL cap".
pub const NO_TVL_CAP: u128 = u128::MAX;

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// `value * numerator / denominator` with checked intermediate product.
///
/// Returns 0 for a zero denominator (callers guard the meaningful
/// zero-supply cases explicitly).
pub fn mul_div(
    value: u128,
    numerator: u128,
    denominator: u128,
    rounding: Rounding,
) -> Result<u128> {
    if denominator == 0 {
        return Ok(0);
    }
    let product = value.checked_mul(numerator).ok_or(VaultError::Overflow)?;
    let quotient = product / denominator;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up => {
            if product % denominator == 0 {
                Ok(quotient)
            } else {
                Ok(quotient + 1)
            }
        }
    }
}

/// Take `bps` basis points of `value`, rounding down.
pub fn bps_of(value: u128, bps: u16) -> u128 {
    value
        .checked_mul(bps as u128)
        .map(|p| p / BPS_DENOMINATOR as u128)
        .unwrap_or(value / BPS_DENOMINATOR as u128 * bps as u128)
}

/// Ratio of `debt` to `collateral` in basis points; 0 for an empty position.
pub fn ratio_bps(debt: u128, collateral: u128) -> u16 {
    if collateral == 0 {
        return 0;
    }
    let bps = debt
        .saturating_mul(BPS_DENOMINATOR as u128)
        .checked_div(collateral)
        .unwrap_or(0);
    bps.min(u16::MAX as u128) as u16
}
