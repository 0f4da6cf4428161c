//! Deterministic market simulators. Interest and reward accrual use
//! integer BPS-per-year rates so a scenario run is reproducible down to
//! the smallest unit.

use crate::error::{Result, VaultError};
use crate::market::{LendingMarket, SwapRouter};
use crate::model::amount::{BPS_DENOMINATOR, SECONDS_PER_YEAR};

/// Lending market simulator: supply-side interest, borrow-side interest,
/// and reward emissions on supplied collateral.
#[derive(Debug, Clone)]
pub struct SimLendingMarket {
    supplied: u128,
    borrowed: u128,
    /// Annual rates in BPS.
    pub supply_rate_bps: u16,
    pub borrow_rate_bps: u16,
    pub reward_rate_bps: u16,
    claimable: u128,
    /// Collateral the market refuses to release (models illiquidity).
    pub frozen_collateral: u128,
}

impl SimLendingMarket {
    pub fn new(supply_rate_bps: u16, borrow_rate_bps: u16, reward_rate_bps: u16) -> Self {
        Self {
            supplied: 0,
            borrowed: 0,
            supply_rate_bps,
            borrow_rate_bps,
            reward_rate_bps,
            claimable: 0,
            frozen_collateral: 0,
        }
    }

    fn accrued(principal: u128, rate_bps: u16, dt_secs: u64) -> u128 {
        principal
            .saturating_mul(rate_bps as u128)
            .saturating_mul(dt_secs as u128)
            / (BPS_DENOMINATOR as u128 * SECONDS_PER_YEAR as u128)
    }
}

impl LendingMarket for SimLendingMarket {
    fn supply(&mut self, amount: u128) -> Result<()> {
        self.supplied = self.supplied.checked_add(amount).ok_or(VaultError::Overflow)?;
        Ok(())
    }

    fn borrow(&mut self, amount: u128) -> Result<()> {
        self.borrowed = self.borrowed.checked_add(amount).ok_or(VaultError::Overflow)?;
        Ok(())
    }

    fn repay(&mut self, amount: u128) -> Result<u128> {
        let repaid = amount.min(self.borrowed);
        self.borrowed -= repaid;
        Ok(repaid)
    }

    fn withdraw_collateral(&mut self, amount: u128) -> Result<u128> {
        let liquid = self.supplied.saturating_sub(self.frozen_collateral);
        let released = amount.min(liquid);
        self.supplied -= released;
        Ok(released)
    }

    fn current_supplied(&self) -> u128 {
        self.supplied
    }

    fn current_borrowed(&self) -> u128 {
        self.borrowed
    }

    fn claimable_rewards(&self) -> u128 {
        self.claimable
    }

    fn claim_rewards(&mut self) -> u128 {
        std::mem::take(&mut self.claimable)
    }

    fn tick(&mut self, dt_secs: u64) {
        if dt_secs == 0 {
            return;
        }
        self.supplied += Self::accrued(self.supplied, self.supply_rate_bps, dt_secs);
        self.borrowed += Self::accrued(self.borrowed, self.borrow_rate_bps, dt_secs);
        self.claimable += Self::accrued(self.supplied, self.reward_rate_bps, dt_secs);
    }
}

/// Fixed-rate swap router with a slippage haircut in BPS.
#[derive(Debug, Clone)]
pub struct SimSwapRouter {
    /// Output units per input unit, as a rational.
    pub rate_numerator: u128,
    pub rate_denominator: u128,
    pub slippage_bps: u16,
}

impl SimSwapRouter {
    pub fn new(rate_numerator: u128, rate_denominator: u128, slippage_bps: u16) -> Self {
        Self {
            rate_numerator,
            rate_denominator: rate_denominator.max(1),
            slippage_bps,
        }
    }

    /// 1:1 router with no slippage.
    pub fn at_par() -> Self {
        Self::new(1, 1, 0)
    }
}

impl SimSwapRouter {
    fn output_for(&self, amount_in: u128) -> Result<u128> {
        let gross = amount_in
            .checked_mul(self.rate_numerator)
            .ok_or(VaultError::Overflow)?
            / self.rate_denominator;
        Ok(gross * (BPS_DENOMINATOR as u128 - self.slippage_bps as u128)
            / BPS_DENOMINATOR as u128)
    }
}

impl SwapRouter for SimSwapRouter {
    fn swap_exact_in(&mut self, _path: &[String], amount_in: u128, min_out: u128) -> Result<u128> {
        let out = self.output_for(amount_in)?;
        if out < min_out {
            return Err(VaultError::SlippageExceeded { out, min_out });
        }
        Ok(out)
    }

    fn quote_exact_in(&self, _path: &[String], amount_in: u128) -> Result<u128> {
        self.output_for(amount_in)
    }
}
