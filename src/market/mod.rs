//! Collaborator interfaces the core calls out to.
//!
//! The lending market and swap router are external systems; the core
//! only depends on these traits. Deterministic implementations for
//! scenario runs and tests live in [`sim`].

pub mod sim;

use crate::error::Result;

/// A lending market holding one leveraged position: collateral supplied
/// in the underlying asset, debt borrowed in the same (or a correlated)
/// asset.
pub trait LendingMarket {
    fn supply(&mut self, amount: u128) -> Result<()>;

    fn borrow(&mut self, amount: u128) -> Result<()>;

    /// Repay up to `amount` of debt; returns the amount actually repaid.
    fn repay(&mut self, amount: u128) -> Result<u128>;

    /// Withdraw up to `amount` of collateral; returns the amount the
    /// market actually released (it may hold part of it back).
    fn withdraw_collateral(&mut self, amount: u128) -> Result<u128>;

    fn current_supplied(&self) -> u128;

    fn current_borrowed(&self) -> u128;

    /// Rewards accrued and not yet claimed, in reward-token units.
    fn claimable_rewards(&self) -> u128;

    /// Claim all pending rewards; returns the reward-token amount.
    fn claim_rewards(&mut self) -> u128;

    /// Advance market state by `dt_secs` (interest and reward accrual).
    fn tick(&mut self, dt_secs: u64);
}

/// Swap router used during harvest to convert reward tokens into the
/// underlying asset.
pub trait SwapRouter {
    /// Swap `amount_in` of `path.first()` into `path.last()`. Fails
    /// with `SlippageExceeded` if the output is below `min_out`.
    fn swap_exact_in(&mut self, path: &[String], amount_in: u128, min_out: u128) -> Result<u128>;

    /// Read-only output estimate for the same swap. Harvest previews
    /// rely on this to quote the caller incentive without executing.
    fn quote_exact_in(&self, path: &[String], amount_in: u128) -> Result<u128>;
}
