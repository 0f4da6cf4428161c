//! Strategy leverage engine.
//!
//! Each strategy owns one leveraged position against an external
//! lending market: collateral supplied in the underlying asset, debt
//! borrowed against it and re-supplied. The engine keeps the position's
//! loan-to-value inside `[target, target + drift]` using bounded
//! borrow/repay steps — running out of step budget is a normal
//! deferred-completion outcome, picked up again at the next harvest.

pub mod apr;
pub mod harvest;
pub mod upgrade;

use crate::error::{Result, VaultError};
use crate::market::{LendingMarket, SwapRouter};
use crate::model::amount::{BPS_DENOMINATOR, Rounding, mul_div, ratio_bps};

use apr::HarvestLog;
use upgrade::{CooldownState, UpgradeGuard};

pub use harvest::HarvestOutcome;

const BPS: u128 = BPS_DENOMINATOR as u128;

/// Iteration cap for full-unwind paths (panic, retire, emergency
/// shutdown). These ignore the per-rebalance step budget but still
/// terminate: each pass releases the maximum collateral the max-LTV
/// envelope allows, so debt shrinks geometrically.
const MAX_UNWIND_ITERATIONS: u32 = 256;

/// Hard ceiling on the total harvest fee.
pub const MAX_TOTAL_FEE_BPS: u16 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Idle,
    Deployed,
    Rebalancing,
    EmergencyUnwound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeverageParams {
    pub target_ltv_bps: u16,
    pub max_ltv_bps: u16,
    /// Allowed drift above target before a rebalance triggers.
    pub drift_bps: u16,
    /// Largest single borrow or repay step.
    pub step_size: u128,
    /// Step budget per rebalance call.
    pub max_steps: u32,
}

impl LeverageParams {
    pub fn validate(&self) -> Result<()> {
        if self.target_ltv_bps >= self.max_ltv_bps || self.max_ltv_bps > BPS_DENOMINATOR as u16 {
            return Err(VaultError::InvalidLtvBounds {
                target_bps: self.target_ltv_bps,
                max_bps: self.max_ltv_bps,
            });
        }
        Ok(())
    }
}

/// Harvest fee configuration. `total_fee_bps` is taken from gross
/// profit; the three shares split that fee and must sum to 10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeConfig {
    pub total_fee_bps: u16,
    pub caller_share_bps: u16,
    pub treasury_share_bps: u16,
    pub strategist_share_bps: u16,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            total_fee_bps: 450,
            caller_share_bps: 1_000,
            treasury_share_bps: 4_500,
            strategist_share_bps: 4_500,
        }
    }
}

impl FeeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.total_fee_bps > MAX_TOTAL_FEE_BPS {
            return Err(VaultError::FeeTooHigh(self.total_fee_bps, MAX_TOTAL_FEE_BPS));
        }
        let split = self.caller_share_bps as u32
            + self.treasury_share_bps as u32
            + self.strategist_share_bps as u32;
        if split != BPS_DENOMINATOR as u32 {
            return Err(VaultError::InvalidFeeSplit(split));
        }
        Ok(())
    }
}

pub struct StrategyEngine {
    pub id: String,
    market: Box<dyn LendingMarket>,
    router: Box<dyn SwapRouter>,
    params: LeverageParams,
    fees: FeeConfig,
    state: StrategyState,
    paused: bool,
    emergency_exit: bool,
    retired: bool,
    /// Underlying held by the strategy but not supplied as collateral.
    want_idle: u128,
    /// Balance at the last report to the vault; harvest profit is the
    /// delta against this.
    last_reported_balance: u128,
    last_harvest_at: Option<u64>,
    harvest_log: HarvestLog,
    upgrade: UpgradeGuard,
    /// Swap path from the reward token to the underlying.
    reward_path: Vec<String>,
    treasury_collected: u128,
    strategist_collected: u128,
}

impl StrategyEngine {
    pub fn new(
        id: impl Into<String>,
        market: Box<dyn LendingMarket>,
        router: Box<dyn SwapRouter>,
        params: LeverageParams,
        reward_path: Vec<String>,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            id: id.into(),
            market,
            router,
            params,
            fees: FeeConfig::default(),
            state: StrategyState::Idle,
            paused: false,
            emergency_exit: false,
            retired: false,
            want_idle: 0,
            last_reported_balance: 0,
            last_harvest_at: None,
            harvest_log: HarvestLog::new(),
            upgrade: UpgradeGuard::default(),
            reward_path,
            treasury_collected: 0,
            strategist_collected: 0,
        })
    }

    // ── Read surface ────────────────────────────────────────────────

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn emergency_exit(&self) -> bool {
        self.emergency_exit
    }

    pub fn params(&self) -> LeverageParams {
        self.params
    }

    pub fn fees(&self) -> FeeConfig {
        self.fees
    }

    pub fn want_idle(&self) -> u128 {
        self.want_idle
    }

    pub fn supplied(&self) -> u128 {
        self.market.current_supplied()
    }

    pub fn borrowed(&self) -> u128 {
        self.market.current_borrowed()
    }

    /// Net position value: idle + collateral - debt.
    pub fn balance(&self) -> u128 {
        self.want_idle + self.supplied().saturating_sub(self.borrowed())
    }

    /// Debt over collateral in BPS; 0 for an empty position.
    pub fn calculate_ltv(&self) -> u16 {
        ratio_bps(self.borrowed(), self.supplied())
    }

    pub fn average_apr(&self, n: usize) -> Result<f64> {
        self.harvest_log.average_apr(n)
    }

    pub fn harvest_count(&self) -> usize {
        self.harvest_log.len()
    }

    pub fn treasury_collected(&self) -> u128 {
        self.treasury_collected
    }

    pub fn strategist_collected(&self) -> u128 {
        self.strategist_collected
    }

    // ── Vault-facing capital flow ───────────────────────────────────

    /// Credit underlying transferred in by the vault.
    pub fn receive(&mut self, amount: u128) {
        self.want_idle += amount;
    }

    pub(crate) fn mark_reported(&mut self) {
        self.last_reported_balance = self.balance();
    }

    pub fn last_reported_balance(&self) -> u128 {
        self.last_reported_balance
    }

    /// Deploy idle capital into the lending market and lever toward the
    /// target band. Rejected while paused or retired; under emergency
    /// exit the capital stays idle for the next unwind.
    pub fn deposit(&mut self) -> Result<()> {
        if self.retired {
            return Err(VaultError::StrategyRetired(self.id.clone()));
        }
        if self.paused {
            return Err(VaultError::StrategyPaused(self.id.clone()));
        }
        if self.emergency_exit {
            return Ok(());
        }
        self.deploy_idle()
    }

    /// Free up to `amount` of underlying and hand it back to the
    /// caller. Deleverages in bounded steps when idle liquidity is
    /// short; prioritizes the withdrawal over hitting target LTV but
    /// never releases collateral past the max-LTV envelope. Returns the
    /// amount actually freed, which may be less than requested.
    pub fn withdraw(&mut self, amount: u128) -> Result<u128> {
        if amount == 0 {
            return Ok(0);
        }

        if self.want_idle < amount && self.borrowed() > 0 {
            self.state = StrategyState::Rebalancing;
            for _ in 0..self.params.max_steps {
                if self.free_liquidity()? >= amount {
                    break;
                }
                let debt = self.borrowed();
                if debt == 0 {
                    break;
                }
                if self.delever_step(debt.min(self.params.step_size))? == 0 {
                    break;
                }
            }
        }

        let needed = amount.saturating_sub(self.want_idle);
        if needed > 0 {
            let safe = self.safe_collateral_release()?;
            let take = needed.min(safe);
            if take > 0 {
                self.want_idle += self.market.withdraw_collateral(take)?;
            }
        }

        let out = amount.min(self.want_idle);
        self.want_idle -= out;
        self.settle_state();
        Ok(out)
    }

    // ── Operator surface ────────────────────────────────────────────

    pub fn set_leverage_params(&mut self, params: LeverageParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn set_fees(&mut self, fees: FeeConfig) -> Result<()> {
        fees.validate()?;
        self.fees = fees;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Manual deleverage: repay up to `amount` of debt.
    pub fn authorized_delever(&mut self, amount: u128) -> Result<u128> {
        let mut repaid_total = 0u128;
        for _ in 0..MAX_UNWIND_ITERATIONS {
            let debt = self.borrowed();
            if debt == 0 || repaid_total >= amount {
                break;
            }
            let step = (amount - repaid_total).min(debt);
            let repaid = self.delever_step(step)?;
            if repaid == 0 {
                break;
            }
            repaid_total += repaid;
        }
        self.settle_state();
        Ok(repaid_total)
    }

    /// Emergency full deleverage. All recovered capital stays in the
    /// strategy's own idle balance; the vault recalls it at the next
    /// report. Sets the emergency-exit flag so no re-leveraging occurs.
    pub fn panic(&mut self) -> Result<()> {
        if self.retired {
            return Err(VaultError::StrategyRetired(self.id.clone()));
        }
        self.emergency_exit = true;
        self.full_unwind()?;
        self.state = StrategyState::EmergencyUnwound;
        Ok(())
    }

    /// Full unwind returning every recovered unit to the caller
    /// (the vault), then deactivate. Safe to call on an empty strategy.
    pub fn retire(&mut self) -> Result<u128> {
        if self.retired && self.balance() == 0 {
            return Ok(0);
        }
        self.full_unwind()?;
        self.retired = true;
        self.state = StrategyState::Idle;
        Ok(std::mem::take(&mut self.want_idle))
    }

    /// Advance the external market by `dt_secs`.
    pub fn tick(&mut self, dt_secs: u64) {
        self.market.tick(dt_secs);
    }

    // ── Upgrade cooldown ────────────────────────────────────────────

    pub fn initiate_upgrade_cooldown(&mut self, now: u64) -> Result<()> {
        self.upgrade.initiate(now)
    }

    pub fn clear_upgrade_cooldown(&mut self) {
        self.upgrade.clear();
    }

    pub fn upgrade_to(&mut self, version: u32, now: u64) -> Result<u32> {
        self.upgrade.upgrade_to(version, now)
    }

    pub fn upgrade_state(&self, now: u64) -> CooldownState {
        self.upgrade.state(now)
    }

    pub fn version(&self) -> u32 {
        self.upgrade.version()
    }

    // ── Leverage internals ──────────────────────────────────────────

    /// Supply idle capital and rebalance toward the target band, in
    /// whichever direction the position drifted. Shared by `deposit`
    /// and the harvest compounding step (which is not pause-gated).
    fn deploy_idle(&mut self) -> Result<()> {
        let idle = std::mem::take(&mut self.want_idle);
        if idle > 0 {
            self.market.supply(idle)?;
        }
        let ltv = self.calculate_ltv();
        if ltv < self.params.target_ltv_bps {
            self.lever_up()?;
        } else if ltv > self.params.target_ltv_bps + self.params.drift_bps {
            self.delever_to_target()?;
        }
        self.settle_state();
        Ok(())
    }

    /// Bounded borrow→supply loop toward the target LTV. Borrowing `b`
    /// and re-supplying the same `b` moves the ratio monotonically
    /// upward and the exact-solution cap means it can never overshoot
    /// the target, let alone the hard ceiling.
    fn lever_up(&mut self) -> Result<()> {
        self.state = StrategyState::Rebalancing;
        for _ in 0..self.params.max_steps {
            let supplied = self.supplied();
            let borrowed = self.borrowed();
            if supplied == 0 {
                break;
            }
            if ratio_bps(borrowed, supplied) >= self.params.target_ltv_bps {
                break;
            }
            let needed = Self::borrow_to_target(supplied, borrowed, self.params.target_ltv_bps)?;
            let step = needed.min(self.params.step_size);
            if step == 0 {
                break;
            }
            self.market.borrow(step)?;
            self.market.supply(step)?;
        }
        Ok(())
    }

    /// Additional borrow that lands the position exactly on target,
    /// assuming the borrowed amount is re-supplied.
    fn borrow_to_target(supplied: u128, borrowed: u128, target_bps: u16) -> Result<u128> {
        let target = target_bps as u128;
        if target >= BPS {
            return Ok(0);
        }
        let lhs = supplied.checked_mul(target).ok_or(VaultError::Overflow)?;
        let rhs = borrowed.checked_mul(BPS).ok_or(VaultError::Overflow)?;
        if lhs <= rhs {
            return Ok(0);
        }
        Ok((lhs - rhs) / (BPS - target))
    }

    /// Debt to repay (withdraw-and-repay) to come back down to target.
    fn debt_to_repay_for_target(supplied: u128, borrowed: u128, target_bps: u16) -> Result<u128> {
        let target = target_bps as u128;
        if target >= BPS {
            return Ok(0);
        }
        let lhs = borrowed.checked_mul(BPS).ok_or(VaultError::Overflow)?;
        let rhs = supplied.checked_mul(target).ok_or(VaultError::Overflow)?;
        if lhs <= rhs {
            return Ok(0);
        }
        Ok((lhs - rhs).div_ceil(BPS - target))
    }

    fn delever_to_target(&mut self) -> Result<()> {
        self.state = StrategyState::Rebalancing;
        for _ in 0..self.params.max_steps {
            let supplied = self.supplied();
            let borrowed = self.borrowed();
            if ratio_bps(borrowed, supplied) <= self.params.target_ltv_bps + self.params.drift_bps {
                break;
            }
            let needed = Self::debt_to_repay_for_target(supplied, borrowed, self.params.target_ltv_bps)?;
            let step = needed.min(self.params.step_size).min(borrowed);
            if step == 0 {
                break;
            }
            if self.delever_step(step)? == 0 {
                break;
            }
        }
        Ok(())
    }

    /// One bounded deleverage step: repay from idle first, otherwise
    /// free collateral within the max-LTV envelope and repay with it.
    /// Returns the debt actually repaid (0 = no progress possible).
    fn delever_step(&mut self, repay_amount: u128) -> Result<u128> {
        if repay_amount == 0 {
            return Ok(0);
        }

        if self.want_idle > 0 {
            let from_idle = repay_amount.min(self.want_idle);
            let repaid = self.market.repay(from_idle)?;
            self.want_idle -= repaid;
            if repaid > 0 {
                return Ok(repaid);
            }
        }

        let safe = self.safe_collateral_release()?;
        let take = repay_amount.min(safe);
        if take == 0 {
            return Ok(0);
        }
        let released = self.market.withdraw_collateral(take)?;
        if released == 0 {
            return Ok(0);
        }
        let repaid = self.market.repay(released)?;
        if released > repaid {
            self.want_idle += released - repaid;
        }
        Ok(repaid)
    }

    /// Collateral that can be withdrawn right now without pushing LTV
    /// past the hard ceiling.
    fn safe_collateral_release(&self) -> Result<u128> {
        let supplied = self.supplied();
        let borrowed = self.borrowed();
        if borrowed == 0 {
            return Ok(supplied);
        }
        if self.params.max_ltv_bps == 0 {
            return Ok(0);
        }
        let must_stay = mul_div(borrowed, BPS, self.params.max_ltv_bps as u128, Rounding::Up)?;
        Ok(supplied.saturating_sub(must_stay))
    }

    fn free_liquidity(&self) -> Result<u128> {
        Ok(self.want_idle + self.safe_collateral_release()?)
    }

    /// Repay all debt and pull all collateral into strategy idle.
    fn full_unwind(&mut self) -> Result<()> {
        for _ in 0..MAX_UNWIND_ITERATIONS {
            let debt = self.borrowed();
            if debt == 0 {
                break;
            }
            if self.delever_step(debt)? == 0 {
                break;
            }
        }
        let remaining = if self.borrowed() == 0 {
            self.supplied()
        } else {
            self.safe_collateral_release()?
        };
        if remaining > 0 {
            self.want_idle += self.market.withdraw_collateral(remaining)?;
        }
        Ok(())
    }

    fn settle_state(&mut self) {
        if self.state == StrategyState::EmergencyUnwound {
            return;
        }
        self.state = if self.supplied() == 0 && self.borrowed() == 0 {
            StrategyState::Idle
        } else {
            StrategyState::Deployed
        };
    }
}
