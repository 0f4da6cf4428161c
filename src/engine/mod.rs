//! Pooled-capital vault: share accounting, locked-profit release, and
//! capital routing between idle reserves and leveraged strategies.

pub mod clock;
pub mod guard;
pub mod registry;

use std::collections::HashMap;

use crate::error::{Result, VaultError};
use crate::model::amount::{
    DEGRADATION_COEFFICIENT, NO_TVL_CAP, Rounding, bps_of, mul_div,
};
use crate::model::roles::{Caller, Operation, authorize};
use crate::strategy::{FeeConfig, HarvestOutcome, LeverageParams, StrategyEngine};
use crate::strategy::upgrade::CooldownState;

use guard::CallGuard;
use registry::Registry;

/// Default locked-profit release rate: full unlock over six hours.
pub const DEFAULT_LOCKED_PROFIT_DEGRADATION: u128 = DEGRADATION_COEFFICIENT / 21_600;

/// What one vault-level harvest did: the strategy's own outcome plus
/// the capital moved while rebalancing toward the allocation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub strategy_id: String,
    pub outcome: HarvestOutcome,
    /// Idle capital sent into the strategy.
    pub credited: u128,
    /// Capital pulled back from the strategy into idle.
    pub recalled: u128,
}

pub struct Vault {
    total_shares: u128,
    balances: HashMap<String, u128>,
    /// Underlying held by the vault itself, outside any strategy.
    total_idle: u128,
    tvl_cap: u128,
    locked_profit: u128,
    last_report: u64,
    /// Release rate per second, scaled by `DEGRADATION_COEFFICIENT`.
    locked_profit_degradation: u128,
    emergency_shutdown: bool,
    registry: Registry,
    strategies: HashMap<String, StrategyEngine>,
    guard: CallGuard,
    now: u64,
}

impl Vault {
    pub fn new(tvl_cap: u128) -> Self {
        Self {
            total_shares: 0,
            balances: HashMap::new(),
            total_idle: 0,
            tvl_cap,
            locked_profit: 0,
            last_report: 0,
            locked_profit_degradation: DEFAULT_LOCKED_PROFIT_DEGRADATION,
            emergency_shutdown: false,
            registry: Registry::new(),
            strategies: HashMap::new(),
            guard: CallGuard::new(),
            now: 0,
        }
    }

    pub fn uncapped() -> Self {
        Self::new(NO_TVL_CAP)
    }

    // ── Read surface ────────────────────────────────────────────────

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn share_balance_of(&self, account: &str) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_idle(&self) -> u128 {
        self.total_idle
    }

    pub fn tvl_cap(&self) -> u128 {
        self.tvl_cap
    }

    pub fn is_shutdown(&self) -> bool {
        self.emergency_shutdown
    }

    /// Idle capital plus every strategy's last-reported balance.
    /// Push-based: strategies report at harvest, positions are never
    /// queried live here.
    pub fn total_assets(&self) -> u128 {
        self.total_idle + self.registry.total_allocated()
    }

    /// Profit still locked right now, after linear release since the
    /// last report.
    pub fn current_locked_profit(&self) -> u128 {
        let elapsed = (self.now - self.last_report) as u128;
        let degraded = elapsed.saturating_mul(self.locked_profit_degradation);
        if degraded >= DEGRADATION_COEFFICIENT {
            return 0;
        }
        let released = mul_div(
            self.locked_profit,
            degraded,
            DEGRADATION_COEFFICIENT,
            Rounding::Down,
        )
        .unwrap_or(self.locked_profit);
        self.locked_profit - released
    }

    /// Assets backing shares: total assets minus still-locked profit.
    pub fn free_funds(&self) -> u128 {
        self.total_assets().saturating_sub(self.current_locked_profit())
    }

    pub fn price_per_share(&self) -> f64 {
        if self.total_shares == 0 {
            1.0
        } else {
            self.free_funds() as f64 / self.total_shares as f64
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn strategy(&self, id: &str) -> Result<&StrategyEngine> {
        self.strategies
            .get(id)
            .ok_or_else(|| VaultError::UnknownStrategy(id.to_string()))
    }

    fn strategy_mut(&mut self, id: &str) -> Result<&mut StrategyEngine> {
        self.strategies
            .get_mut(id)
            .ok_or_else(|| VaultError::UnknownStrategy(id.to_string()))
    }

    // ── Share conversions and previews ──────────────────────────────

    pub fn convert_to_shares(&self, assets: u128) -> Result<u128> {
        if self.total_shares == 0 {
            return Ok(assets);
        }
        mul_div(assets, self.total_shares, self.free_funds(), Rounding::Down)
    }

    pub fn convert_to_assets(&self, shares: u128) -> Result<u128> {
        if self.total_shares == 0 {
            return Ok(shares);
        }
        mul_div(shares, self.free_funds(), self.total_shares, Rounding::Down)
    }

    /// Shares minted for a deposit of `assets`, rounded against the
    /// depositor.
    pub fn preview_deposit(&self, assets: u128) -> Result<u128> {
        self.convert_to_shares(assets)
    }

    /// Assets required to mint exactly `shares`, rounded against the
    /// minter.
    pub fn preview_mint(&self, shares: u128) -> Result<u128> {
        if self.total_shares == 0 {
            return Ok(shares);
        }
        mul_div(shares, self.free_funds(), self.total_shares, Rounding::Up)
    }

    /// Shares burned to withdraw exactly `assets`, rounded against the
    /// withdrawer. Zero while no shares exist.
    pub fn preview_withdraw(&self, assets: u128) -> Result<u128> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        mul_div(assets, self.total_shares, self.free_funds(), Rounding::Up)
    }

    /// Assets paid for burning `shares`, rounded against the redeemer.
    pub fn preview_redeem(&self, shares: u128) -> Result<u128> {
        self.convert_to_assets(shares)
    }

    /// Deposit headroom under the TVL cap; zero during shutdown.
    pub fn max_deposit(&self) -> u128 {
        if self.emergency_shutdown {
            return 0;
        }
        self.tvl_cap.saturating_sub(self.total_assets())
    }

    pub fn max_mint(&self) -> Result<u128> {
        self.convert_to_shares(self.max_deposit())
    }

    // ── User operations ─────────────────────────────────────────────

    /// Take `assets` into the idle reserve and mint shares at the
    /// current price. Capital is deployed later, at harvest.
    pub fn deposit(&mut self, caller: &Caller, assets: u128) -> Result<u128> {
        let _permit = self.guard.enter()?;
        if self.emergency_shutdown {
            return Err(VaultError::ShutdownActive);
        }
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if assets > self.max_deposit() {
            return Err(VaultError::CapExceeded {
                assets,
                cap: self.tvl_cap,
            });
        }
        let shares = self.preview_deposit(assets)?;
        if shares == 0 {
            return Err(VaultError::ZeroShares);
        }
        self.total_idle += assets;
        self.mint_shares(&caller.account, shares);
        Ok(shares)
    }

    /// Mint exactly `shares`, charging whatever assets that costs at
    /// the current price.
    pub fn mint(&mut self, caller: &Caller, shares: u128) -> Result<u128> {
        let _permit = self.guard.enter()?;
        if self.emergency_shutdown {
            return Err(VaultError::ShutdownActive);
        }
        if shares == 0 {
            return Err(VaultError::ZeroShares);
        }
        let assets = self.preview_mint(shares)?;
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if assets > self.max_deposit() {
            return Err(VaultError::CapExceeded {
                assets,
                cap: self.tvl_cap,
            });
        }
        self.total_idle += assets;
        self.mint_shares(&caller.account, shares);
        Ok(assets)
    }

    /// Withdraw `assets`. When idle liquidity is short, strategies are
    /// drained in withdrawal order; value that cannot be released right
    /// now stays booked and keeps backing the shares left unburned.
    /// Returns the assets actually paid out.
    pub fn withdraw(&mut self, caller: &Caller, assets: u128) -> Result<u128> {
        let _permit = self.guard.enter()?;
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let shares = self.preview_withdraw(assets)?;
        if shares == 0 {
            return Err(VaultError::ZeroShares);
        }
        self.pay_out(caller, shares, assets)
    }

    /// Burn exactly `shares` and pay out their current value.
    pub fn redeem(&mut self, caller: &Caller, shares: u128) -> Result<u128> {
        let _permit = self.guard.enter()?;
        self.redeem_inner(caller, shares)
    }

    /// Redeem the caller's entire share balance.
    pub fn redeem_all(&mut self, caller: &Caller) -> Result<u128> {
        let _permit = self.guard.enter()?;
        let shares = self.share_balance_of(&caller.account);
        self.redeem_inner(caller, shares)
    }

    fn redeem_inner(&mut self, caller: &Caller, shares: u128) -> Result<u128> {
        if shares == 0 {
            return Err(VaultError::ZeroShares);
        }
        let assets = self.preview_redeem(shares)?;
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.pay_out(caller, shares, assets)
    }

    /// Shared tail of withdraw and redeem: check the share balance,
    /// recall liquidity, burn, pay. Losses realized while pulling are
    /// charged to this withdrawal. A shortfall that is pure illiquidity
    /// is not: the caller is charged only for what was paid out, and the
    /// still-booked value backs the shares left standing.
    fn pay_out(&mut self, caller: &Caller, shares: u128, assets: u128) -> Result<u128> {
        let held = self.share_balance_of(&caller.account);
        if shares > held {
            return Err(VaultError::InsufficientShares {
                held,
                needed: shares,
            });
        }
        let realized_loss = self.recall_liquidity(assets)?;
        let payout = assets.min(self.total_idle);
        if payout == 0 {
            return Err(VaultError::LiquidityShortfall);
        }
        let burned = if payout + realized_loss >= assets {
            shares
        } else {
            self.preview_withdraw(payout + realized_loss)?.min(shares)
        };
        self.burn_shares(&caller.account, burned);
        self.total_idle -= payout;
        Ok(payout)
    }

    /// Drain strategies in withdrawal order until idle covers the
    /// requested amount or every source is exhausted. Each drained
    /// strategy is re-booked at its live balance. Returns the loss
    /// realized across the pulls, the part of each booked balance that
    /// neither came back nor remains in the strategy.
    fn recall_liquidity(&mut self, assets: u128) -> Result<u128> {
        let mut realized_loss = 0u128;
        if self.total_idle >= assets {
            return Ok(realized_loss);
        }
        for id in self.registry.strategies_in_withdrawal_order() {
            if self.total_idle >= assets {
                break;
            }
            let booked = self.registry.entry(&id)?.allocated;
            if booked == 0 {
                continue;
            }
            let need = assets - self.total_idle;
            let strat = self.strategy_mut(&id)?;
            let got = strat.withdraw(need.min(booked))?;
            let live = strat.balance();
            strat.mark_reported();
            self.total_idle += got;
            realized_loss += booked.saturating_sub(got + live);
            self.registry.entry_mut(&id)?.allocated = live;
        }
        Ok(realized_loss)
    }

    /// Credit assets to the pool without minting shares. Raises the
    /// price per share for existing holders.
    pub fn donate(&mut self, assets: u128) {
        self.total_idle += assets;
    }

    // ── Time ────────────────────────────────────────────────────────

    /// Advance the vault clock and every strategy's market by
    /// `dt_secs`. Locked profit releases against the new time.
    pub fn tick(&mut self, dt_secs: u64) {
        self.now += dt_secs;
        for strat in self.strategies.values_mut() {
            strat.tick(dt_secs);
        }
    }

    /// Collapse the pending release into `locked_profit` so later
    /// arithmetic starts from a clean baseline.
    fn fold_decay(&mut self) {
        self.locked_profit = self.current_locked_profit();
        self.last_report = self.now;
    }

    // ── Harvest and report ──────────────────────────────────────────

    /// Run one strategy's harvest cycle and fold the result into vault
    /// accounting: lock net profit for gradual release, absorb losses,
    /// then rebalance the strategy's capital toward its allocation
    /// target (zero during shutdown). Permissionless.
    pub fn harvest(&mut self, id: &str) -> Result<HarvestReport> {
        let _permit = self.guard.enter()?;
        let force_unwind = self.emergency_shutdown;
        let now = self.now;

        let outcome = self.strategy_mut(id)?.harvest(now, force_unwind)?;

        self.fold_decay();
        self.locked_profit += outcome.net_profit;
        self.locked_profit = self.locked_profit.saturating_sub(outcome.loss);

        // Book the live balance before computing the target so the
        // rebalance sees post-harvest numbers.
        let (live, emergency_exit) = {
            let strat = self.strategy(id)?;
            (strat.balance(), strat.emergency_exit())
        };
        self.registry.entry_mut(id)?.allocated = live;
        let (alloc_bps, active) = {
            let entry = self.registry.entry(id)?;
            (entry.alloc_bps, entry.active)
        };
        let target = if self.emergency_shutdown || !active || emergency_exit {
            0
        } else {
            bps_of(self.total_assets(), alloc_bps)
        };

        let mut credited = 0;
        let mut recalled = 0;
        if live > target {
            recalled = self.strategy_mut(id)?.withdraw(live - target)?;
            self.total_idle += recalled;
        } else if live < target {
            let strat = self
                .strategies
                .get_mut(id)
                .ok_or_else(|| VaultError::UnknownStrategy(id.to_string()))?;
            if !strat.is_paused() && !strat.emergency_exit() {
                credited = (target - live).min(self.total_idle);
                if credited > 0 {
                    self.total_idle -= credited;
                    strat.receive(credited);
                    strat.deposit()?;
                }
            }
        }

        let strat = self.strategy_mut(id)?;
        let booked = strat.balance();
        strat.mark_reported();
        self.registry.entry_mut(id)?.allocated = booked;

        Ok(HarvestReport {
            strategy_id: id.to_string(),
            outcome,
            credited,
            recalled,
        })
    }

    pub fn preview_harvest(&self, id: &str) -> Result<u128> {
        self.strategy(id)?.preview_harvest()
    }

    // ── Governance: vault parameters ────────────────────────────────

    pub fn activate_shutdown(&mut self, caller: &Caller) -> Result<()> {
        authorize(caller.role, Operation::ActivateShutdown)?;
        self.emergency_shutdown = true;
        Ok(())
    }

    pub fn lift_shutdown(&mut self, caller: &Caller) -> Result<()> {
        authorize(caller.role, Operation::LiftShutdown)?;
        self.emergency_shutdown = false;
        Ok(())
    }

    pub fn update_tvl_cap(&mut self, caller: &Caller, cap: u128) -> Result<()> {
        authorize(caller.role, Operation::UpdateTvlCap)?;
        self.tvl_cap = cap;
        Ok(())
    }

    pub fn remove_tvl_cap(&mut self, caller: &Caller) -> Result<()> {
        self.update_tvl_cap(caller, NO_TVL_CAP)
    }

    /// Change the release rate. The decay accrued so far is folded in
    /// first, so already-released profit stays released.
    pub fn set_locked_profit_degradation(&mut self, caller: &Caller, rate: u128) -> Result<()> {
        authorize(caller.role, Operation::SetLockedProfitDegradation)?;
        if rate > DEGRADATION_COEFFICIENT {
            return Err(VaultError::DegradationTooHigh(rate));
        }
        self.fold_decay();
        self.locked_profit_degradation = rate;
        Ok(())
    }

    // ── Governance: strategy lifecycle ──────────────────────────────

    pub fn add_strategy(
        &mut self,
        caller: &Caller,
        engine: StrategyEngine,
        alloc_bps: u16,
    ) -> Result<()> {
        authorize(caller.role, Operation::AddStrategy)?;
        if self.emergency_shutdown {
            return Err(VaultError::ShutdownActive);
        }
        let id = engine.id.clone();
        self.registry.add(&id, alloc_bps)?;
        self.strategies.insert(id, engine);
        Ok(())
    }

    pub fn update_strategy_alloc_bps(
        &mut self,
        caller: &Caller,
        id: &str,
        alloc_bps: u16,
    ) -> Result<()> {
        authorize(caller.role, Operation::UpdateStrategyAllocBps)?;
        self.registry.update_alloc_bps(id, alloc_bps)
    }

    /// Unwind the strategy, recall every recovered unit into idle, and
    /// zero its allocation. The entry stays registered but inactive.
    pub fn retire_strategy(&mut self, caller: &Caller, id: &str) -> Result<u128> {
        authorize(caller.role, Operation::RetireStrategy)?;
        let _permit = self.guard.enter()?;
        let recovered = self.strategy_mut(id)?.retire()?;
        self.total_idle += recovered;
        let entry = self.registry.entry_mut(id)?;
        entry.alloc_bps = 0;
        entry.active = false;
        entry.allocated = 0;
        Ok(recovered)
    }

    /// Retire and then drop the strategy entirely.
    pub fn revoke_strategy(&mut self, caller: &Caller, id: &str) -> Result<u128> {
        authorize(caller.role, Operation::RevokeStrategy)?;
        let recovered = {
            let _permit = self.guard.enter()?;
            let recovered = self.strategy_mut(id)?.retire()?;
            self.total_idle += recovered;
            recovered
        };
        self.registry.remove(id)?;
        self.strategies.remove(id);
        Ok(recovered)
    }

    pub fn set_withdrawal_order(&mut self, caller: &Caller, order: &[String]) -> Result<()> {
        authorize(caller.role, Operation::SetWithdrawalOrder)?;
        self.registry.set_withdrawal_order(order)
    }

    // ── Governance: strategy parameters ─────────────────────────────

    pub fn set_leverage_params(
        &mut self,
        caller: &Caller,
        id: &str,
        params: LeverageParams,
    ) -> Result<()> {
        authorize(caller.role, Operation::SetLeverageParams)?;
        self.strategy_mut(id)?.set_leverage_params(params)
    }

    pub fn set_fees(&mut self, caller: &Caller, id: &str, fees: FeeConfig) -> Result<()> {
        authorize(caller.role, Operation::SetFees)?;
        self.strategy_mut(id)?.set_fees(fees)
    }

    pub fn authorized_delever(
        &mut self,
        caller: &Caller,
        id: &str,
        amount: u128,
    ) -> Result<u128> {
        authorize(caller.role, Operation::AuthorizedDelever)?;
        let _permit = self.guard.enter()?;
        self.strategy_mut(id)?.authorized_delever(amount)
    }

    /// Emergency unwind of one strategy. Funds stay in the strategy's
    /// idle balance until the next harvest recalls them.
    pub fn panic_strategy(&mut self, caller: &Caller, id: &str) -> Result<()> {
        authorize(caller.role, Operation::Panic)?;
        let _permit = self.guard.enter()?;
        self.strategy_mut(id)?.panic()
    }

    pub fn pause_strategy(&mut self, caller: &Caller, id: &str) -> Result<()> {
        authorize(caller.role, Operation::PauseStrategy)?;
        self.strategy_mut(id)?.pause();
        Ok(())
    }

    pub fn unpause_strategy(&mut self, caller: &Caller, id: &str) -> Result<()> {
        authorize(caller.role, Operation::UnpauseStrategy)?;
        self.strategy_mut(id)?.unpause();
        Ok(())
    }

    // ── Governance: upgrades ────────────────────────────────────────

    pub fn initiate_upgrade_cooldown(&mut self, caller: &Caller, id: &str) -> Result<()> {
        authorize(caller.role, Operation::InitiateUpgradeCooldown)?;
        let now = self.now;
        self.strategy_mut(id)?.initiate_upgrade_cooldown(now)
    }

    pub fn clear_upgrade_cooldown(&mut self, caller: &Caller, id: &str) -> Result<()> {
        authorize(caller.role, Operation::ClearUpgradeCooldown)?;
        self.strategy_mut(id)?.clear_upgrade_cooldown();
        Ok(())
    }

    pub fn upgrade_strategy(&mut self, caller: &Caller, id: &str, version: u32) -> Result<u32> {
        authorize(caller.role, Operation::Upgrade)?;
        let now = self.now;
        self.strategy_mut(id)?.upgrade_to(version, now)
    }

    pub fn upgrade_state(&self, id: &str) -> Result<CooldownState> {
        Ok(self.strategy(id)?.upgrade_state(self.now))
    }

    // ── Share ledger ────────────────────────────────────────────────

    fn mint_shares(&mut self, account: &str, shares: u128) {
        *self.balances.entry(account.to_string()).or_insert(0) += shares;
        self.total_shares += shares;
    }

    fn burn_shares(&mut self, account: &str, shares: u128) {
        if let Some(held) = self.balances.get_mut(account) {
            *held -= shares;
            if *held == 0 {
                self.balances.remove(account);
            }
        }
        self.total_shares -= shares;
    }
}
