//! Harvest pipeline: claim rewards, swap to the underlying, split
//! fees, compound what remains, and report the outcome.

use crate::error::{Result, VaultError};
use crate::model::amount::bps_of;
use crate::strategy::apr::HarvestSample;
use crate::strategy::{StrategyEngine, StrategyState};

/// Result of one harvest, consumed by the vault's report step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestOutcome {
    /// Fee owed to whoever triggered the harvest.
    pub caller_fee: u128,
    pub treasury_fee: u128,
    pub strategist_fee: u128,
    /// Balance gain since the last report, before fees.
    pub gross_profit: u128,
    /// Gross profit minus the total fee.
    pub net_profit: u128,
    /// Balance shortfall since the last report; exclusive with profit.
    pub loss: u128,
    /// Strategy balance after the harvest completed.
    pub balance: u128,
}

impl StrategyEngine {
    /// Run the full harvest cycle. With `force_unwind` (emergency
    /// shutdown) or after a panic, the compounding step is replaced by
    /// a full deleverage so the vault can recall everything.
    pub fn harvest(&mut self, now: u64, force_unwind: bool) -> Result<HarvestOutcome> {
        if self.retired {
            return Err(VaultError::StrategyRetired(self.id.clone()));
        }
        let balance_before = self.balance();

        let rewards = self.market.claim_rewards();
        if rewards > 0 {
            self.want_idle += self.router.swap_exact_in(&self.reward_path, rewards, 0)?;
        }

        let balance = self.balance();
        let (gross_profit, loss) = if balance >= self.last_reported_balance {
            (balance - self.last_reported_balance, 0)
        } else {
            (0, self.last_reported_balance - balance)
        };

        // Fees are only ever taken out of liquid profit; unrealized
        // collateral gains are not skimmed.
        let fee_base = gross_profit.min(self.want_idle);
        let total_fee = bps_of(fee_base, self.fees.total_fee_bps);
        let caller_fee = bps_of(total_fee, self.fees.caller_share_bps);
        let treasury_fee = bps_of(total_fee, self.fees.treasury_share_bps);
        let strategist_fee = total_fee - caller_fee - treasury_fee;
        self.want_idle -= total_fee;
        self.treasury_collected += treasury_fee;
        self.strategist_collected += strategist_fee;

        if force_unwind || self.emergency_exit {
            self.full_unwind()?;
            self.state = StrategyState::EmergencyUnwound;
        } else {
            self.deploy_idle()?;
        }

        let net_profit = gross_profit - total_fee;
        let elapsed_secs = self
            .last_harvest_at
            .map(|t| now.saturating_sub(t))
            .unwrap_or(0);
        self.harvest_log.push(HarvestSample {
            timestamp: now,
            profit: net_profit,
            balance_before,
            elapsed_secs,
        });
        self.last_harvest_at = Some(now);

        Ok(HarvestOutcome {
            caller_fee,
            treasury_fee,
            strategist_fee,
            gross_profit,
            net_profit,
            loss,
            balance: self.balance(),
        })
    }

    /// Estimate the caller fee a harvest would pay right now, without
    /// touching any state. Mirrors the fee math of `harvest`, with the
    /// pending reward swap priced through the router's quote.
    pub fn preview_harvest(&self) -> Result<u128> {
        let rewards = self.market.claimable_rewards();
        let swap_out = if rewards > 0 {
            self.router.quote_exact_in(&self.reward_path, rewards)?
        } else {
            0
        };
        let projected_balance = self.balance() + swap_out;
        let gross = projected_balance.saturating_sub(self.last_reported_balance);
        let fee_base = gross.min(self.want_idle + swap_out);
        let total_fee = bps_of(fee_base, self.fees.total_fee_bps);
        Ok(bps_of(total_fee, self.fees.caller_share_bps))
    }
}
