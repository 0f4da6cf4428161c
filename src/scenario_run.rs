//! Scenario replay: build a vault from a scenario file, drive it tick
//! by tick through the action timeline, and report a summary.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

use crate::engine::Vault;
use crate::engine::clock::SimClock;
use crate::market::sim::{SimLendingMarket, SimSwapRouter};
use crate::model::amount::NO_TVL_CAP;
use crate::model::roles::{Caller, Role};
use crate::model::scenario::{self, Action, Scenario};
use crate::strategy::{LeverageParams, StrategyEngine};

pub struct SimulateConfig {
    pub scenario_path: PathBuf,
    pub verbose: bool,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct StrategySummary {
    pub id: String,
    pub allocated: u128,
    pub ltv_bps: u16,
    pub harvests: usize,
    pub treasury_fees: u128,
    pub strategist_fees: u128,
}

#[derive(Debug, Serialize)]
pub struct HolderSummary {
    pub account: String,
    pub shares: u128,
    pub redeemable: u128,
}

#[derive(Debug, Serialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub final_timestamp: u64,
    pub total_assets: u128,
    pub total_idle: u128,
    pub total_shares: u128,
    pub price_per_share: f64,
    pub locked_profit: u128,
    pub shutdown: bool,
    pub actions_applied: u64,
    pub actions_rejected: u64,
    pub strategies: Vec<StrategySummary>,
    pub holders: Vec<HolderSummary>,
}

/// CLI entry point for the `simulate` subcommand.
pub fn run(config: &SimulateConfig) -> anyhow::Result<()> {
    let scenario = match scenario::load_and_validate(&config.scenario_path) {
        Ok(s) => s,
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, e);
            }
            std::process::exit(1);
        }
    };

    let summary = replay(&scenario, config.verbose)?;
    println!(
        "[done] t={} assets={} idle={} shares={} pps={:.6} locked={}",
        summary.final_timestamp,
        summary.total_assets,
        summary.total_idle,
        summary.total_shares,
        summary.price_per_share,
        summary.locked_profit,
    );
    for s in &summary.strategies {
        println!(
            "[strategy {}] allocated={} ltv={}bps harvests={} fees={}+{}",
            s.id, s.allocated, s.ltv_bps, s.harvests, s.treasury_fees, s.strategist_fees,
        );
    }

    if let Some(path) = &config.output {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing summary to {}", path.display()))?;
        println!("[done] summary written to {}", path.display());
    }

    Ok(())
}

/// Replay a validated scenario against a fresh vault and return the
/// final summary.
pub fn replay(scenario: &Scenario, verbose: bool) -> anyhow::Result<ScenarioSummary> {
    let mut vault = build_vault(scenario)?;
    let callers = build_callers(scenario);

    let action_times: Vec<u64> = scenario.actions.iter().map(|a| a.at_secs).collect();
    let mut clock = SimClock::uniform_with(
        0,
        scenario.horizon_secs,
        scenario.tick_secs,
        &action_times,
    );

    if verbose {
        println!(
            "Replaying '{}': {} strategies, {} actions, horizon {}s",
            scenario.name,
            scenario.strategies.len(),
            scenario.actions.len(),
            scenario.horizon_secs,
        );
    }

    let mut next_action = 0usize;
    let mut applied = 0u64;
    let mut rejected = 0u64;
    loop {
        let now = clock.current_timestamp();
        while next_action < scenario.actions.len()
            && scenario.actions[next_action].at_secs <= now
        {
            let timed = &scenario.actions[next_action];
            next_action += 1;
            match apply(&mut vault, &callers, &timed.action) {
                Ok(description) => {
                    applied += 1;
                    println!("[t {now:>8}] {description}");
                }
                Err(e) => {
                    rejected += 1;
                    println!("[t {now:>8}] rejected: {e}");
                }
            }
        }

        if verbose && clock.tick_index() % 100 == 0 {
            println!(
                "[tick {:>6}/{:>6}] assets = {}, pps = {:.6}",
                clock.tick_index(),
                clock.total_ticks(),
                vault.total_assets(),
                vault.price_per_share(),
            );
        }

        if !clock.advance() {
            break;
        }
        vault.tick(clock.dt_seconds());
    }

    Ok(summarize(scenario, &vault, applied, rejected))
}

fn build_vault(scenario: &Scenario) -> anyhow::Result<Vault> {
    let bootstrap = Caller::new("scenario", Role::SuperAdmin);
    let mut vault = Vault::new(scenario.vault.tvl_cap.unwrap_or(NO_TVL_CAP));
    if let Some(rate) = scenario.vault.locked_profit_degradation {
        vault.set_locked_profit_degradation(&bootstrap, rate)?;
    }
    for s in &scenario.strategies {
        let market = SimLendingMarket::new(s.supply_rate_bps, s.borrow_rate_bps, s.reward_rate_bps);
        let router = SimSwapRouter::new(1, 1, s.swap_slippage_bps);
        let engine = StrategyEngine::new(
            s.id.clone(),
            Box::new(market),
            Box::new(router),
            LeverageParams {
                target_ltv_bps: s.target_ltv_bps,
                max_ltv_bps: s.max_ltv_bps,
                drift_bps: s.drift_bps,
                step_size: s.step_size,
                max_steps: s.max_steps,
            },
            vec!["REWARD".into(), "WANT".into()],
        )?;
        vault.add_strategy(&bootstrap, engine, s.alloc_bps)?;
    }
    Ok(vault)
}

fn build_callers(scenario: &Scenario) -> HashMap<String, Caller> {
    scenario
        .accounts
        .iter()
        .map(|a| (a.account.clone(), Caller::new(a.account.clone(), a.role)))
        .collect()
}

fn caller<'a>(callers: &'a HashMap<String, Caller>, account: &str) -> anyhow::Result<&'a Caller> {
    callers
        .get(account)
        .with_context(|| format!("account `{account}` not declared in scenario"))
}

/// Apply one action, returning a log line for the replay transcript.
/// Vault-level rejections bubble up as errors; the caller counts them
/// and keeps replaying.
fn apply(
    vault: &mut Vault,
    callers: &HashMap<String, Caller>,
    action: &Action,
) -> anyhow::Result<String> {
    match action {
        Action::Deposit { account, assets } => {
            let shares = vault.deposit(caller(callers, account)?, *assets)?;
            Ok(format!("deposit {account} {assets} -> {shares} shares"))
        }
        Action::Mint { account, shares } => {
            let assets = vault.mint(caller(callers, account)?, *shares)?;
            Ok(format!("mint {account} {shares} shares <- {assets}"))
        }
        Action::Withdraw { account, assets } => {
            let paid = vault.withdraw(caller(callers, account)?, *assets)?;
            Ok(format!("withdraw {account} {assets} -> paid {paid}"))
        }
        Action::Redeem { account, shares } => {
            let paid = vault.redeem(caller(callers, account)?, *shares)?;
            Ok(format!("redeem {account} {shares} shares -> paid {paid}"))
        }
        Action::RedeemAll { account } => {
            let paid = vault.redeem_all(caller(callers, account)?)?;
            Ok(format!("redeem_all {account} -> paid {paid}"))
        }
        Action::Harvest { account, strategy } => {
            let report = vault.harvest(strategy)?;
            Ok(format!(
                "harvest {strategy} by {account}: profit={} loss={} caller_fee={} credited={} recalled={}",
                report.outcome.net_profit,
                report.outcome.loss,
                report.outcome.caller_fee,
                report.credited,
                report.recalled,
            ))
        }
        Action::Donate { assets } => {
            vault.donate(*assets);
            Ok(format!("donate {assets}"))
        }
        Action::ActivateShutdown { account } => {
            vault.activate_shutdown(caller(callers, account)?)?;
            Ok(format!("shutdown activated by {account}"))
        }
        Action::LiftShutdown { account } => {
            vault.lift_shutdown(caller(callers, account)?)?;
            Ok(format!("shutdown lifted by {account}"))
        }
        Action::UpdateTvlCap { account, cap } => {
            vault.update_tvl_cap(caller(callers, account)?, *cap)?;
            Ok(format!("tvl cap set to {cap}"))
        }
        Action::RemoveTvlCap { account } => {
            vault.remove_tvl_cap(caller(callers, account)?)?;
            Ok("tvl cap removed".to_string())
        }
        Action::SetLockedProfitDegradation { account, rate } => {
            vault.set_locked_profit_degradation(caller(callers, account)?, *rate)?;
            Ok(format!("locked-profit degradation set to {rate}"))
        }
        Action::UpdateAllocBps {
            account,
            strategy,
            alloc_bps,
        } => {
            vault.update_strategy_alloc_bps(caller(callers, account)?, strategy, *alloc_bps)?;
            Ok(format!("allocation of {strategy} set to {alloc_bps} BPS"))
        }
        Action::SetWithdrawalOrder { account, order } => {
            vault.set_withdrawal_order(caller(callers, account)?, order)?;
            Ok(format!("withdrawal order set to {order:?}"))
        }
        Action::PauseStrategy { account, strategy } => {
            vault.pause_strategy(caller(callers, account)?, strategy)?;
            Ok(format!("{strategy} paused"))
        }
        Action::UnpauseStrategy { account, strategy } => {
            vault.unpause_strategy(caller(callers, account)?, strategy)?;
            Ok(format!("{strategy} unpaused"))
        }
        Action::PanicStrategy { account, strategy } => {
            vault.panic_strategy(caller(callers, account)?, strategy)?;
            Ok(format!("{strategy} panicked, position unwound"))
        }
        Action::AuthorizedDelever {
            account,
            strategy,
            amount,
        } => {
            let repaid = vault.authorized_delever(caller(callers, account)?, strategy, *amount)?;
            Ok(format!("{strategy} delevered, {repaid} debt repaid"))
        }
        Action::RetireStrategy { account, strategy } => {
            let recovered = vault.retire_strategy(caller(callers, account)?, strategy)?;
            Ok(format!("{strategy} retired, {recovered} recalled"))
        }
        Action::RevokeStrategy { account, strategy } => {
            let recovered = vault.revoke_strategy(caller(callers, account)?, strategy)?;
            Ok(format!("{strategy} revoked, {recovered} recalled"))
        }
        Action::InitiateUpgradeCooldown { account, strategy } => {
            vault.initiate_upgrade_cooldown(caller(callers, account)?, strategy)?;
            Ok(format!("upgrade cooldown started for {strategy}"))
        }
        Action::ClearUpgradeCooldown { account, strategy } => {
            vault.clear_upgrade_cooldown(caller(callers, account)?, strategy)?;
            Ok(format!("upgrade cooldown cleared for {strategy}"))
        }
        Action::Upgrade {
            account,
            strategy,
            version,
        } => {
            let v = vault.upgrade_strategy(caller(callers, account)?, strategy, *version)?;
            Ok(format!("{strategy} upgraded to v{v}"))
        }
    }
}

fn summarize(
    scenario: &Scenario,
    vault: &Vault,
    applied: u64,
    rejected: u64,
) -> ScenarioSummary {
    let strategies = scenario
        .strategies
        .iter()
        .filter_map(|s| {
            let engine = vault.strategy(&s.id).ok()?;
            let allocated = vault
                .registry()
                .entry(&s.id)
                .map(|e| e.allocated)
                .unwrap_or(0);
            Some(StrategySummary {
                id: s.id.clone(),
                allocated,
                ltv_bps: engine.calculate_ltv(),
                harvests: engine.harvest_count(),
                treasury_fees: engine.treasury_collected(),
                strategist_fees: engine.strategist_collected(),
            })
        })
        .collect();

    let holders = scenario
        .accounts
        .iter()
        .filter(|a| vault.share_balance_of(&a.account) > 0)
        .map(|a| {
            let shares = vault.share_balance_of(&a.account);
            HolderSummary {
                account: a.account.clone(),
                shares,
                redeemable: vault.preview_redeem(shares).unwrap_or(0),
            }
        })
        .collect();

    ScenarioSummary {
        name: scenario.name.clone(),
        final_timestamp: vault.now(),
        total_assets: vault.total_assets(),
        total_idle: vault.total_idle(),
        total_shares: vault.total_shares(),
        price_per_share: vault.price_per_share(),
        locked_profit: vault.current_locked_profit(),
        shutdown: vault.is_shutdown(),
        actions_applied: applied,
        actions_rejected: rejected,
        strategies,
        holders,
    }
}
