//! Scenario definitions: a vault configuration, a set of simulated
//! strategies, named accounts with role assignments, and a timeline of
//! actions to replay deterministically.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::amount::{BPS_DENOMINATOR, DEGRADATION_COEFFICIENT};
use super::roles::Role;

/// A named scenario replayed tick by tick against a fresh vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scenario {
    /// Human-readable name for this scenario.
    pub name: String,
    /// Optional description of what the scenario demonstrates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub vault: VaultConfig,
    pub strategies: Vec<StrategyConfig>,
    /// Accounts that may appear in actions, with their role tier.
    pub accounts: Vec<AccountConfig>,
    /// Timeline of actions, ordered by `at_secs`.
    pub actions: Vec<TimedAction>,
    /// Simulation end time in seconds from scenario start.
    pub horizon_secs: u64,
    /// Interval between accrual ticks; action times are merged in.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

fn default_tick_secs() -> u64 {
    3_600
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VaultConfig {
    /// Deposit ceiling on total assets. Absent means uncapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvl_cap: Option<u128>,
    /// Locked-profit release rate per second, scaled by 1e18.
    /// Absent means the six-hour default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_profit_degradation: Option<u128>,
}

/// One simulated leveraged lending strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StrategyConfig {
    pub id: String,
    /// Share of total assets this strategy targets, in basis points.
    pub alloc_bps: u16,
    pub target_ltv_bps: u16,
    pub max_ltv_bps: u16,
    #[serde(default = "default_drift_bps")]
    pub drift_bps: u16,
    /// Largest single borrow or repay step.
    pub step_size: u128,
    /// Step budget per rebalance call.
    pub max_steps: u32,
    /// Annualized rates driving the simulated market, in basis points.
    #[serde(default)]
    pub supply_rate_bps: u16,
    #[serde(default)]
    pub borrow_rate_bps: u16,
    #[serde(default)]
    pub reward_rate_bps: u16,
    /// Slippage applied when swapping claimed rewards to the
    /// underlying.
    #[serde(default)]
    pub swap_slippage_bps: u16,
}

fn default_drift_bps() -> u16 {
    40
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccountConfig {
    pub account: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimedAction {
    /// Seconds from scenario start.
    pub at_secs: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// Everything a scenario can do to the vault. Role-gated actions carry
/// the account whose role is checked at replay time; a rejection is a
/// scenario outcome, not a replay failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Deposit { account: String, assets: u128 },
    Mint { account: String, shares: u128 },
    Withdraw { account: String, assets: u128 },
    Redeem { account: String, shares: u128 },
    RedeemAll { account: String },
    Harvest { account: String, strategy: String },
    Donate { assets: u128 },
    ActivateShutdown { account: String },
    LiftShutdown { account: String },
    UpdateTvlCap { account: String, cap: u128 },
    RemoveTvlCap { account: String },
    SetLockedProfitDegradation { account: String, rate: u128 },
    UpdateAllocBps { account: String, strategy: String, alloc_bps: u16 },
    SetWithdrawalOrder { account: String, order: Vec<String> },
    PauseStrategy { account: String, strategy: String },
    UnpauseStrategy { account: String, strategy: String },
    PanicStrategy { account: String, strategy: String },
    AuthorizedDelever { account: String, strategy: String, amount: u128 },
    RetireStrategy { account: String, strategy: String },
    RevokeStrategy { account: String, strategy: String },
    InitiateUpgradeCooldown { account: String, strategy: String },
    ClearUpgradeCooldown { account: String, strategy: String },
    Upgrade { account: String, strategy: String, version: u32 },
}

impl Action {
    /// The account performing this action, if it names one.
    pub fn account(&self) -> Option<&str> {
        use Action::*;
        match self {
            Deposit { account, .. }
            | Mint { account, .. }
            | Withdraw { account, .. }
            | Redeem { account, .. }
            | RedeemAll { account }
            | Harvest { account, .. }
            | ActivateShutdown { account }
            | LiftShutdown { account }
            | UpdateTvlCap { account, .. }
            | RemoveTvlCap { account }
            | SetLockedProfitDegradation { account, .. }
            | UpdateAllocBps { account, .. }
            | SetWithdrawalOrder { account, .. }
            | PauseStrategy { account, .. }
            | UnpauseStrategy { account, .. }
            | PanicStrategy { account, .. }
            | AuthorizedDelever { account, .. }
            | RetireStrategy { account, .. }
            | RevokeStrategy { account, .. }
            | InitiateUpgradeCooldown { account, .. }
            | ClearUpgradeCooldown { account, .. }
            | Upgrade { account, .. } => Some(account),
            Donate { .. } => None,
        }
    }

    /// The strategy this action targets, if any.
    pub fn strategy(&self) -> Option<&str> {
        use Action::*;
        match self {
            Harvest { strategy, .. }
            | UpdateAllocBps { strategy, .. }
            | PauseStrategy { strategy, .. }
            | UnpauseStrategy { strategy, .. }
            | PanicStrategy { strategy, .. }
            | AuthorizedDelever { strategy, .. }
            | RetireStrategy { strategy, .. }
            | RevokeStrategy { strategy, .. }
            | InitiateUpgradeCooldown { strategy, .. }
            | ClearUpgradeCooldown { strategy, .. }
            | Upgrade { strategy, .. } => Some(strategy),
            _ => None,
        }
    }
}

// ── Validation ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate strategy id `{id}`")]
    DuplicateStrategyId { id: String },

    #[error("Duplicate account `{account}`")]
    DuplicateAccount { account: String },

    #[error("Allocation weights sum to {total_bps} BPS (max 10000)")]
    AllocationOverflow { total_bps: u32 },

    #[error("Strategy `{id}` has target LTV {target_bps} and max LTV {max_bps}; need target < max <= 10000")]
    InvalidLtvBounds {
        id: String,
        target_bps: u16,
        max_bps: u16,
    },

    #[error("Strategy `{id}` has zero step_size")]
    ZeroStepSize { id: String },

    #[error("Locked-profit degradation {rate} exceeds the 1e18 coefficient")]
    DegradationTooHigh { rate: u128 },

    #[error("Action at t={at_secs} references unknown account `{account}`")]
    UnknownAccount { at_secs: u64, account: String },

    #[error("Action at t={at_secs} references unknown strategy `{strategy}`")]
    UnknownStrategyRef { at_secs: u64, strategy: String },

    #[error("Action at t={at_secs} is past the horizon of {horizon_secs}")]
    ActionPastHorizon { at_secs: u64, horizon_secs: u64 },

    #[error("Actions are not sorted by time (t={at_secs} after t={previous})")]
    ActionsOutOfOrder { at_secs: u64, previous: u64 },

    #[error("tick_secs must be non-zero")]
    ZeroTick,
}

/// Load and fully validate a scenario from a JSON file.
pub fn load_and_validate(path: &Path) -> Result<Scenario, Vec<ScenarioError>> {
    let contents = std::fs::read_to_string(path).map_err(|e| vec![ScenarioError::Io(e)])?;
    let scenario: Scenario =
        serde_json::from_str(&contents).map_err(|e| vec![ScenarioError::Json(e)])?;
    validate(&scenario)?;
    Ok(scenario)
}

/// Validate a scenario, collecting all errors.
pub fn validate(scenario: &Scenario) -> Result<(), Vec<ScenarioError>> {
    let mut errors = Vec::new();

    if scenario.tick_secs == 0 {
        errors.push(ScenarioError::ZeroTick);
    }

    let mut ids: Vec<&str> = Vec::new();
    for s in &scenario.strategies {
        if ids.contains(&s.id.as_str()) {
            errors.push(ScenarioError::DuplicateStrategyId { id: s.id.clone() });
        } else {
            ids.push(&s.id);
        }
        if s.target_ltv_bps >= s.max_ltv_bps || s.max_ltv_bps > BPS_DENOMINATOR as u16 {
            errors.push(ScenarioError::InvalidLtvBounds {
                id: s.id.clone(),
                target_bps: s.target_ltv_bps,
                max_bps: s.max_ltv_bps,
            });
        }
        if s.step_size == 0 {
            errors.push(ScenarioError::ZeroStepSize { id: s.id.clone() });
        }
    }

    let total_bps: u32 = scenario.strategies.iter().map(|s| s.alloc_bps as u32).sum();
    if total_bps > BPS_DENOMINATOR as u32 {
        errors.push(ScenarioError::AllocationOverflow { total_bps });
    }

    if let Some(rate) = scenario.vault.locked_profit_degradation {
        if rate > DEGRADATION_COEFFICIENT {
            errors.push(ScenarioError::DegradationTooHigh { rate });
        }
    }

    let mut accounts: Vec<&str> = Vec::new();
    for a in &scenario.accounts {
        if accounts.contains(&a.account.as_str()) {
            errors.push(ScenarioError::DuplicateAccount {
                account: a.account.clone(),
            });
        } else {
            accounts.push(&a.account);
        }
    }

    let mut previous = 0u64;
    for timed in &scenario.actions {
        if timed.at_secs < previous {
            errors.push(ScenarioError::ActionsOutOfOrder {
                at_secs: timed.at_secs,
                previous,
            });
        }
        previous = previous.max(timed.at_secs);
        if timed.at_secs > scenario.horizon_secs {
            errors.push(ScenarioError::ActionPastHorizon {
                at_secs: timed.at_secs,
                horizon_secs: scenario.horizon_secs,
            });
        }
        if let Some(account) = timed.action.account() {
            if !accounts.contains(&account) {
                errors.push(ScenarioError::UnknownAccount {
                    at_secs: timed.at_secs,
                    account: account.to_string(),
                });
            }
        }
        if let Some(strategy) = timed.action.strategy() {
            if !ids.contains(&strategy) {
                errors.push(ScenarioError::UnknownStrategyRef {
                    at_secs: timed.at_secs,
                    strategy: strategy.to_string(),
                });
            }
        }
        if let Action::SetWithdrawalOrder { order, .. } = &timed.action {
            for strategy in order {
                if !ids.contains(&strategy.as_str()) {
                    errors.push(ScenarioError::UnknownStrategyRef {
                        at_secs: timed.at_secs,
                        strategy: strategy.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// CLI entry point for the `validate` subcommand.
pub fn run(path: &Path) -> anyhow::Result<()> {
    match load_and_validate(path) {
        Ok(s) => {
            println!(
                "Scenario '{}' is valid. {} strategies, {} actions, horizon {}s.",
                s.name,
                s.strategies.len(),
                s.actions.len(),
                s.horizon_secs,
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, e);
            }
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Scenario {
        Scenario {
            name: "t".into(),
            description: None,
            vault: VaultConfig {
                tvl_cap: None,
                locked_profit_degradation: None,
            },
            strategies: vec![StrategyConfig {
                id: "geist".into(),
                alloc_bps: 9_000,
                target_ltv_bps: 7_800,
                max_ltv_bps: 8_000,
                drift_bps: 40,
                step_size: 1_000_000,
                max_steps: 20,
                supply_rate_bps: 0,
                borrow_rate_bps: 0,
                reward_rate_bps: 500,
                swap_slippage_bps: 0,
            }],
            accounts: vec![AccountConfig {
                account: "alice".into(),
                role: Role::Unassigned,
            }],
            actions: vec![TimedAction {
                at_secs: 0,
                action: Action::Deposit {
                    account: "alice".into(),
                    assets: 1_000,
                },
            }],
            horizon_secs: 86_400,
            tick_secs: 3_600,
        }
    }

    #[test]
    fn minimal_scenario_is_valid() {
        assert!(validate(&minimal()).is_ok());
    }

    #[test]
    fn unknown_account_and_strategy_are_both_reported() {
        let mut s = minimal();
        s.actions.push(TimedAction {
            at_secs: 10,
            action: Action::Harvest {
                account: "mallory".into(),
                strategy: "nope".into(),
            },
        });
        let errors = validate(&s).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn overweight_allocations_rejected() {
        let mut s = minimal();
        let mut extra = s.strategies[0].clone();
        extra.id = "second".into();
        extra.alloc_bps = 2_000;
        s.strategies.push(extra);
        let errors = validate(&s).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ScenarioError::AllocationOverflow { total_bps: 11_000 }))
        );
    }

    #[test]
    fn out_of_order_actions_rejected() {
        let mut s = minimal();
        s.actions.insert(
            0,
            TimedAction {
                at_secs: 500,
                action: Action::Donate { assets: 1 },
            },
        );
        let errors = validate(&s).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ScenarioError::ActionsOutOfOrder { .. }))
        );
    }

    #[test]
    fn action_round_trips_through_json() {
        let action = TimedAction {
            at_secs: 60,
            action: Action::Harvest {
                account: "keeper".into(),
                strategy: "geist".into(),
            },
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"kind\":\"harvest\""));
        let back: TimedAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
