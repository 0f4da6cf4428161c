use crate::model::roles::Role;
use crate::model::scenario::{
    AccountConfig, Action, Scenario, StrategyConfig, TimedAction, VaultConfig,
};

/// Print an example scenario JSON to stdout.
pub fn run() -> anyhow::Result<()> {
    let scenario = Scenario {
        name: "Leveraged lending with a mid-run emergency".to_string(),
        description: Some(
            "Two depositors fund a capped vault with a single leveraged \
             lending strategy at 90% allocation. Daily harvests compound \
             rewards for a week, then the guardian panics the strategy, \
             the admin retires it, and both depositors exit."
                .to_string(),
        ),
        vault: VaultConfig {
            tvl_cap: Some(10_000_000),
            locked_profit_degradation: None,
        },
        strategies: vec![StrategyConfig {
            id: "geist_dai".into(),
            alloc_bps: 9_000,
            target_ltv_bps: 7_800,
            max_ltv_bps: 8_000,
            drift_bps: 40,
            step_size: 500_000,
            max_steps: 20,
            supply_rate_bps: 150,
            borrow_rate_bps: 250,
            reward_rate_bps: 900,
            swap_slippage_bps: 30,
        }],
        accounts: vec![
            AccountConfig {
                account: "alice".into(),
                role: Role::Unassigned,
            },
            AccountConfig {
                account: "bob".into(),
                role: Role::Unassigned,
            },
            AccountConfig {
                account: "keeper".into(),
                role: Role::Unassigned,
            },
            AccountConfig {
                account: "guardian".into(),
                role: Role::Guardian,
            },
            AccountConfig {
                account: "admin".into(),
                role: Role::Admin,
            },
        ],
        actions: vec![
            TimedAction {
                at_secs: 0,
                action: Action::Deposit {
                    account: "alice".into(),
                    assets: 1_000_000,
                },
            },
            TimedAction {
                at_secs: 3_600,
                action: Action::Deposit {
                    account: "bob".into(),
                    assets: 500_000,
                },
            },
            TimedAction {
                at_secs: 3_600,
                action: Action::Harvest {
                    account: "keeper".into(),
                    strategy: "geist_dai".into(),
                },
            },
            TimedAction {
                at_secs: 86_400,
                action: Action::Harvest {
                    account: "keeper".into(),
                    strategy: "geist_dai".into(),
                },
            },
            TimedAction {
                at_secs: 172_800,
                action: Action::Harvest {
                    account: "keeper".into(),
                    strategy: "geist_dai".into(),
                },
            },
            TimedAction {
                at_secs: 259_200,
                action: Action::PanicStrategy {
                    account: "guardian".into(),
                    strategy: "geist_dai".into(),
                },
            },
            TimedAction {
                at_secs: 262_800,
                action: Action::RetireStrategy {
                    account: "admin".into(),
                    strategy: "geist_dai".into(),
                },
            },
            TimedAction {
                at_secs: 345_600,
                action: Action::RedeemAll {
                    account: "alice".into(),
                },
            },
            TimedAction {
                at_secs: 345_600,
                action: Action::RedeemAll {
                    account: "bob".into(),
                },
            },
        ],
        horizon_secs: 345_600,
        tick_secs: 3_600,
    };

    let json = serde_json::to_string_pretty(&scenario)?;
    println!("{json}");
    Ok(())
}
