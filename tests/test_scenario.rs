//! End-to-end scenario replays through the library surface the
//! `simulate` subcommand uses.

use levervault::model::roles::Role;
use levervault::model::scenario::{
    AccountConfig, Action, Scenario, StrategyConfig, TimedAction, VaultConfig,
};
use levervault::scenario_run::replay;

const HOUR: u64 = 3_600;
const DAY: u64 = 86_400;

fn geist(alloc_bps: u16, reward_rate_bps: u16) -> StrategyConfig {
    StrategyConfig {
        id: "geist".into(),
        alloc_bps,
        target_ltv_bps: 7_800,
        max_ltv_bps: 8_000,
        drift_bps: 40,
        step_size: 1_000_000_000,
        max_steps: 100,
        supply_rate_bps: 0,
        borrow_rate_bps: 0,
        reward_rate_bps,
        swap_slippage_bps: 0,
    }
}

fn accounts() -> Vec<AccountConfig> {
    vec![
        AccountConfig {
            account: "alice".into(),
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
    ]
}

fn harvest_at(at_secs: u64) -> TimedAction {
    TimedAction {
        at_secs,
        action: Action::Harvest {
            account: "keeper".into(),
            strategy: "geist".into(),
        },
    }
}

fn scenario(
    name: &str,
    strategies: Vec<StrategyConfig>,
    actions: Vec<TimedAction>,
    horizon_secs: u64,
) -> Scenario {
    Scenario {
        name: name.into(),
        description: None,
        vault: VaultConfig {
            tvl_cap: None,
            locked_profit_degradation: None,
        },
        strategies,
        accounts: accounts(),
        actions,
        horizon_secs,
        tick_secs: HOUR,
    }
}

#[test]
fn profit_is_fully_released_by_the_horizon() {
    let s = scenario(
        "deposit, harvest, decay",
        vec![geist(10_000, 1_000)],
        vec![
            TimedAction {
                at_secs: 0,
                action: Action::Deposit {
                    account: "alice".into(),
                    assets: 1_000_000,
                },
            },
            harvest_at(0),
            harvest_at(DAY),
        ],
        // Horizon leaves more than six hours after the last harvest.
        2 * DAY,
    );

    let summary = replay(&s, false).unwrap();
    assert_eq!(summary.actions_applied, 3);
    assert_eq!(summary.actions_rejected, 0);
    assert!(summary.total_assets > 1_000_000, "rewards must compound");
    assert_eq!(summary.locked_profit, 0);
    assert!(summary.price_per_share > 1.0);
    assert_eq!(summary.strategies[0].harvests, 2);
    assert!(summary.strategies[0].treasury_fees > 0);
}

#[test]
fn capital_splits_between_idle_and_strategy_by_allocation() {
    let s = scenario(
        "90/10 split",
        vec![geist(9_000, 0)],
        vec![
            TimedAction {
                at_secs: 0,
                action: Action::Deposit {
                    account: "alice".into(),
                    assets: 1_000,
                },
            },
            harvest_at(0),
        ],
        HOUR,
    );

    let summary = replay(&s, false).unwrap();
    assert_eq!(summary.total_idle, 100);
    assert_eq!(summary.strategies[0].allocated, 900);
    assert_eq!(summary.total_assets, 1_000);
    assert!(summary.strategies[0].ltv_bps <= 7_800);
    assert_eq!(summary.holders.len(), 1);
    assert_eq!(summary.holders[0].shares, 1_000);
}

#[test]
fn shutdown_harvest_recalls_everything_to_idle() {
    let s = scenario(
        "shutdown drains the strategy",
        vec![geist(9_000, 0)],
        vec![
            TimedAction {
                at_secs: 0,
                action: Action::Deposit {
                    account: "alice".into(),
                    assets: 1_000,
                },
            },
            harvest_at(0),
            TimedAction {
                at_secs: HOUR,
                action: Action::ActivateShutdown {
                    account: "guardian".into(),
                },
            },
            harvest_at(2 * HOUR),
        ],
        3 * HOUR,
    );

    let summary = replay(&s, false).unwrap();
    assert!(summary.shutdown);
    assert_eq!(summary.total_idle, 1_000);
    assert_eq!(summary.strategies[0].allocated, 0);
    assert_eq!(summary.strategies[0].ltv_bps, 0);
}

#[test]
fn unauthorized_actions_are_counted_not_fatal() {
    let s = scenario(
        "alice cannot halt the pool",
        vec![geist(9_000, 0)],
        vec![
            TimedAction {
                at_secs: 0,
                action: Action::Deposit {
                    account: "alice".into(),
                    assets: 1_000,
                },
            },
            TimedAction {
                at_secs: HOUR,
                action: Action::ActivateShutdown {
                    account: "alice".into(),
                },
            },
        ],
        2 * HOUR,
    );

    let summary = replay(&s, false).unwrap();
    assert_eq!(summary.actions_applied, 1);
    assert_eq!(summary.actions_rejected, 1);
    assert!(!summary.shutdown);
}

#[test]
fn scenario_survives_a_json_round_trip() {
    let s = scenario(
        "round trip",
        vec![geist(9_000, 500)],
        vec![harvest_at(HOUR)],
        DAY,
    );
    let json = serde_json::to_string_pretty(&s).unwrap();
    let back: Scenario = serde_json::from_str(&json).unwrap();
    assert_eq!(back, s);

    let summary = replay(&back, false).unwrap();
    assert_eq!(summary.name, "round trip");
}
