use thiserror::Error;

use crate::model::roles::{Operation, Role};

/// Every failure the ledger can surface to a caller. All variants are
/// raised before any state mutation; a failed call leaves the pool in
/// its prior state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("operation {operation:?} requires role {required:?}, caller has {actual:?}")]
    Unauthorized {
        operation: Operation,
        required: Role,
        actual: Role,
    },

    #[error("deposit of {assets} would push total assets past the TVL cap of {cap}")]
    CapExceeded { assets: u128, cap: u128 },

    #[error("deposits are disabled while emergency shutdown is active")]
    ShutdownActive,

    #[error("allocation of {requested_bps} BPS would bring the total to {total_bps} (max 10000)")]
    AllocationOverflow { requested_bps: u16, total_bps: u32 },

    #[error("no strategy registered under id `{0}`")]
    UnknownStrategy(String),

    #[error("strategy `{0}` is already registered")]
    StrategyExists(String),

    #[error("no liquidity recoverable for withdrawal")]
    LiquidityShortfall,

    #[error("invalid leverage bounds: target {target_bps} must be < max {max_bps} <= 10000")]
    InvalidLtvBounds { target_bps: u16, max_bps: u16 },

    #[error("upgrade cooldown has not been initiated")]
    CooldownNotInitiated,

    #[error("upgrade cooldown is already running")]
    CooldownAlreadyInitiated,

    #[error("upgrade cooldown has {remaining_secs}s remaining")]
    CooldownNotElapsed { remaining_secs: u64 },

    #[error("strategy `{0}` is retired")]
    StrategyRetired(String),

    #[error("strategy `{0}` is paused")]
    StrategyPaused(String),

    #[error("reentrant call rejected")]
    Reentrancy,

    #[error("harvest log holds {have} samples, {requested} requested")]
    InsufficientHistory { have: usize, requested: usize },

    #[error("owner holds {held} shares, {needed} needed")]
    InsufficientShares { held: u128, needed: u128 },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("operation would mint or burn zero shares")]
    ZeroShares,

    #[error("fee split shares must sum to 10000 BPS, got {0}")]
    InvalidFeeSplit(u32),

    #[error("total fee of {0} BPS exceeds the {1} BPS ceiling")]
    FeeTooHigh(u16, u16),

    #[error("degradation rate {0} exceeds the coefficient")]
    DegradationTooHigh(u128),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("swap returned {out} which is below the minimum of {min_out}")]
    SlippageExceeded { out: u128, min_out: u128 },
}

pub type Result<T> = std::result::Result<T, VaultError>;
