//! Role tiers and the authorization matrix.
//!
//! Every state-mutating entry point calls [`authorize`] before touching
//! any state. The matrix lives in one pure function so the full
//! capability table is testable on its own, instead of being scattered
//! through the operations.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Privilege tiers, ordered: each tier holds every capability of the
/// tiers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Unassigned,
    Strategist,
    Guardian,
    Admin,
    SuperAdmin,
}

/// Every role-gated operation in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddStrategy,
    UpdateStrategyAllocBps,
    RevokeStrategy,
    SetWithdrawalOrder,
    ActivateShutdown,
    LiftShutdown,
    UpdateTvlCap,
    SetLockedProfitDegradation,
    SetLeverageParams,
    SetFees,
    AuthorizedDelever,
    Panic,
    RetireStrategy,
    PauseStrategy,
    UnpauseStrategy,
    InitiateUpgradeCooldown,
    ClearUpgradeCooldown,
    Upgrade,
}

/// The minimum tier allowed to perform each operation.
///
/// Shutdown is deliberately asymmetric: a guardian can halt the pool
/// but only an admin can resume it.
pub fn required_role(operation: Operation) -> Role {
    use Operation::*;
    match operation {
        UpdateStrategyAllocBps | SetLeverageParams | SetFees => Role::Strategist,
        ActivateShutdown | AuthorizedDelever | Panic | PauseStrategy | UnpauseStrategy => {
            Role::Guardian
        }
        AddStrategy | RevokeStrategy | SetWithdrawalOrder | LiftShutdown | UpdateTvlCap
        | SetLockedProfitDegradation | RetireStrategy | InitiateUpgradeCooldown
        | ClearUpgradeCooldown => Role::Admin,
        Upgrade => Role::SuperAdmin,
    }
}

/// Reject the call unless `actual` meets the tier the matrix demands.
pub fn authorize(actual: Role, operation: Operation) -> Result<()> {
    let required = required_role(operation);
    if actual >= required {
        Ok(())
    } else {
        Err(VaultError::Unauthorized {
            operation,
            required,
            actual,
        })
    }
}

/// Identity of the account invoking an operation, with the role tier
/// the external access-control layer resolved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub account: String,
    pub role: Role,
}

impl Caller {
    pub fn new(account: impl Into<String>, role: Role) -> Self {
        Self {
            account: account.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin > Role::Guardian);
        assert!(Role::Guardian > Role::Strategist);
        assert!(Role::Strategist > Role::Unassigned);
    }

    #[test]
    fn shutdown_is_asymmetric() {
        assert!(authorize(Role::Guardian, Operation::ActivateShutdown).is_ok());
        assert!(authorize(Role::Guardian, Operation::LiftShutdown).is_err());
        assert!(authorize(Role::Admin, Operation::LiftShutdown).is_ok());
    }

    #[test]
    fn strategist_matrix_row() {
        assert!(authorize(Role::Strategist, Operation::UpdateStrategyAllocBps).is_ok());
        assert!(authorize(Role::Strategist, Operation::AddStrategy).is_err());
        assert!(authorize(Role::Strategist, Operation::RevokeStrategy).is_err());
        assert!(authorize(Role::Strategist, Operation::ActivateShutdown).is_err());
    }

    #[test]
    fn unassigned_has_no_privileges() {
        for op in [
            Operation::AddStrategy,
            Operation::UpdateStrategyAllocBps,
            Operation::RevokeStrategy,
            Operation::ActivateShutdown,
            Operation::Panic,
            Operation::Upgrade,
        ] {
            assert!(authorize(Role::Unassigned, op).is_err());
        }
    }

    #[test]
    fn super_admin_can_do_everything() {
        for op in [
            Operation::AddStrategy,
            Operation::LiftShutdown,
            Operation::Upgrade,
            Operation::SetLeverageParams,
        ] {
            assert!(authorize(Role::SuperAdmin, op).is_ok());
        }
    }
}
