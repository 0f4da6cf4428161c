//! Allocation registry: pure bookkeeping over the active strategies.
//!
//! Owns no funds. Tracks each strategy's allocation weight in basis
//! points, its last-reported balance, and the order in which the vault
//! drains strategies to cover a liquidity shortfall (first added,
//! first pulled, reorderable by an admin).

use crate::error::{Result, VaultError};
use crate::model::amount::BPS_DENOMINATOR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyEntry {
    pub strategy_id: String,
    pub alloc_bps: u16,
    pub active: bool,
    /// Balance the strategy last reported to the vault. The vault's
    /// `total_assets` sums these; it never re-queries positions live.
    pub allocated: u128,
}

#[derive(Debug, Default)]
pub struct Registry {
    /// Entry order doubles as the withdrawal order.
    entries: Vec<StrategyEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of allocation weights across active entries.
    pub fn total_alloc_bps(&self) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.alloc_bps as u32)
            .sum()
    }

    pub fn add(&mut self, strategy_id: &str, alloc_bps: u16) -> Result<()> {
        if self.entries.iter().any(|e| e.strategy_id == strategy_id) {
            return Err(VaultError::StrategyExists(strategy_id.to_string()));
        }
        self.check_headroom(alloc_bps, 0)?;
        self.entries.push(StrategyEntry {
            strategy_id: strategy_id.to_string(),
            alloc_bps,
            active: true,
            allocated: 0,
        });
        Ok(())
    }

    pub fn update_alloc_bps(&mut self, strategy_id: &str, alloc_bps: u16) -> Result<()> {
        let current = self.entry(strategy_id)?.alloc_bps;
        self.check_headroom(alloc_bps, current)?;
        self.entry_mut(strategy_id)?.alloc_bps = alloc_bps;
        Ok(())
    }

    /// Remove an entry entirely. The vault only calls this after a full
    /// unwind has zeroed the strategy's balance.
    pub fn remove(&mut self, strategy_id: &str) -> Result<StrategyEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.strategy_id == strategy_id)
            .ok_or_else(|| VaultError::UnknownStrategy(strategy_id.to_string()))?;
        Ok(self.entries.remove(idx))
    }

    pub fn entry(&self, strategy_id: &str) -> Result<&StrategyEntry> {
        self.entries
            .iter()
            .find(|e| e.strategy_id == strategy_id)
            .ok_or_else(|| VaultError::UnknownStrategy(strategy_id.to_string()))
    }

    pub fn entry_mut(&mut self, strategy_id: &str) -> Result<&mut StrategyEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.strategy_id == strategy_id)
            .ok_or_else(|| VaultError::UnknownStrategy(strategy_id.to_string()))
    }

    /// Active strategy ids in the order the vault drains them.
    pub fn strategies_in_withdrawal_order(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.strategy_id.clone())
            .collect()
    }

    /// Reorder the withdrawal queue. `order` must be a permutation of
    /// the current entry ids.
    pub fn set_withdrawal_order(&mut self, order: &[String]) -> Result<()> {
        if order.len() != self.entries.len() {
            return Err(VaultError::UnknownStrategy(format!(
                "order lists {} strategies, registry has {}",
                order.len(),
                self.entries.len()
            )));
        }
        let mut reordered = Vec::with_capacity(self.entries.len());
        for id in order {
            let idx = self
                .entries
                .iter()
                .position(|e| &e.strategy_id == id)
                .ok_or_else(|| VaultError::UnknownStrategy(id.clone()))?;
            reordered.push(self.entries.remove(idx));
        }
        self.entries = reordered;
        Ok(())
    }

    pub fn entries(&self) -> &[StrategyEntry] {
        &self.entries
    }

    /// Sum of last-reported strategy balances.
    pub fn total_allocated(&self) -> u128 {
        self.entries.iter().map(|e| e.allocated).sum()
    }

    fn check_headroom(&self, requested_bps: u16, replacing_bps: u16) -> Result<()> {
        let total = self.total_alloc_bps() - replacing_bps as u32 + requested_bps as u32;
        if total > BPS_DENOMINATOR as u32 {
            return Err(VaultError::AllocationOverflow {
                requested_bps,
                total_bps: total,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_sum_is_capped() {
        let mut reg = Registry::new();
        reg.add("a", 9_000).unwrap();
        assert!(matches!(
            reg.add("b", 2_000),
            Err(VaultError::AllocationOverflow { .. })
        ));
        reg.add("b", 1_000).unwrap();
        assert_eq!(reg.total_alloc_bps(), 10_000);
    }

    #[test]
    fn update_replaces_own_weight() {
        let mut reg = Registry::new();
        reg.add("a", 9_000).unwrap();
        reg.update_alloc_bps("a", 10_000).unwrap();
        assert!(matches!(
            reg.update_alloc_bps("a", 10_001),
            Err(VaultError::AllocationOverflow { .. })
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut reg = Registry::new();
        reg.add("a", 100).unwrap();
        assert_eq!(reg.add("a", 100), Err(VaultError::StrategyExists("a".into())));
    }

    #[test]
    fn withdrawal_order_is_first_added_first_pulled() {
        let mut reg = Registry::new();
        reg.add("a", 100).unwrap();
        reg.add("b", 100).unwrap();
        reg.add("c", 100).unwrap();
        assert_eq!(reg.strategies_in_withdrawal_order(), vec!["a", "b", "c"]);

        reg.set_withdrawal_order(&["c".into(), "a".into(), "b".into()])
            .unwrap();
        assert_eq!(reg.strategies_in_withdrawal_order(), vec!["c", "a", "b"]);
    }

    #[test]
    fn reorder_rejects_unknown_or_partial_lists() {
        let mut reg = Registry::new();
        reg.add("a", 100).unwrap();
        reg.add("b", 100).unwrap();
        assert!(reg.set_withdrawal_order(&["a".into()]).is_err());
        assert!(
            reg.set_withdrawal_order(&["a".into(), "x".into()])
                .is_err()
        );
    }
}
