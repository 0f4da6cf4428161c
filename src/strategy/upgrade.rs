//! One-shot upgrade timelock.
//!
//! ```plain
//! Unset ──initiate──► Initiated ──(timelock elapses)──► Expired
//!   ▲                     │                                │
//!   └──────clear──────────┘          upgrade──────────────┘
//! ```
//!
//! An upgrade is permitted only in `Expired`, and consuming it returns
//! the guard to `Unset`: every upgrade requires a fresh cooldown. There
//! is no standing window.

use crate::error::{Result, VaultError};

/// 48 hours between initiating a cooldown and being allowed to upgrade.
pub const UPGRADE_TIMELOCK_SECS: u64 = 48 * 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Unset,
    Initiated,
    Expired,
}

#[derive(Debug, Clone)]
pub struct UpgradeGuard {
    initiated_at: Option<u64>,
    timelock_secs: u64,
    version: u32,
}

impl Default for UpgradeGuard {
    fn default() -> Self {
        Self::new(UPGRADE_TIMELOCK_SECS)
    }
}

impl UpgradeGuard {
    pub fn new(timelock_secs: u64) -> Self {
        Self {
            initiated_at: None,
            timelock_secs,
            version: 1,
        }
    }

    pub fn state(&self, now: u64) -> CooldownState {
        match self.initiated_at {
            None => CooldownState::Unset,
            Some(at) if now >= at + self.timelock_secs => CooldownState::Expired,
            Some(_) => CooldownState::Initiated,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn initiate(&mut self, now: u64) -> Result<()> {
        match self.state(now) {
            CooldownState::Initiated => Err(VaultError::CooldownAlreadyInitiated),
            // A previously expired but unconsumed window may be re-armed.
            CooldownState::Unset | CooldownState::Expired => {
                self.initiated_at = Some(now);
                Ok(())
            }
        }
    }

    /// Abandon a pending cooldown.
    pub fn clear(&mut self) {
        self.initiated_at = None;
    }

    /// Consume the expired cooldown and bump the implementation version.
    pub fn upgrade_to(&mut self, version: u32, now: u64) -> Result<u32> {
        match self.state(now) {
            CooldownState::Unset => Err(VaultError::CooldownNotInitiated),
            CooldownState::Initiated => {
                let at = self.initiated_at.unwrap_or(now);
                Err(VaultError::CooldownNotElapsed {
                    remaining_secs: (at + self.timelock_secs).saturating_sub(now),
                })
            }
            CooldownState::Expired => {
                self.version = version;
                self.initiated_at = None;
                Ok(version)
            }
        }
    }
}
