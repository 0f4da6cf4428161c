//! Scoped mutual-exclusion guard for operations that call out to
//! untrusted collaborators (lending market, swap router) before their
//! own state updates finish. Execution is single-threaded, so the only
//! hazard is a collaborator calling back in mid-operation; the permit
//! is released on every exit path, including early `?` returns.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{Result, VaultError};

#[derive(Debug, Default)]
pub struct CallGuard {
    entered: Rc<Cell<bool>>,
}

impl CallGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard for the duration of one public operation.
    /// The permit owns its slot, so holding it does not borrow the
    /// structure the guard lives in.
    pub fn enter(&self) -> Result<CallPermit> {
        if self.entered.get() {
            return Err(VaultError::Reentrancy);
        }
        self.entered.set(true);
        Ok(CallPermit {
            slot: Rc::clone(&self.entered),
        })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.get()
    }
}

/// Live permit; dropping it releases the guard.
pub struct CallPermit {
    slot: Rc<Cell<bool>>,
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        self.slot.set(false);
    }
}
