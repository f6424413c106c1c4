//! Thread-safe budget accounting shared by every concurrent pilot task.
//!
//! All mutation is serialized behind one mutex; readers receive
//! stale-but-consistent copies, never torn values. The ledger performs no
//! I/O and never holds its lock across an await point, so it may be shared
//! freely across tasks via `Arc`.
//!
//! Invariants held at all times:
//! - sum of allocations never exceeds the total budget
//! - per-pilot spend never exceeds that pilot's current allocation
//! - frozen entries refuse all further mutation

use crate::errors::LedgerError;
use crate::money::Cents;
use crate::pilot::PilotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Accounting row for one pilot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub pilot_id: PilotId,
    pub allocated: Cents,
    pub spent: Cents,
    /// Frozen entries refuse all further mutation.
    pub frozen: bool,
}

impl LedgerEntry {
    pub fn remaining(&self) -> Cents {
        self.allocated.saturating_sub(self.spent)
    }
}

/// Point-in-time copy of the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub total_budget: Cents,
    pub entries: Vec<LedgerEntry>,
    pub total_allocated: Cents,
    pub total_spent: Cents,
}

impl LedgerSnapshot {
    pub fn entry_for(&self, pilot: &PilotId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| &e.pilot_id == pilot)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<PilotId, LedgerEntry>,
}

impl LedgerState {
    fn total_allocated(&self) -> Cents {
        self.entries.values().map(|e| e.allocated).sum()
    }

    fn total_spent(&self) -> Cents {
        self.entries.values().map(|e| e.spent).sum()
    }

    fn entry_mut(&mut self, pilot: &PilotId) -> Result<&mut LedgerEntry, LedgerError> {
        self.entries
            .get_mut(pilot)
            .ok_or_else(|| LedgerError::UnknownPilot(pilot.clone()))
    }

    fn entry(&self, pilot: &PilotId) -> Result<&LedgerEntry, LedgerError> {
        self.entries
            .get(pilot)
            .ok_or_else(|| LedgerError::UnknownPilot(pilot.clone()))
    }
}

/// Shared budget ledger with a fixed total.
#[derive(Debug)]
pub struct BudgetLedger {
    total: Cents,
    state: Mutex<LedgerState>,
}

impl BudgetLedger {
    pub fn new(total: Cents) -> Self {
        Self {
            total,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state.lock().map_err(|_| LedgerError::LockPoisoned)
    }

    pub fn total_budget(&self) -> Cents {
        self.total
    }

    /// Create or top up the entry for `pilot`. Fails if `amount` exceeds the
    /// unallocated remainder of the total budget.
    pub fn allocate(&self, pilot: &PilotId, amount: Cents) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let unallocated = self.total.saturating_sub(state.total_allocated());
        if amount > unallocated {
            return Err(LedgerError::InsufficientBudget {
                requested: amount,
                unallocated,
            });
        }
        match state.entries.get_mut(pilot) {
            Some(entry) if entry.frozen => Err(LedgerError::Frozen(pilot.clone())),
            Some(entry) => {
                entry.allocated += amount;
                Ok(())
            }
            None => {
                state.entries.insert(
                    pilot.clone(),
                    LedgerEntry {
                        pilot_id: pilot.clone(),
                        allocated: amount,
                        spent: Cents::ZERO,
                        frozen: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Record spend for a pilot, atomically decrementing the global
    /// remaining. Fails if the resulting spend would exceed the pilot's
    /// current allocation.
    pub fn record_spend(&self, pilot: &PilotId, amount: Cents) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let entry = state.entry_mut(pilot)?;
        if entry.frozen {
            return Err(LedgerError::Frozen(pilot.clone()));
        }
        let remaining = entry.remaining();
        if amount > remaining {
            return Err(LedgerError::BudgetExceeded {
                pilot: pilot.clone(),
                attempted: amount,
                remaining,
            });
        }
        entry.spent += amount;
        Ok(())
    }

    /// Lower a pilot's allocation; the freed difference returns to the
    /// unallocated reserve. Returns the freed amount. Fails if `new_amount`
    /// is below current spend or above the current allocation.
    pub fn reduce_allocation(
        &self,
        pilot: &PilotId,
        new_amount: Cents,
    ) -> Result<Cents, LedgerError> {
        let mut state = self.lock()?;
        let entry = state.entry_mut(pilot)?;
        if entry.frozen {
            return Err(LedgerError::Frozen(pilot.clone()));
        }
        if new_amount < entry.spent {
            return Err(LedgerError::AllocationBelowSpend {
                pilot: pilot.clone(),
                requested: new_amount,
                spent: entry.spent,
            });
        }
        if new_amount > entry.allocated {
            return Err(LedgerError::AllocationAboveCurrent {
                pilot: pilot.clone(),
                requested: new_amount,
                current: entry.allocated,
            });
        }
        let freed = entry.allocated.saturating_sub(new_amount);
        entry.allocated = new_amount;
        Ok(freed)
    }

    /// Raise a pilot's allocation from the unallocated reserve. Fails if it
    /// would push total allocations past the total budget.
    pub fn increase_allocation(&self, pilot: &PilotId, amount: Cents) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let unallocated = self.total.saturating_sub(state.total_allocated());
        if amount > unallocated {
            return Err(LedgerError::InsufficientBudget {
                requested: amount,
                unallocated,
            });
        }
        let entry = state.entry_mut(pilot)?;
        if entry.frozen {
            return Err(LedgerError::Frozen(pilot.clone()));
        }
        entry.allocated += amount;
        Ok(())
    }

    /// Freeze a pilot's entry at its current spend. Returns the reclaimed
    /// remainder of its allocation. Fails if already frozen.
    pub fn freeze(&self, pilot: &PilotId) -> Result<Cents, LedgerError> {
        let mut state = self.lock()?;
        let entry = state.entry_mut(pilot)?;
        if entry.frozen {
            return Err(LedgerError::Frozen(pilot.clone()));
        }
        let reclaimed = entry.remaining();
        entry.allocated = entry.spent;
        entry.frozen = true;
        Ok(reclaimed)
    }

    /// Global budget not yet spent.
    pub fn remaining_global(&self) -> Result<Cents, LedgerError> {
        let state = self.lock()?;
        Ok(self.total.saturating_sub(state.total_spent()))
    }

    /// Budget not yet allocated to any pilot.
    pub fn unallocated(&self) -> Result<Cents, LedgerError> {
        let state = self.lock()?;
        Ok(self.total.saturating_sub(state.total_allocated()))
    }

    /// Remaining allocation for one pilot.
    pub fn remaining_for(&self, pilot: &PilotId) -> Result<Cents, LedgerError> {
        let state = self.lock()?;
        Ok(state.entry(pilot)?.remaining())
    }

    pub fn spent_for(&self, pilot: &PilotId) -> Result<Cents, LedgerError> {
        let state = self.lock()?;
        Ok(state.entry(pilot)?.spent)
    }

    /// Copy of one pilot's entry.
    pub fn entry_for(&self, pilot: &PilotId) -> Result<LedgerEntry, LedgerError> {
        let state = self.lock()?;
        Ok(state.entry(pilot)?.clone())
    }

    pub fn total_allocated(&self) -> Result<Cents, LedgerError> {
        let state = self.lock()?;
        Ok(state.total_allocated())
    }

    pub fn total_spent(&self) -> Result<Cents, LedgerError> {
        let state = self.lock()?;
        Ok(state.total_spent())
    }

    /// Consistent point-in-time copy of the whole ledger.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let state = self.lock()?;
        Ok(LedgerSnapshot {
            total_budget: self.total,
            entries: state.entries.values().cloned().collect(),
            total_allocated: state.total_allocated(),
            total_spent: state.total_spent(),
        })
    }
}
