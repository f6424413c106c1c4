//! Typed error hierarchy for the regatta engine.
//!
//! Three groups cover the three subsystems:
//! - `LedgerError` — budget accounting invariant violations
//! - `PlanningError` / `EvaluationError` / `GenerationError` — collaborator failures
//! - `RunError` — run-level failures surfaced to the caller

use crate::money::Cents;
use crate::orchestrator::state::FinalResult;
use crate::pilot::PilotId;
use thiserror::Error;

/// Errors from the budget ledger. Invariant violations are fatal to the
/// operation attempted and are never silently clamped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient budget: requested {requested}, unallocated {unallocated}")]
    InsufficientBudget {
        requested: Cents,
        unallocated: Cents,
    },

    #[error("budget exceeded for pilot {pilot}: attempted to spend {attempted}, remaining {remaining}")]
    BudgetExceeded {
        pilot: PilotId,
        attempted: Cents,
        remaining: Cents,
    },

    #[error("allocation for pilot {pilot} cannot drop below spend: requested {requested}, spent {spent}")]
    AllocationBelowSpend {
        pilot: PilotId,
        requested: Cents,
        spent: Cents,
    },

    #[error("allocation for pilot {pilot} cannot grow: requested {requested}, current {current}")]
    AllocationAboveCurrent {
        pilot: PilotId,
        requested: Cents,
        current: Cents,
    },

    #[error("unknown pilot {0}")]
    UnknownPilot(PilotId),

    #[error("ledger entry for pilot {0} is frozen")]
    Frozen(PilotId),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

/// The strategy generator could not produce a usable plan.
#[derive(Debug, Clone, Error)]
#[error("planning failed: {message}")]
pub struct PlanningError {
    pub message: String,
}

impl PlanningError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The evaluator could not score a pilot's probe output.
#[derive(Debug, Clone, Error)]
#[error("evaluation failed: {message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors from a generation provider call.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Transient provider failure, worth another attempt.
    #[error("provider error: {0}")]
    Transient(String),

    /// The offered budget cap cannot cover one unit of work. Not retryable.
    #[error("budget cap {cap} too low: {message}")]
    BudgetExceeded { cap: Cents, message: String },
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

/// Run-level failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("strategy generator produced no strategies")]
    NoStrategies,

    #[error(transparent)]
    Planning(#[from] PlanningError),

    /// No pilot reached finalization. Carries the full per-pilot report so
    /// callers can tell "no strategy was good enough" apart from
    /// "infrastructure errors prevented evaluation".
    #[error("all pilots failed: no pilot reached finalization")]
    AllPilotsFailed { result: Box<FinalResult> },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RunError {
    /// Per-pilot diagnostics, when the failure carries them.
    pub fn result(&self) -> Option<&FinalResult> {
        match self {
            RunError::AllPilotsFailed { result } => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_insufficient_budget_carries_amounts() {
        let err = LedgerError::InsufficientBudget {
            requested: Cents(5_000),
            unallocated: Cents(1_000),
        };
        assert!(err.to_string().contains("$50.00"));
        assert!(err.to_string().contains("$10.00"));
    }

    #[test]
    fn ledger_error_budget_exceeded_is_matchable() {
        let err = LedgerError::BudgetExceeded {
            pilot: PilotId::new("a"),
            attempted: Cents(100),
            remaining: Cents(50),
        };
        match &err {
            LedgerError::BudgetExceeded { remaining, .. } => assert_eq!(*remaining, Cents(50)),
            _ => panic!("Expected BudgetExceeded variant"),
        }
    }

    #[test]
    fn generation_error_retryability() {
        assert!(GenerationError::Transient("503".into()).is_retryable());
        assert!(
            !GenerationError::BudgetExceeded {
                cap: Cents(10),
                message: "unit costs more".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn run_error_converts_from_planning_error() {
        let err: RunError = PlanningError::new("model returned garbage").into();
        assert!(err.to_string().contains("model returned garbage"));
        assert!(err.result().is_none());
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&LedgerError::LockPoisoned);
        assert_std_error(&PlanningError::new("x"));
        assert_std_error(&EvaluationError::new("x"));
        assert_std_error(&GenerationError::Transient("x".into()));
        assert_std_error(&RunError::NoStrategies);
    }
}
