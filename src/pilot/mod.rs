//! Pilot identity, strategy, and lifecycle types.
//!
//! A pilot is one candidate production strategy competing for budget. Its
//! strategy is immutable once planned; all mutable run state lives with the
//! orchestrator and the ledger.

use crate::money::Cents;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one candidate production strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PilotId(String);

impl PilotId {
    pub fn new(id: impl Into<String>) -> Self {
        PilotId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PilotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PilotId {
    fn from(s: &str) -> Self {
        PilotId(s.to_string())
    }
}

impl From<String> for PilotId {
    fn from(s: String) -> Self {
        PilotId(s)
    }
}

/// Production tier a strategy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductionTier {
    /// Quick, low-cost output.
    Draft,
    /// Normal production quality (default).
    #[default]
    Standard,
    /// Highest quality, most expensive per unit.
    Premium,
}

impl fmt::Display for ProductionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductionTier::Draft => write!(f, "draft"),
            ProductionTier::Standard => write!(f, "standard"),
            ProductionTier::Premium => write!(f, "premium"),
        }
    }
}

impl std::str::FromStr for ProductionTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ProductionTier::Draft),
            "standard" => Ok(ProductionTier::Standard),
            "premium" => Ok(ProductionTier::Premium),
            _ => anyhow::bail!(
                "Invalid production tier '{}'. Valid values: draft, standard, premium",
                s
            ),
        }
    }
}

/// One candidate production strategy competing for budget.
///
/// Immutable once created; the allocation is fixed at plan time and only the
/// ledger tracks what happens to it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotStrategy {
    pub id: PilotId,
    pub tier: ProductionTier,
    /// Budget requested for this pilot at plan time.
    pub allocated_budget: Cents,
    /// Cheap trial units to produce during the probe phase.
    pub probe_units: u32,
    /// Full-scale units to produce if the pilot survives.
    pub full_units: u32,
    /// Generator's free-text justification for the approach.
    #[serde(default)]
    pub rationale: String,
}

impl PilotStrategy {
    pub fn new(
        id: impl Into<PilotId>,
        tier: ProductionTier,
        allocated_budget: Cents,
        probe_units: u32,
        full_units: u32,
    ) -> Self {
        Self {
            id: id.into(),
            tier,
            allocated_budget,
            probe_units,
            full_units,
            rationale: String::new(),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}

/// Lifecycle state of a pilot.
///
/// `Rejected`, `Failed`, and `Finalized` are terminal: no further transitions
/// and no further spend. `Approved -> Probing` re-enters the trial loop when
/// a further funded round runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PilotState {
    Planned,
    Probing,
    Evaluated,
    Approved,
    Rejected,
    Completing,
    Finalized,
    Failed,
}

impl PilotState {
    /// Terminal states permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PilotState::Rejected | PilotState::Finalized | PilotState::Failed
        )
    }

    /// States in which the pilot's ledger entry still accepts spend.
    pub fn allows_spend(&self) -> bool {
        matches!(self, PilotState::Probing | PilotState::Completing)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition(self, next: PilotState) -> bool {
        use PilotState::*;
        matches!(
            (self, next),
            (Planned, Probing)
                | (Planned, Rejected)
                | (Probing, Evaluated)
                | (Probing, Rejected)
                | (Evaluated, Approved)
                | (Evaluated, Rejected)
                | (Approved, Completing)
                | (Approved, Probing)
                | (Completing, Finalized)
                | (Completing, Failed)
        )
    }
}

impl fmt::Display for PilotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PilotState::Planned => "planned",
            PilotState::Probing => "probing",
            PilotState::Evaluated => "evaluated",
            PilotState::Approved => "approved",
            PilotState::Rejected => "rejected",
            PilotState::Completing => "completing",
            PilotState::Finalized => "finalized",
            PilotState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pilot_id_display_and_as_str() {
        let id = PilotId::new("pilot-a");
        assert_eq!(id.to_string(), "pilot-a");
        assert_eq!(id.as_str(), "pilot-a");
    }

    #[test]
    fn test_production_tier_parse_roundtrip() {
        for tier in [
            ProductionTier::Draft,
            ProductionTier::Standard,
            ProductionTier::Premium,
        ] {
            let parsed: ProductionTier = tier.to_string().parse().unwrap();
            assert_eq!(parsed, tier);
        }
    }

    #[test]
    fn test_production_tier_parse_invalid() {
        assert!("deluxe".parse::<ProductionTier>().is_err());
    }

    #[test]
    fn test_strategy_builder() {
        let strategy = PilotStrategy::new(
            "a",
            ProductionTier::Standard,
            Cents::from_dollars(40),
            2,
            8,
        )
        .with_rationale("fast single-shot approach");

        assert_eq!(strategy.id.as_str(), "a");
        assert_eq!(strategy.allocated_budget, Cents(4_000));
        assert_eq!(strategy.probe_units, 2);
        assert_eq!(strategy.full_units, 8);
        assert_eq!(strategy.rationale, "fast single-shot approach");
    }

    #[test]
    fn test_lifecycle_happy_path() {
        use PilotState::*;
        assert!(Planned.can_transition(Probing));
        assert!(Probing.can_transition(Evaluated));
        assert!(Evaluated.can_transition(Approved));
        assert!(Approved.can_transition(Completing));
        assert!(Completing.can_transition(Finalized));
    }

    #[test]
    fn test_lifecycle_rejection_paths() {
        use PilotState::*;
        // Plan-time allocation failure
        assert!(Planned.can_transition(Rejected));
        // Probe task failed outright
        assert!(Probing.can_transition(Rejected));
        // Evaluation said cancel
        assert!(Evaluated.can_transition(Rejected));
        // Completion task failure
        assert!(Completing.can_transition(Failed));
    }

    #[test]
    fn test_lifecycle_reprobe_edge() {
        use PilotState::*;
        assert!(Approved.can_transition(Probing));
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        use PilotState::*;
        let all = [
            Planned, Probing, Evaluated, Approved, Rejected, Completing, Finalized, Failed,
        ];
        for terminal in [Rejected, Finalized, Failed] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(
                    !terminal.can_transition(next),
                    "{terminal} must not transition to {next}"
                );
            }
        }
    }

    #[test]
    fn test_allows_spend_only_while_working() {
        use PilotState::*;
        assert!(Probing.allows_spend());
        assert!(Completing.allows_spend());
        for state in [Planned, Evaluated, Approved, Rejected, Finalized, Failed] {
            assert!(!state.allows_spend(), "{state} must not allow spend");
        }
    }

    #[test]
    fn test_state_serde_snake_case() {
        let json = serde_json::to_string(&PilotState::Finalized).unwrap();
        assert_eq!(json, "\"finalized\"");
    }
}
