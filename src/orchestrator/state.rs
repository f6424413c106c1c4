//! Run bookkeeping: per-pilot records, final results, and post-phase
//! snapshots.

use crate::evaluation::Evaluation;
use crate::ledger::{LedgerEntry, LedgerSnapshot};
use crate::money::Cents;
use crate::pilot::{PilotId, PilotState, PilotStrategy, ProductionTier};
use crate::providers::Artifact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Orchestrator-private record tracking one pilot through a run.
#[derive(Debug, Clone)]
pub struct PilotRun {
    pub strategy: PilotStrategy,
    pub state: PilotState,
    pub score: Option<u8>,
    pub evaluation: Option<Evaluation>,
    pub probe_artifacts: Vec<Artifact>,
    pub final_artifacts: Vec<Artifact>,
    /// Diagnostic for whatever ended the pilot early.
    pub failure: Option<String>,
    /// Set when the completion phase stopped at the budget boundary.
    pub cut_off: bool,
}

impl PilotRun {
    pub fn new(strategy: PilotStrategy) -> Self {
        Self {
            strategy,
            state: PilotState::Planned,
            score: None,
            evaluation: None,
            probe_artifacts: Vec::new(),
            final_artifacts: Vec::new(),
            failure: None,
            cut_off: false,
        }
    }

    pub fn id(&self) -> &PilotId {
        &self.strategy.id
    }

    /// Apply a lifecycle transition. Illegal edges are a programming error
    /// in the orchestrator, not a runtime condition.
    pub fn transition(&mut self, next: PilotState) {
        debug_assert!(
            self.state.can_transition(next),
            "illegal pilot transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Public summary of this pilot, priced from its ledger entry.
    pub fn report(&self, entry: Option<&LedgerEntry>) -> PilotReport {
        let reasoning = self
            .failure
            .clone()
            .or_else(|| self.evaluation.as_ref().map(|e| e.reasoning.clone()))
            .filter(|r| !r.is_empty());
        PilotReport {
            pilot_id: self.strategy.id.clone(),
            tier: self.strategy.tier,
            state: self.state,
            score: self.score,
            allocated: entry.map(|e| e.allocated).unwrap_or(Cents::ZERO),
            spent: entry.map(|e| e.spent).unwrap_or(Cents::ZERO),
            artifact_count: self.probe_artifacts.len() + self.final_artifacts.len(),
            reasoning,
            cut_off: self.cut_off,
        }
    }
}

/// Public per-pilot summary included in results and snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotReport {
    pub pilot_id: PilotId,
    pub tier: ProductionTier,
    pub state: PilotState,
    pub score: Option<u8>,
    pub allocated: Cents,
    pub spent: Cents,
    pub artifact_count: usize,
    /// Evaluator reasoning or failure diagnostic, whichever ended the pilot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub cut_off: bool,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub winner: Option<PilotId>,
    pub pilots: Vec<PilotReport>,
    pub total_spent: Cents,
    pub total_remaining: Cents,
    /// The winner's full-scale artifacts; empty when there is no winner.
    pub artifacts: Vec<Artifact>,
}

impl FinalResult {
    pub fn is_success(&self) -> bool {
        self.winner.is_some()
    }

    pub fn report_for(&self, pilot: &PilotId) -> Option<&PilotReport> {
        self.pilots.iter().find(|r| &r.pilot_id == pilot)
    }
}

/// Read-only state handed to the persistence collaborator after each phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    /// Phase that just completed, e.g. "plan", "probe:1", "complete".
    pub phase: String,
    pub taken_at: DateTime<Utc>,
    pub ledger: LedgerSnapshot,
    pub pilots: Vec<PilotReport>,
}
