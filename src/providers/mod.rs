//! Contracts for the external collaborators the orchestrator drives.
//!
//! Strategy generation, costed artifact generation, probe scoring, and
//! durable snapshots are opaque collaborators behind these traits. They
//! return data; they never touch the ledger or pilot state. The orchestrator
//! applies what they return.

pub mod parse;

use crate::errors::{EvaluationError, GenerationError, PlanningError};
use crate::evaluation::Evaluation;
use crate::money::Cents;
use crate::orchestrator::state::RunSnapshot;
use crate::pilot::{PilotId, PilotStrategy, ProductionTier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the caller wants produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRequest {
    /// Free-text description of the artifact to produce.
    pub description: String,
    /// Preferred tier, if the caller has one.
    #[serde(default)]
    pub tier: Option<ProductionTier>,
}

impl ProductionRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tier: None,
        }
    }

    pub fn with_tier(mut self, tier: ProductionTier) -> Self {
        self.tier = Some(tier);
        self
    }
}

/// One produced artifact. The engine treats artifacts as opaque; the locator
/// is whatever the provider and caller agree on (path, URL, object key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub uri: String,
}

impl Artifact {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
        }
    }
}

/// Artifacts plus actual cost from one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub artifacts: Vec<Artifact>,
    /// What the work actually cost. Must not exceed the cap it ran under.
    pub cost: Cents,
}

/// Inputs handed to the evaluator for one pilot's probe.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub pilot_id: PilotId,
    pub artifacts: Vec<Artifact>,
    /// Spend so far for this pilot.
    pub spent: Cents,
    /// The pilot's current allocation.
    pub allocated: Cents,
}

/// Turns a request and total budget into competing pilot strategies.
#[async_trait]
pub trait StrategyGenerator: Send + Sync {
    /// Must return at least one strategy whose allocations fit the budget;
    /// an empty plan fails the run immediately.
    async fn plan(
        &self,
        request: &ProductionRequest,
        total_budget: Cents,
    ) -> Result<Vec<PilotStrategy>, PlanningError>;
}

/// Performs one unit of costed work under a budget cap.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produce one unit of artifact for `pilot` within `budget_cap`. The
    /// reported cost must not exceed the cap.
    async fn run(
        &self,
        pilot: &PilotId,
        strategy: &PilotStrategy,
        budget_cap: Cents,
    ) -> Result<GenerationOutput, GenerationError>;
}

/// Scores a pilot's probe output.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn score(&self, input: EvaluationInput) -> Result<Evaluation, EvaluationError>;
}

/// Best-effort durable storage for post-phase snapshots.
///
/// The orchestrator hands a snapshot over after each phase and moves on; a
/// sink failure is logged, never propagated.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, snapshot: &RunSnapshot) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_request_builder() {
        let request = ProductionRequest::new("storyboard for a 30s spot")
            .with_tier(ProductionTier::Premium);
        assert_eq!(request.tier, Some(ProductionTier::Premium));
        assert!(request.description.contains("storyboard"));
    }

    #[test]
    fn test_artifact_roundtrip() {
        let artifact = Artifact::new("frame-1", "s3://bucket/frame-1.png");
        let json = serde_json::to_string(&artifact).unwrap();
        let parsed: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, artifact);
    }
}
