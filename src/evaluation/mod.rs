//! Probe scoring records and the continue/cancel decision rubric.
//!
//! Evaluators return an `Evaluation` per pilot per round; the orchestrator
//! then derives the authoritative verdict from the score bands below. The
//! evaluator's own recommended decision and multiplier are recorded for
//! diagnostics but never applied directly.

use crate::money::Cents;
use crate::pilot::PilotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision recommended or applied for a pilot after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Continue,
    Cancel,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Continue => write!(f, "continue"),
            Decision::Cancel => write!(f, "cancel"),
        }
    }
}

/// Structured gap analysis attached to an evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapAnalysis {
    /// Requirements the probe output satisfied.
    #[serde(default)]
    pub matched: Vec<String>,
    /// Requirements with no matching output.
    #[serde(default)]
    pub missing: Vec<String>,
    /// Output present but below the bar.
    #[serde(default)]
    pub quality_issues: Vec<String>,
}

impl GapAnalysis {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.missing.is_empty() && self.quality_issues.is_empty()
    }
}

/// One pilot's scored probe, produced once per round. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub pilot_id: PilotId,
    /// Quality score, 0-100.
    pub score: u8,
    /// Evaluator's recommended decision.
    pub decision: Decision,
    /// Evaluator's recommended share of remaining budget, 0.0-1.0.
    pub budget_multiplier: f64,
    #[serde(default)]
    pub gaps: GapAnalysis,
    #[serde(default)]
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    /// Create an evaluation, clamping score to 100 and the multiplier into
    /// [0.0, 1.0].
    pub fn new(
        pilot_id: impl Into<PilotId>,
        score: u8,
        decision: Decision,
        budget_multiplier: f64,
    ) -> Self {
        Self {
            pilot_id: pilot_id.into(),
            score: score.min(100),
            decision,
            budget_multiplier: budget_multiplier.clamp(0.0, 1.0),
            gaps: GapAnalysis::default(),
            reasoning: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_gaps(mut self, gaps: GapAnalysis) -> Self {
        self.gaps = gaps;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

/// Verdict derived from a score by the decision rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricVerdict {
    pub decision: Decision,
    /// Percentage of the pilot's remaining allocation it keeps.
    pub retain_percent: u8,
}

/// Score bands: 90+ keeps everything, 75-89 keeps 75%, 65-74 keeps 50%,
/// below 65 cancels and keeps nothing.
pub fn rubric_verdict(score: u8) -> RubricVerdict {
    let (decision, retain_percent) = match score {
        90.. => (Decision::Continue, 100),
        75..=89 => (Decision::Continue, 75),
        65..=74 => (Decision::Continue, 50),
        _ => (Decision::Cancel, 0),
    };
    RubricVerdict {
        decision,
        retain_percent,
    }
}

/// Portion of a remaining allocation kept under a verdict, floored to the
/// cent.
pub fn retained_budget(remaining: Cents, verdict: RubricVerdict) -> Cents {
    remaining.percent_floor(verdict.retain_percent)
}
