//! Winner selection over finalized pilots.
//!
//! Ranking is score descending, with quality-per-dollar (score divided by
//! dollars spent) breaking ties, and pilot id breaking any remaining ties so
//! selection is fully deterministic.

use crate::money::Cents;
use crate::pilot::PilotId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Spend floor for quality-per-dollar when a pilot finalized without
/// spending anything.
const MIN_SPEND_CENTS: u64 = 1;

/// One ranked candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPilot {
    pub pilot_id: PilotId,
    pub score: u8,
    pub spent: Cents,
    /// Score per dollar spent.
    pub quality_per_dollar: f64,
}

/// Ranks finalized pilots and picks the winner.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionPolicy;

impl SelectionPolicy {
    /// Rank candidates best-first. Input is `(pilot, score, spent)`.
    pub fn rank(&self, candidates: &[(PilotId, u8, Cents)]) -> Vec<RankedPilot> {
        let mut ranked: Vec<RankedPilot> = candidates
            .iter()
            .map(|(pilot_id, score, spent)| RankedPilot {
                pilot_id: pilot_id.clone(),
                score: *score,
                spent: *spent,
                quality_per_dollar: f64::from(*score)
                    / (spent.0.max(MIN_SPEND_CENTS) as f64 / 100.0),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| {
                    b.quality_per_dollar
                        .partial_cmp(&a.quality_per_dollar)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.pilot_id.cmp(&b.pilot_id))
        });
        ranked
    }

    /// The single best candidate, if any.
    pub fn select(&self, candidates: &[(PilotId, u8, Cents)]) -> Option<RankedPilot> {
        self.rank(candidates).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pilot(id: &str) -> PilotId {
        PilotId::new(id)
    }

    #[test]
    fn test_highest_score_wins() {
        let policy = SelectionPolicy;
        let winner = policy
            .select(&[
                (pilot("a"), 72, Cents(2_000)),
                (pilot("b"), 85, Cents(4_000)),
            ])
            .unwrap();
        assert_eq!(winner.pilot_id, pilot("b"));
        assert_eq!(winner.score, 85);
    }

    #[test]
    fn test_tie_broken_by_quality_per_dollar() {
        let policy = SelectionPolicy;
        // Same score; "cheap" spent half as much, so it wins.
        let ranked = policy.rank(&[
            (pilot("pricey"), 85, Cents(8_000)),
            (pilot("cheap"), 85, Cents(4_000)),
        ]);
        assert_eq!(ranked[0].pilot_id, pilot("cheap"));
        assert!(ranked[0].quality_per_dollar > ranked[1].quality_per_dollar);
    }

    #[test]
    fn test_full_tie_broken_by_pilot_id() {
        let policy = SelectionPolicy;
        let ranked = policy.rank(&[
            (pilot("b"), 85, Cents(4_000)),
            (pilot("a"), 85, Cents(4_000)),
        ]);
        assert_eq!(ranked[0].pilot_id, pilot("a"));
    }

    #[test]
    fn test_zero_spend_uses_floor_not_infinity() {
        let policy = SelectionPolicy;
        let ranked = policy.rank(&[(pilot("free"), 70, Cents::ZERO)]);
        assert!(ranked[0].quality_per_dollar.is_finite());
        assert!(ranked[0].quality_per_dollar > 0.0);
    }

    #[test]
    fn test_no_candidates_no_winner() {
        let policy = SelectionPolicy;
        assert!(policy.select(&[]).is_none());
    }

    #[test]
    fn test_quality_per_dollar_value() {
        let policy = SelectionPolicy;
        let ranked = policy.rank(&[(pilot("a"), 80, Cents(4_000))]);
        // 80 points for $40.00 -> 2.0 points per dollar.
        assert!((ranked[0].quality_per_dollar - 2.0).abs() < f64::EPSILON);
    }
}
