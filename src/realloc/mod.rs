//! Redistribution of budget reclaimed from cancelled pilots.
//!
//! Each rejected pilot's unspent allocation is split across the surviving
//! approved pilots in proportion to their own remaining allocations. All
//! arithmetic is integral and floors to the cent; the flooring leftover goes
//! to the largest weight so nothing is lost. With no eligible survivors the
//! whole amount returns to the unallocated reserve.

use crate::money::Cents;
use crate::pilot::PilotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record of one rejected pilot's budget being redistributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReallocationRecord {
    /// The rejected pilot whose remainder was reclaimed.
    pub source: PilotId,
    pub reclaimed: Cents,
    /// Amount granted to each surviving pilot.
    pub distribution: BTreeMap<PilotId, Cents>,
    /// Remainder returned to the unallocated reserve.
    pub to_reserve: Cents,
}

impl ReallocationRecord {
    pub fn distributed_total(&self) -> Cents {
        self.distribution.values().copied().sum()
    }

    /// Conservation check: reclaimed == distributed + reserve.
    pub fn is_conserved(&self) -> bool {
        self.distributed_total()
            .checked_add(self.to_reserve)
            .is_some_and(|total| total == self.reclaimed)
    }
}

/// Proportional-split policy over survivors' remaining allocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReallocationPolicy;

impl ReallocationPolicy {
    /// Split `reclaimed` across `survivors`, given as `(pilot, remaining
    /// allocation)` pairs, proportional to each remaining share.
    ///
    /// Shares floor to the cent; the leftover goes to the largest weight
    /// (ties broken by lowest pilot id). With no survivors, or survivors
    /// whose remaining allocations are all zero, everything goes to the
    /// reserve.
    pub fn distribute(
        &self,
        source: &PilotId,
        reclaimed: Cents,
        survivors: &[(PilotId, Cents)],
    ) -> ReallocationRecord {
        let total_weight: u64 = survivors.iter().map(|(_, remaining)| remaining.0).sum();

        if reclaimed.is_zero() || total_weight == 0 {
            return ReallocationRecord {
                source: source.clone(),
                reclaimed,
                distribution: BTreeMap::new(),
                to_reserve: reclaimed,
            };
        }

        let mut distribution = BTreeMap::new();
        let mut granted = Cents::ZERO;
        for (pilot, remaining) in survivors {
            let share = reclaimed.ratio_floor(remaining.0, total_weight);
            if !share.is_zero() {
                distribution.insert(pilot.clone(), share);
            }
            granted += share;
        }

        let leftover = reclaimed.saturating_sub(granted);
        if !leftover.is_zero() {
            // Largest remaining wins the flooring leftover; ties go to the
            // lowest pilot id so the split is fully deterministic.
            if let Some((pilot, _)) = survivors
                .iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            {
                *distribution.entry(pilot.clone()).or_insert(Cents::ZERO) += leftover;
            }
        }

        ReallocationRecord {
            source: source.clone(),
            reclaimed,
            distribution,
            to_reserve: Cents::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pilot(id: &str) -> PilotId {
        PilotId::new(id)
    }

    #[test]
    fn test_proportional_split() {
        // $30.00 reclaimed; survivors hold $15.00 and $33.75 remaining.
        let policy = ReallocationPolicy;
        let record = policy.distribute(
            &pilot("c"),
            Cents(3_000),
            &[(pilot("a"), Cents(1_500)), (pilot("b"), Cents(3_375))],
        );

        // floor(3000 * 1500/4875) = 923, floor(3000 * 3375/4875) = 2076,
        // leftover cent goes to the larger weight.
        assert_eq!(record.distribution[&pilot("a")], Cents(923));
        assert_eq!(record.distribution[&pilot("b")], Cents(2_077));
        assert_eq!(record.to_reserve, Cents::ZERO);
        assert!(record.is_conserved());
    }

    #[test]
    fn test_single_survivor_takes_everything() {
        let policy = ReallocationPolicy;
        let record = policy.distribute(
            &pilot("x"),
            Cents(999),
            &[(pilot("a"), Cents(1))],
        );
        assert_eq!(record.distribution[&pilot("a")], Cents(999));
        assert!(record.is_conserved());
    }

    #[test]
    fn test_no_survivors_returns_to_reserve() {
        let policy = ReallocationPolicy;
        let record = policy.distribute(&pilot("x"), Cents(3_000), &[]);
        assert!(record.distribution.is_empty());
        assert_eq!(record.to_reserve, Cents(3_000));
        assert!(record.is_conserved());
    }

    #[test]
    fn test_zero_weights_return_to_reserve() {
        let policy = ReallocationPolicy;
        let record = policy.distribute(
            &pilot("x"),
            Cents(3_000),
            &[(pilot("a"), Cents::ZERO), (pilot("b"), Cents::ZERO)],
        );
        assert!(record.distribution.is_empty());
        assert_eq!(record.to_reserve, Cents(3_000));
    }

    #[test]
    fn test_zero_reclaimed_is_a_noop() {
        let policy = ReallocationPolicy;
        let record = policy.distribute(
            &pilot("x"),
            Cents::ZERO,
            &[(pilot("a"), Cents(100))],
        );
        assert!(record.distribution.is_empty());
        assert!(record.is_conserved());
    }

    #[test]
    fn test_leftover_tie_goes_to_lowest_pilot_id() {
        let policy = ReallocationPolicy;
        // Equal weights, odd amount: one cent cannot be split evenly.
        let record = policy.distribute(
            &pilot("x"),
            Cents(101),
            &[(pilot("b"), Cents(500)), (pilot("a"), Cents(500))],
        );
        assert_eq!(record.distribution[&pilot("a")], Cents(51));
        assert_eq!(record.distribution[&pilot("b")], Cents(50));
        assert!(record.is_conserved());
    }

    #[test]
    fn test_conservation_across_many_shapes() {
        let policy = ReallocationPolicy;
        let survivor_sets = vec![
            vec![(pilot("a"), Cents(1)), (pilot("b"), Cents(999_999))],
            vec![
                (pilot("a"), Cents(333)),
                (pilot("b"), Cents(334)),
                (pilot("c"), Cents(333)),
            ],
            vec![(pilot("a"), Cents(7))],
        ];
        for survivors in survivor_sets {
            for amount in [1u64, 99, 100, 12_345] {
                let record = policy.distribute(&pilot("src"), Cents(amount), &survivors);
                assert!(
                    record.is_conserved(),
                    "conservation violated for amount {amount} over {survivors:?}"
                );
            }
        }
    }
}
