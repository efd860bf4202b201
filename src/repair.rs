//! Fractional repair via bin-packing feasibility (C9, §4.9).
//!
//! Triggered when a node's LP relaxation has integer `t` but fractional `x`: `S = {j : t_j ~ 1}`
//! is a fixed item selection whose *bin assignment* column generation failed to integerize. The
//! [`FeasibilityChecker`] capability boundary (§6.3) decides whether `S` packs into the bins at
//! all; [`BacktrackingPacker`] is the in-process reference implementation.

use std::time::{Duration, Instant};

/// Outcome of a feasibility check (§6.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeasibilityStatus {
    /// `bin_of[j]` is the assigned bin for each `j` in the queried selection, `None` otherwise.
    Feasible { bin_of: Vec<Option<usize>> },
    Infeasible,
    TimeLimit,
    Error,
}

/// The CP/SAT feasibility capability boundary (§6.3). Implementations are swappable at
/// [`crate::driver::BranchAndPrice::new`] construction.
pub trait FeasibilityChecker {
    /// Decides whether `selected` (item indices) can be packed into bins of the given
    /// `capacities`, each item `j` contributing `weights[j]`, within `time_limit`.
    fn check(
        &self,
        capacities: &[u64],
        weights: &[u64],
        selected: &[usize],
        time_limit: Option<Duration>,
    ) -> FeasibilityStatus;
}

/// A capacity-sorted backtracking search: items are tried largest-first, each against bins in
/// decreasing remaining capacity, skipping bins whose remaining capacity repeats a capacity
/// already tried at this depth (the standard symmetry-breaking prune for identical bins). Adequate
/// for the `|S|` sizes arising from MKP repair; not a CP/SAT solver, just this crate's reference
/// implementation of the trait.
#[derive(Debug, Default)]
pub struct BacktrackingPacker;

impl BacktrackingPacker {
    pub fn new() -> Self {
        BacktrackingPacker
    }
}

/// How often (in search nodes) to re-check the wall clock against the deadline.
const DEADLINE_CHECK_INTERVAL: u64 = 2048;

struct Search<'a> {
    weights: &'a [u64],
    items: Vec<usize>, // selected items, sorted by weight descending
    remaining: Vec<u64>,
    assignment: Vec<Option<usize>>, // per selected-item index
    deadline: Option<Instant>,
    nodes_seen: u64,
    timed_out: bool,
}

impl<'a> Search<'a> {
    fn solve(&mut self, pos: usize) -> bool {
        if pos == self.items.len() {
            return true;
        }

        self.nodes_seen += 1;
        if self.nodes_seen % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(dl) = self.deadline {
                if Instant::now() >= dl {
                    self.timed_out = true;
                    return false;
                }
            }
        }

        let w = self.weights[self.items[pos]];
        let mut tried_capacities = Vec::new();
        for bin in 0..self.remaining.len() {
            let cap = self.remaining[bin];
            if cap < w {
                continue;
            }
            if tried_capacities.contains(&cap) {
                continue; // symmetry break: an identical remaining capacity was already explored
            }
            tried_capacities.push(cap);

            self.remaining[bin] -= w;
            self.assignment[pos] = Some(bin);
            if self.solve(pos + 1) {
                return true;
            }
            self.assignment[pos] = None;
            self.remaining[bin] += w;

            if self.timed_out {
                return false;
            }
        }
        false
    }
}

impl FeasibilityChecker for BacktrackingPacker {
    fn check(
        &self,
        capacities: &[u64],
        weights: &[u64],
        selected: &[usize],
        time_limit: Option<Duration>,
    ) -> FeasibilityStatus {
        let mut items: Vec<usize> = selected.to_vec();
        items.sort_by(|&a, &b| weights[b].cmp(&weights[a]));

        let total_selected: u64 = items.iter().map(|&j| weights[j]).sum();
        let total_capacity: u64 = capacities.iter().sum();
        if total_selected > total_capacity {
            return FeasibilityStatus::Infeasible;
        }

        let deadline = time_limit.map(|d| Instant::now() + d);
        let mut search = Search {
            weights,
            items: items.clone(),
            remaining: capacities.to_vec(),
            assignment: vec![None; items.len()],
            deadline,
            nodes_seen: 0,
            timed_out: false,
        };

        let found = search.solve(0);
        if search.timed_out {
            return FeasibilityStatus::TimeLimit;
        }
        if !found {
            return FeasibilityStatus::Infeasible;
        }

        let mut bin_of = vec![None; weights.len()];
        for (pos, &item) in items.iter().enumerate() {
            bin_of[item] = search.assignment[pos];
        }
        FeasibilityStatus::Feasible { bin_of }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_a_feasible_selection() {
        let checker = BacktrackingPacker::new();
        let capacities = [7u64, 6];
        let weights = [5u64, 4, 3, 2, 1];
        let status = checker.check(&capacities, &weights, &[0, 1, 2, 3], None);
        match status {
            FeasibilityStatus::Feasible { bin_of } => {
                assert!(bin_of[0].is_some());
                assert!(bin_of[1].is_some());
                assert!(bin_of[2].is_some());
                assert!(bin_of[3].is_some());
                let mut load = [0u64, 0];
                for (j, b) in bin_of.iter().enumerate() {
                    if let Some(b) = b {
                        load[*b] += weights[j];
                    }
                }
                assert!(load[0] <= capacities[0]);
                assert!(load[1] <= capacities[1]);
            }
            other => panic!("expected Feasible, got {other:?}"),
        }
    }

    #[test]
    fn rejects_an_infeasible_selection() {
        let checker = BacktrackingPacker::new();
        // Two items of weight 5 each, bins of capacity 6 and 4: one bin can only take one.
        let capacities = [6u64, 4];
        let weights = [5u64, 5];
        let status = checker.check(&capacities, &weights, &[0, 1], None);
        assert_eq!(status, FeasibilityStatus::Infeasible);
    }

    #[test]
    fn total_weight_over_total_capacity_is_a_fast_rejection() {
        let checker = BacktrackingPacker::new();
        let capacities = [5u64, 5];
        let weights = [6u64, 6];
        let status = checker.check(&capacities, &weights, &[0, 1], None);
        assert_eq!(status, FeasibilityStatus::Infeasible);
    }

    #[test]
    fn empty_selection_is_always_feasible() {
        let checker = BacktrackingPacker::new();
        let capacities = [3u64];
        let weights = [10u64];
        let status = checker.check(&capacities, &weights, &[], None);
        assert!(matches!(status, FeasibilityStatus::Feasible { .. }));
    }
}
