//! Column generation loop (C6, §4.6).
//!
//! Drives a single node's restricted master to optimality: solve, extract duals, price every
//! pool, insert surviving columns, repeat. Terminates `Optimal` the first iteration pricing adds
//! nothing new — the crucial guard against looping forever on duplicate or branching-incompatible
//! candidates (§4.6 step 6).

use std::collections::HashMap;
use std::time::Instant;

use crate::cuts::NoGoodCut;
use crate::error::LimitKind;
use crate::lp::{LpSolver, LpStatus};
use crate::master::{self, MasterSolution};
use crate::model::{GenIdCounter, Instance, PatternPool};
use crate::pricing;

/// Per-call knobs for one column-generation run (threaded down from [`crate::driver::SolveConfig`]).
#[derive(Debug, Clone, Copy)]
pub struct CgConfig {
    pub max_iterations: usize,
    pub lp_time_limit_secs: Option<f64>,
    /// Slack allowed when checking that the objective history is non-decreasing (§4.6, §8).
    pub tolerance: f64,
}

/// The outcome of a column-generation run at a single node.
pub enum CgOutcome {
    /// Pricing found no improving column: `master` is the node's true LP-relaxation optimum.
    Optimal(MasterSolution),
    /// Terminated without proving optimality for this pool; `reason` explains why. Per §4.10 step
    /// 3, any non-`Optimal` outcome closes the node as `INFEASIBLE` — a conservative choice.
    NotOptimal(LimitKind),
    /// The master LP itself reported infeasible, unbounded, or errored.
    LpFailed(LpStatus),
}

/// Runs column generation for one node. `pool` is mutated in place as pricing adds columns.
/// `deadline`, if set, is the overall wall-clock point past which the driver's run-level
/// `time_limit` has been exceeded; checked between iterations.
#[allow(clippy::too_many_arguments)]
pub fn run(
    instance: &Instance,
    pool: &mut PatternPool,
    fixings: &HashMap<usize, bool>,
    cuts: &[NoGoodCut],
    solver: &dyn LpSolver,
    gen_ids: &GenIdCounter,
    config: CgConfig,
    deadline: Option<Instant>,
) -> CgOutcome {
    let mut last_objective = f64::NEG_INFINITY;

    for iter in 0..config.max_iterations {
        if let Some(dl) = deadline {
            if Instant::now() >= dl {
                return CgOutcome::NotOptimal(LimitKind::TimeLimit);
            }
        }

        let master = master::solve_master(instance, pool, None, cuts, solver, config.lp_time_limit_secs);
        match master.status {
            LpStatus::Optimal | LpStatus::Feasible => {}
            LpStatus::Unbounded | LpStatus::Infeasible | LpStatus::Error | LpStatus::NotSolved => {
                return CgOutcome::LpFailed(master.status);
            }
        }

        let objective = master.objective.unwrap_or(f64::NEG_INFINITY);
        debug_assert!(
            objective >= last_objective - config.tolerance,
            "column generation objective regressed: {last_objective} -> {objective}"
        );
        last_objective = objective;
        log::trace!("cg iter {iter}: objective={objective:.6}");

        let mut added = false;

        if let Some(p) = pricing::price_p0(instance, &master.duals, fixings, gen_ids) {
            if respects_fixings(&p, fixings, true) {
                match pool.add_p0(instance, p) {
                    Ok(true) => added = true,
                    Ok(false) => {}
                    Err(e) => log::warn!("pricing produced an infeasible P0 pattern: {e}"),
                }
            }
        }

        for bin in &instance.bins {
            if let Some(p) = pricing::price_pi(instance, bin.id, &master.duals, fixings, gen_ids) {
                if respects_fixings(&p, fixings, false) {
                    match pool.add_pi(instance, bin.id, p) {
                        Ok(true) => added = true,
                        Ok(false) => {}
                        Err(e) => log::warn!("pricing produced an infeasible Pi({}) pattern: {e}", bin.id),
                    }
                }
            }
        }

        if !added {
            log::debug!("cg converged after {} iteration(s), objective={objective:.6}", iter + 1);
            return CgOutcome::Optimal(master);
        }
    }

    log::warn!("cg hit the iteration limit ({})", config.max_iterations);
    CgOutcome::NotOptimal(LimitKind::IterationLimit)
}

/// Defensive check for §4.6 step 5(b): a pattern pricing hands back should already respect
/// branching, but we never insert one that doesn't.
fn respects_fixings(pattern: &crate::model::Pattern, fixings: &HashMap<usize, bool>, is_p0: bool) -> bool {
    for (&j, &val) in fixings {
        if !val && pattern.contains(j) {
            return false;
        }
        if is_p0 && val && !pattern.contains(j) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::BoundedSimplex;
    use crate::model::{Bin, Item};
    use crate::pattern_init::seed_root_pool;

    fn small_instance() -> Instance {
        let items = vec![
            Item { id: 0, weight: 5, profit: 10 },
            Item { id: 1, weight: 4, profit: 8 },
            Item { id: 2, weight: 3, profit: 6 },
            Item { id: 3, weight: 2, profit: 5 },
            Item { id: 4, weight: 1, profit: 4 },
        ];
        let bins = vec![Bin { id: 0, capacity: 7 }, Bin { id: 1, capacity: 6 }];
        Instance::new("t", items, bins).unwrap()
    }

    #[test]
    fn converges_to_optimal_on_root_pool() {
        let instance = small_instance();
        let gen_ids = GenIdCounter::new();
        let mut pool = seed_root_pool(&instance, &gen_ids).unwrap();
        let solver = BoundedSimplex::new();
        let config = CgConfig { max_iterations: 200, lp_time_limit_secs: None, tolerance: 1e-6 };
        let outcome = run(&instance, &mut pool, &HashMap::new(), &[], &solver, &gen_ids, config, None);
        match outcome {
            CgOutcome::Optimal(master) => {
                assert_eq!(master.status, LpStatus::Optimal);
                assert!(master.objective.unwrap() >= 0.0);
            }
            _ => panic!("expected column generation to converge"),
        }
    }

    #[test]
    fn empty_pool_fails_the_node() {
        let instance = small_instance();
        let mut pool = PatternPool::new(instance.n_bins());
        let solver = BoundedSimplex::new();
        let gen_ids = GenIdCounter::new();
        let config = CgConfig { max_iterations: 50, lp_time_limit_secs: None, tolerance: 1e-6 };
        // No convexity-feasible column (not even the empty pattern) means the master LP itself
        // is infeasible (Sigma y = 1 over an empty pool has no solution).
        let outcome = run(&instance, &mut pool, &HashMap::new(), &[], &solver, &gen_ids, config, None);
        assert!(matches!(outcome, CgOutcome::LpFailed(LpStatus::Infeasible)));
    }
}
