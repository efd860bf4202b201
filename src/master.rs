//! DW master formulation and LP construction (C4, §4.4).
//!
//! The master never touches a tableau directly: it builds an [`LpProblem`] from the current
//! pattern pool plus any no-good cuts, hands it to an [`LpSolver`], and translates the solution
//! back into pattern space ([`DWSolution`]) and dual space ([`DualValues`]). Column order is
//! P0 patterns, then `Pi(0)`, `Pi(1)`, ... patterns, then one `s_j` slack per item — fixed so a
//! rebuild from the same pool always lines columns up the same way.

use std::collections::HashMap;

use crate::cuts::NoGoodCut;
use crate::error::{BpError, BpResult};
use crate::lp::{LpProblem, LpSolver, LpStatus, Sense};
use crate::model::{Instance, PatternPool, PatternVariable, PoolId};

const INTEGRALITY_TOL: f64 = 1e-5;

/// Dual prices from the most recent master solve. `mu[j]` is the item-consistency dual for item
/// `j`; `pi[0]` is the P0 convexity dual, `pi[1 + i]` is bin `i`'s convexity dual; `tau` is the
/// optional UB-row dual (`0.0` when no UB constraint was built).
#[derive(Debug, Clone)]
pub struct DualValues {
    pub mu: Vec<f64>,
    pub pi: Vec<f64>,
    pub tau: f64,
}

/// The master's fractional solution in pattern space.
#[derive(Debug, Clone, Default)]
pub struct DWSolution {
    pub y: HashMap<PatternVariable, f64>,
    pub s: Vec<f64>,
}

/// `t_j` / `x_ij` derived from a [`DWSolution`] per the data model (§3): `t_j` is the P0 coverage
/// of item `j`, `x_ij` is bin `i`'s coverage of item `j`.
#[derive(Debug, Clone)]
pub struct L2Solution {
    pub t: Vec<f64>,
    pub x: Vec<Vec<f64>>,
}

/// A concrete item-to-bin assignment: each item (column) is assigned to at most one bin.
#[derive(Debug, Clone)]
pub struct ClassicSolution {
    pub assign: Vec<Vec<bool>>,
}

impl ClassicSolution {
    /// Total profit of assigned items, recomputed from the assignment rather than trusted from
    /// whichever LP bound produced it — the ground truth the round-trip property (§8) checks.
    pub fn objective(&self, instance: &Instance) -> u64 {
        let mut total = 0u64;
        for row in &self.assign {
            for (j, &assigned) in row.iter().enumerate() {
                if assigned {
                    total += instance.items[j].profit;
                }
            }
        }
        total
    }
}

fn is_integral(v: f64) -> bool {
    (v - v.round()).abs() <= INTEGRALITY_TOL
}

impl DWSolution {
    pub fn to_l2(&self, instance: &Instance) -> L2Solution {
        let n = instance.n_items();
        let m = instance.n_bins();
        let mut t = vec![0.0; n];
        let mut x = vec![vec![0.0; n]; m];
        for (pv, &val) in &self.y {
            if val <= 1e-12 {
                continue;
            }
            match pv.pool {
                PoolId::P0 => {
                    for j in pv.pattern.iter_items() {
                        t[j] += val;
                    }
                }
                PoolId::Pi(i) => {
                    for j in pv.pattern.iter_items() {
                        x[i][j] += val;
                    }
                }
            }
        }
        L2Solution { t, x }
    }
}

impl L2Solution {
    /// Whether every `t_j` is within tolerance of an integer.
    pub fn t_integral(&self) -> bool {
        self.t.iter().all(|&v| is_integral(v))
    }

    /// Whether every `x_ij` is within tolerance of an integer.
    pub fn x_integral(&self) -> bool {
        self.x.iter().all(|row| row.iter().all(|&v| is_integral(v)))
    }

    /// `{j : t_j ≈ 1}`, the set a fractional-repair call is asked to pack (§4.9).
    pub fn t_support(&self) -> Vec<usize> {
        self.t
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > 0.5)
            .map(|(j, _)| j)
            .collect()
    }

    /// The most fractional `t_j` (closest to 0.5 among non-integral entries), for branching
    /// (§4.7). `None` if `t` is already integral.
    pub fn most_fractional_t(&self) -> Option<usize> {
        self.t
            .iter()
            .enumerate()
            .filter(|&(_, &v)| !is_integral(v))
            .min_by(|&(ja, &va), &(jb, &vb)| {
                let da = (va - 0.5).abs();
                let db = (vb - 0.5).abs();
                da.partial_cmp(&db).unwrap().then(ja.cmp(&jb))
            })
            .map(|(j, _)| j)
    }

    /// Converts an integral solution into a [`ClassicSolution`]. Fails with
    /// [`BpError::IntegralityRequired`] if `t` or `x` is not integral.
    pub fn to_classic(&self, instance: &Instance) -> BpResult<ClassicSolution> {
        if !self.t_integral() || !self.x_integral() {
            return Err(BpError::IntegralityRequired);
        }
        let m = instance.n_bins();
        let n = instance.n_items();
        let mut assign = vec![vec![false; n]; m];
        for i in 0..m {
            for j in 0..n {
                if self.x[i][j] > 0.5 {
                    assign[i][j] = true;
                }
            }
        }
        Ok(ClassicSolution { assign })
    }
}

/// The result of one master LP solve.
#[derive(Debug, Clone)]
pub struct MasterSolution {
    pub status: LpStatus,
    pub objective: Option<f64>,
    pub duals: DualValues,
    pub dw: DWSolution,
}

/// Column/row bookkeeping for translating an [`LpProblem`]'s solution back into pattern space.
/// Kept alongside the built `LpProblem` so `solve_master` never has to rebuild it to extract.
struct LpIndex {
    pattern_vars: Vec<PatternVariable>,
    n_items: usize,
    n_bins: usize,
    has_ub: bool,
}

/// Builds the DW master LP (§4.4) from `pool`, `cuts`, and an optional finite `ub`.
fn build_lp(
    instance: &Instance,
    pool: &PatternPool,
    ub: Option<f64>,
    cuts: &[NoGoodCut],
) -> (LpProblem, LpIndex) {
    let n = instance.n_items();
    let m = instance.n_bins();
    let mut lp = LpProblem::new();
    let mut pattern_vars = Vec::new();

    let p0_patterns: Vec<_> = pool.iter_p0().collect();
    let mut p0_cols = Vec::with_capacity(p0_patterns.len());
    for p in &p0_patterns {
        let col = lp.add_variable(format!("y_p0_{}", p.gen_id), 0.0, 1.0, p.profit as f64);
        p0_cols.push(col);
        pattern_vars.push(PatternVariable {
            pattern: (*p).clone(),
            pool: PoolId::P0,
        });
    }

    let pi_patterns: Vec<Vec<_>> = (0..m).map(|i| pool.iter_pi(i).collect::<Vec<_>>()).collect();
    let mut pi_cols: Vec<Vec<usize>> = Vec::with_capacity(m);
    for (i, patterns) in pi_patterns.iter().enumerate() {
        let mut cols = Vec::with_capacity(patterns.len());
        for p in patterns {
            let col = lp.add_variable(format!("y_p{i}_{}", p.gen_id), 0.0, 1.0, 0.0);
            cols.push(col);
            pattern_vars.push(PatternVariable {
                pattern: (*p).clone(),
                pool: PoolId::Pi(i),
            });
        }
        pi_cols.push(cols);
    }

    let mut s_cols = Vec::with_capacity(n);
    for item in &instance.items {
        s_cols.push(lp.add_variable(format!("s_{}", item.id), 0.0, 1.0, -(item.profit as f64)));
    }

    // Item-consistency rows (dual mu_j).
    for j in 0..n {
        let mut coeffs = Vec::new();
        for (k, p) in p0_patterns.iter().enumerate() {
            if p.contains(j) {
                coeffs.push((p0_cols[k], 1.0));
            }
        }
        for i in 0..m {
            for (k, p) in pi_patterns[i].iter().enumerate() {
                if p.contains(j) {
                    coeffs.push((pi_cols[i][k], -1.0));
                }
            }
        }
        coeffs.push((s_cols[j], -1.0));
        lp.add_constraint(format!("item_{j}"), Sense::Le, 0.0, coeffs);
    }

    // Pool convexity rows (dual pi_0, pi_i), equality.
    let p0_conv: Vec<(usize, f64)> = p0_cols.iter().map(|&v| (v, 1.0)).collect();
    lp.add_constraint("conv_p0", Sense::Eq, 1.0, p0_conv);
    for i in 0..m {
        let coeffs: Vec<(usize, f64)> = pi_cols[i].iter().map(|&v| (v, 1.0)).collect();
        lp.add_constraint(format!("conv_p{i}"), Sense::Eq, 1.0, coeffs);
    }

    // Optional UB row (dual tau).
    let has_ub = ub.is_some();
    if let Some(ub) = ub {
        let coeffs: Vec<(usize, f64)> = p0_cols
            .iter()
            .zip(p0_patterns.iter())
            .map(|(&v, p)| (v, p.profit as f64))
            .collect();
        lp.add_constraint("ub", Sense::Le, ub, coeffs);
    }

    // No-good cuts (§4.8): P0-only, Sigma |a ∩ S| y_a <= |S| - 1.
    for (k, cut) in cuts.iter().enumerate() {
        let coeffs: Vec<(usize, f64)> = p0_cols
            .iter()
            .zip(p0_patterns.iter())
            .filter_map(|(&v, p)| {
                let overlap = cut.items.iter().filter(|&&j| p.contains(j)).count();
                (overlap > 0).then_some((v, overlap as f64))
            })
            .collect();
        let rhs = (cut.items.len() as f64) - 1.0;
        lp.add_constraint(format!("nogood_{k}"), Sense::Le, rhs, coeffs);
    }

    (
        lp,
        LpIndex {
            pattern_vars,
            n_items: n,
            n_bins: m,
            has_ub,
        },
    )
}

/// Builds the master LP, solves it with `solver`, and translates the result back into pattern
/// and dual space. Always returns a [`MasterSolution`]; a non-optimal `status` (infeasible,
/// unbounded, not solved) carries empty/default duals and an empty `dw`.
pub fn solve_master(
    instance: &Instance,
    pool: &PatternPool,
    ub: Option<f64>,
    cuts: &[NoGoodCut],
    solver: &dyn LpSolver,
    time_limit_secs: Option<f64>,
) -> MasterSolution {
    let (lp, index) = build_lp(instance, pool, ub, cuts);
    let sol = solver.solve(&lp, time_limit_secs);

    if sol.status != LpStatus::Optimal && sol.status != LpStatus::Feasible {
        return MasterSolution {
            status: sol.status,
            objective: sol.objective,
            duals: DualValues {
                mu: vec![0.0; index.n_items],
                pi: vec![0.0; index.n_bins + 1],
                tau: 0.0,
            },
            dw: DWSolution::default(),
        };
    }

    let n_pattern_cols = index.pattern_vars.len();
    let mut y = HashMap::with_capacity(n_pattern_cols);
    for (pv, &val) in index.pattern_vars.iter().zip(sol.primal[..n_pattern_cols].iter()) {
        y.insert(pv.clone(), val);
    }
    let s = sol.primal[n_pattern_cols..n_pattern_cols + index.n_items].to_vec();

    let mu = sol.duals[..index.n_items].to_vec();
    let mut pi = vec![0.0; index.n_bins + 1];
    for (k, slot) in pi.iter_mut().enumerate() {
        *slot = sol.duals[index.n_items + k];
    }
    let tau = if index.has_ub {
        sol.duals[index.n_items + index.n_bins + 1]
    } else {
        0.0
    };

    MasterSolution {
        status: sol.status,
        objective: sol.objective,
        duals: DualValues { mu, pi, tau },
        dw: DWSolution { y, s },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::BoundedSimplex;
    use crate::model::{Bin, GenIdCounter, Item, Pattern};
    use crate::pattern_init::seed_root_pool;

    fn tiny_instance() -> Instance {
        let items = vec![
            Item { id: 0, weight: 3, profit: 5 },
            Item { id: 1, weight: 4, profit: 6 },
        ];
        let bins = vec![Bin { id: 0, capacity: 5 }];
        Instance::new("t", items, bins).unwrap()
    }

    #[test]
    fn root_master_solves_to_optimal() {
        let instance = tiny_instance();
        let pool = seed_root_pool(&instance, &GenIdCounter::new()).unwrap();
        let solver = BoundedSimplex::new();
        let sol = solve_master(&instance, &pool, None, &[], &solver, None);
        assert_eq!(sol.status, LpStatus::Optimal);
        // Best single item fitting capacity 5 is item 0 (profit 5); item 1 alone doesn't fit
        // either bin pool content differently from P0, so optimum should be 5.
        assert!((sol.objective.unwrap() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn convexity_duals_have_one_per_pool() {
        let instance = tiny_instance();
        let pool = seed_root_pool(&instance, &GenIdCounter::new()).unwrap();
        let solver = BoundedSimplex::new();
        let sol = solve_master(&instance, &pool, None, &[], &solver, None);
        assert_eq!(sol.duals.pi.len(), instance.n_bins() + 1);
        assert_eq!(sol.duals.mu.len(), instance.n_items());
    }

    #[test]
    fn nogood_cut_forbids_exact_p0_support() {
        let instance = tiny_instance();
        let mut pool = PatternPool::new(instance.n_bins());
        pool.add_p0(&instance, Pattern::empty(2, 0)).unwrap();
        pool.add_p0(&instance, Pattern::from_items(&instance, &[0], 1)).unwrap();
        pool.add_pi(&instance, 0, Pattern::empty(2, 2)).unwrap();

        let cut = NoGoodCut::new(vec![0]);
        let solver = BoundedSimplex::new();
        let sol = solve_master(&instance, &pool, None, &[cut], &solver, None);
        assert_eq!(sol.status, LpStatus::Optimal);
        // y for pattern {0} in P0 is forced to 0 by the cut (|S|-1 = 0), so only the empty
        // pattern can carry convexity; objective collapses to 0.
        assert!((sol.objective.unwrap() - 0.0).abs() < 1e-5);
    }
}
