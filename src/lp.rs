//! The continuous-LP capability boundary (§6.2) and a reference backend.
//!
//! The master (C4) never builds a tableau itself: it constructs an [`LpProblem`] from the
//! current pattern pool and asks an [`LpSolver`] to solve it. `BoundedSimplex` is the in-process
//! reference implementation this crate ships; any other conforming solver can be substituted at
//! [`crate::driver::BranchAndPrice::new`].

use std::time::{Duration, Instant};

use ndarray::Array2;
use strum_macros::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
pub enum LpStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unbounded,
    Error,
    NotSolved,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub lb: f64,
    pub ub: f64,
    pub obj_coeff: f64,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub sense: Sense,
    pub rhs: f64,
    /// Sparse `(variable index, coefficient)` pairs.
    pub coeffs: Vec<(usize, f64)>,
}

/// A continuous LP: variables with bounds and objective coefficients, constraints with a sense
/// and a right-hand side. Built fresh for every column-generation iteration (§4.6 step 1).
#[derive(Debug, Clone, Default)]
pub struct LpProblem {
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
}

impl LpProblem {
    pub fn new() -> Self {
        LpProblem::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, lb: f64, ub: f64, obj_coeff: f64) -> usize {
        let idx = self.variables.len();
        self.variables.push(Variable {
            name: name.into(),
            lb,
            ub,
            obj_coeff,
        });
        idx
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        sense: Sense,
        rhs: f64,
        coeffs: Vec<(usize, f64)>,
    ) -> usize {
        let idx = self.constraints.len();
        self.constraints.push(Constraint {
            name: name.into(),
            sense,
            rhs,
            coeffs,
        });
        idx
    }

    pub fn n_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }
}

#[derive(Debug, Clone)]
pub struct LpSolution {
    pub status: LpStatus,
    pub objective: Option<f64>,
    /// Per variable, in `LpProblem.variables` order.
    pub primal: Vec<f64>,
    /// Per constraint, in `LpProblem.constraints` order.
    pub duals: Vec<f64>,
    /// Per variable, in `LpProblem.variables` order.
    pub reduced_costs: Vec<f64>,
}

impl LpSolution {
    fn not_solved(n_vars: usize, n_constraints: usize, status: LpStatus) -> Self {
        LpSolution {
            status,
            objective: None,
            primal: vec![0.0; n_vars],
            duals: vec![0.0; n_constraints],
            reduced_costs: vec![0.0; n_vars],
        }
    }
}

/// The LP solver capability boundary (§6.2). Implementations are swappable at construction time.
pub trait LpSolver {
    fn solve(&self, problem: &LpProblem, time_limit_secs: Option<f64>) -> LpSolution;
}

const EPS: f64 = 1e-9;
const MAX_ITERATIONS: usize = 20_000;

/// A dense two-phase primal simplex over nonnegative shifted variables. Variable upper bounds are
/// materialized as explicit `x <= ub` rows rather than via bounded-variable pivoting rules: the
/// LPs this crate builds are small (patterns number in the hundreds at most), so the simpler,
/// easier-to-get-right formulation is preferred over the bookkeeping of an upper-bounding simplex.
#[derive(Debug, Default)]
pub struct BoundedSimplex;

impl BoundedSimplex {
    pub fn new() -> Self {
        BoundedSimplex
    }
}

struct Row {
    coeffs: Vec<f64>,
    sense: Sense,
    rhs: f64,
    /// `Some(var)` for an auto-generated `var <= ub` bound row; `None` for a user constraint.
    bound_row_for: Option<usize>,
    user_constraint_idx: Option<usize>,
}

struct Tableau {
    matrix: Array2<f64>, // (m, n_total)
    rhs: Vec<f64>,       // (m,)
    obj_row: Vec<f64>,   // (n_total,)
    obj_rhs: f64,
    basis: Vec<usize>,
    n_total: usize,
}

impl Tableau {
    fn pivot(&mut self, prow: usize, pcol: usize) {
        let pivot_val = self.matrix[[prow, pcol]];
        for j in 0..self.n_total {
            self.matrix[[prow, j]] /= pivot_val;
        }
        self.rhs[prow] /= pivot_val;

        let m = self.matrix.nrows();
        for r in 0..m {
            if r == prow {
                continue;
            }
            let factor = self.matrix[[r, pcol]];
            if factor.abs() > EPS {
                for j in 0..self.n_total {
                    let sub = factor * self.matrix[[prow, j]];
                    self.matrix[[r, j]] -= sub;
                }
                self.rhs[r] -= factor * self.rhs[prow];
            }
        }

        let factor = self.obj_row[pcol];
        if factor.abs() > EPS {
            for j in 0..self.n_total {
                self.obj_row[j] -= factor * self.matrix[[prow, j]];
            }
            self.obj_rhs -= factor * self.rhs[prow];
        }

        self.basis[prow] = pcol;
    }

    /// Runs primal simplex to optimality against the current `obj_row`/`obj_rhs`, which the
    /// caller has already initialized (including pricing out the initial basis). Returns `true`
    /// if optimal was reached, `false` if unbounded.
    fn run(&mut self, forbidden: &[bool], deadline: Option<Instant>) -> Option<bool> {
        for _iter in 0..MAX_ITERATIONS {
            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    return None;
                }
            }

            let mut enter: Option<usize> = None;
            let mut best = -EPS;
            for j in 0..self.n_total {
                if forbidden[j] {
                    continue;
                }
                if self.obj_row[j] < best {
                    best = self.obj_row[j];
                    enter = Some(j);
                }
            }
            let Some(pcol) = enter else {
                return Some(true);
            };

            let mut leave: Option<usize> = None;
            let mut best_ratio = f64::INFINITY;
            for i in 0..self.matrix.nrows() {
                let a = self.matrix[[i, pcol]];
                if a > EPS {
                    let ratio = self.rhs[i] / a;
                    if ratio < best_ratio - EPS
                        || ((ratio - best_ratio).abs() <= EPS
                            && leave.map(|l| self.basis[i] < self.basis[l]).unwrap_or(true))
                    {
                        best_ratio = ratio;
                        leave = Some(i);
                    }
                }
            }
            let Some(prow) = leave else {
                return Some(false);
            };

            self.pivot(prow, pcol);
        }
        None
    }
}

impl LpSolver for BoundedSimplex {
    fn solve(&self, problem: &LpProblem, time_limit_secs: Option<f64>) -> LpSolution {
        let deadline = time_limit_secs.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
        let n = problem.n_vars();

        // Shift every variable to a nonnegative one: y_j = x_j - lb_j.
        let lb: Vec<f64> = problem.variables.iter().map(|v| v.lb).collect();

        let mut rows: Vec<Row> = Vec::new();
        for (ci, c) in problem.constraints.iter().enumerate() {
            let mut coeffs = vec![0.0; n];
            let mut rhs = c.rhs;
            for &(j, a) in &c.coeffs {
                coeffs[j] = a;
                rhs -= a * lb[j];
            }
            rows.push(Row {
                coeffs,
                sense: c.sense,
                rhs,
                bound_row_for: None,
                user_constraint_idx: Some(ci),
            });
        }
        for (j, v) in problem.variables.iter().enumerate() {
            if v.ub.is_finite() {
                let mut coeffs = vec![0.0; n];
                coeffs[j] = 1.0;
                rows.push(Row {
                    coeffs,
                    sense: Sense::Le,
                    rhs: v.ub - v.lb,
                    bound_row_for: Some(j),
                    user_constraint_idx: None,
                });
            }
        }

        let m = rows.len();
        if m == 0 {
            // No constraints at all: optimum is at whichever bound maximizes each term independently.
            let mut primal = vec![0.0; n];
            let mut obj = 0.0;
            for (j, v) in problem.variables.iter().enumerate() {
                let x = if v.obj_coeff >= 0.0 { v.ub } else { v.lb };
                let x = if x.is_finite() { x } else { v.lb };
                primal[j] = x;
                obj += v.obj_coeff * x;
            }
            return LpSolution {
                status: LpStatus::Optimal,
                objective: Some(obj),
                primal,
                duals: Vec::new(),
                reduced_costs: vec![0.0; n],
            };
        }

        // Normalize so every row has rhs >= 0.
        let mut flip_sign = vec![1.0f64; m];
        for (i, row) in rows.iter_mut().enumerate() {
            if row.rhs < 0.0 {
                flip_sign[i] = -1.0;
                row.rhs = -row.rhs;
                for a in row.coeffs.iter_mut() {
                    *a = -*a;
                }
                row.sense = match row.sense {
                    Sense::Le => Sense::Ge,
                    Sense::Ge => Sense::Le,
                    Sense::Eq => Sense::Eq,
                };
            }
        }

        // Assign extra columns: slack for Le, surplus+artificial for Ge, artificial for Eq.
        let mut extra_col_for_row = vec![0usize; m]; // the "identity" column (slack or artificial)
        let mut n_total = n;
        let mut has_artificial = vec![false; m];
        let mut col_layout: Vec<(usize, Sense)> = Vec::new(); // (row, kind) for extra columns, in creation order
        for (i, row) in rows.iter().enumerate() {
            match row.sense {
                Sense::Le => {
                    col_layout.push((i, Sense::Le));
                    extra_col_for_row[i] = n_total;
                    n_total += 1;
                }
                Sense::Ge => {
                    col_layout.push((i, Sense::Ge)); // surplus, coefficient -1
                    n_total += 1;
                    col_layout.push((i, Sense::Eq)); // artificial, coefficient +1, tagged as Eq-kind (identity)
                    extra_col_for_row[i] = n_total;
                    has_artificial[i] = true;
                    n_total += 1;
                }
                Sense::Eq => {
                    col_layout.push((i, Sense::Eq));
                    extra_col_for_row[i] = n_total;
                    has_artificial[i] = true;
                    n_total += 1;
                }
            }
        }

        let mut matrix = Array2::<f64>::zeros((m, n_total));
        let mut rhs = vec![0.0; m];
        for (i, row) in rows.iter().enumerate() {
            for j in 0..n {
                matrix[[i, j]] = row.coeffs[j];
            }
            rhs[i] = row.rhs;
        }
        let mut col_cursor = n;
        for (row_i, kind) in &col_layout {
            match kind {
                Sense::Le => matrix[[*row_i, col_cursor]] = 1.0,
                Sense::Ge => matrix[[*row_i, col_cursor]] = -1.0,
                Sense::Eq => matrix[[*row_i, col_cursor]] = 1.0,
            }
            col_cursor += 1;
        }

        let basis: Vec<usize> = (0..m).map(|i| extra_col_for_row[i]).collect();
        let any_artificial = has_artificial.iter().any(|&b| b);

        let mut forbidden = vec![false; n_total];
        // Surplus columns (the non-identity half of a Ge row's pair) never leave forbidden in
        // phase 1/2 selection logic below; they are ordinary columns and may enter freely.

        // Phase 1: drive artificials to zero.
        if any_artificial {
            let mut phase1_cost = vec![0.0; n_total];
            for (i, &art) in has_artificial.iter().enumerate() {
                if art {
                    phase1_cost[extra_col_for_row[i]] = -1.0;
                }
            }
            let mut tableau = Tableau {
                matrix: matrix.clone(),
                rhs: rhs.clone(),
                obj_row: phase1_cost.iter().map(|c| -c).collect(),
                obj_rhs: 0.0,
                basis: basis.clone(),
                n_total,
            };
            for i in 0..m {
                // Price the initial (possibly nonzero-cost) basis out of the objective row, the
                // same way a real pivot would: factor is the row's *current* reduced cost, not
                // its raw objective coefficient.
                let factor = tableau.obj_row[tableau.basis[i]];
                if factor.abs() > EPS {
                    for j in 0..n_total {
                        tableau.obj_row[j] -= factor * tableau.matrix[[i, j]];
                    }
                    tableau.obj_rhs -= factor * tableau.rhs[i];
                }
            }

            match tableau.run(&forbidden, deadline) {
                None => return LpSolution::not_solved(n, problem.n_constraints(), LpStatus::NotSolved),
                Some(false) => {
                    // Phase 1 is a feasibility problem; it cannot be unbounded in a well-formed
                    // model, but guard defensively.
                    return LpSolution::not_solved(n, problem.n_constraints(), LpStatus::Error);
                }
                Some(true) => {}
            }

            if tableau.obj_rhs < -1e-6 {
                return LpSolution::not_solved(n, problem.n_constraints(), LpStatus::Infeasible);
            }

            matrix = tableau.matrix;
            rhs = tableau.rhs;
            for (i, &art) in has_artificial.iter().enumerate() {
                if art {
                    forbidden[extra_col_for_row[i]] = true;
                }
            }
            return finish_phase2(
                problem, &lb, matrix, rhs, tableau.basis, forbidden, n, n_total, m, &rows,
                &extra_col_for_row, &flip_sign, deadline,
            );
        }

        finish_phase2(
            problem, &lb, matrix, rhs, basis, forbidden, n, n_total, m, &rows,
            &extra_col_for_row, &flip_sign, deadline,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn finish_phase2(
    problem: &LpProblem,
    lb: &[f64],
    matrix: Array2<f64>,
    rhs: Vec<f64>,
    basis: Vec<usize>,
    forbidden: Vec<bool>,
    n: usize,
    n_total: usize,
    m: usize,
    rows: &[Row],
    extra_col_for_row: &[usize],
    flip_sign: &[f64],
    deadline: Option<Instant>,
) -> LpSolution {
    let mut cost = vec![0.0; n_total];
    for (j, v) in problem.variables.iter().enumerate() {
        cost[j] = v.obj_coeff;
    }

    let mut tableau = Tableau {
        matrix,
        rhs,
        obj_row: cost.iter().map(|c| -c).collect(),
        obj_rhs: 0.0,
        basis,
        n_total,
    };
    for i in 0..m {
        let factor = tableau.obj_row[tableau.basis[i]];
        if factor.abs() > EPS {
            for j in 0..n_total {
                tableau.obj_row[j] -= factor * tableau.matrix[[i, j]];
            }
            tableau.obj_rhs -= factor * tableau.rhs[i];
        }
    }

    match tableau.run(&forbidden, deadline) {
        None => return LpSolution::not_solved(n, problem.n_constraints(), LpStatus::NotSolved),
        Some(false) => return LpSolution::not_solved(n, problem.n_constraints(), LpStatus::Unbounded),
        Some(true) => {}
    }

    let mut y = vec![0.0; n];
    for i in 0..m {
        if tableau.basis[i] < n {
            y[tableau.basis[i]] = tableau.rhs[i];
        }
    }
    let primal: Vec<f64> = y
        .iter()
        .zip(lb.iter())
        .map(|(&yj, &lbj)| yj + lbj)
        .collect();

    // tableau.obj_rhs is cost·y over the shifted variables; translate back by the constant
    // cost·lb that the y = x - lb shift dropped.
    let mut objective = tableau.obj_rhs;
    for (j, v) in problem.variables.iter().enumerate() {
        objective += v.obj_coeff * lb[j];
    }

    let reduced_costs: Vec<f64> = (0..n).map(|j| tableau.obj_row[j]).collect();

    let mut duals = vec![0.0; problem.n_constraints()];
    for (i, row) in rows.iter().enumerate() {
        if let Some(ci) = row.user_constraint_idx {
            let col = extra_col_for_row[i];
            duals[ci] = flip_sign[i] * tableau.obj_row[col];
        }
    }

    LpSolution {
        status: LpStatus::Optimal,
        objective: Some(objective),
        primal,
        duals,
        reduced_costs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_le_constraint() {
        let mut p = LpProblem::new();
        let x = p.add_variable("x", 0.0, f64::INFINITY, 1.0);
        p.add_constraint("c0", Sense::Le, 5.0, vec![(x, 1.0)]);

        let solver = BoundedSimplex::new();
        let sol = solver.solve(&p, None);
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.objective.unwrap() - 5.0).abs() < 1e-6);
        assert!((sol.primal[x] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn bounded_variable_caps_at_its_own_upper_bound() {
        let mut p = LpProblem::new();
        let x = p.add_variable("x", 0.0, 1.0, 1.0);
        p.add_constraint("c0", Sense::Le, 5.0, vec![(x, 1.0)]);

        let solver = BoundedSimplex::new();
        let sol = solver.solve(&p, None);
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.primal[x] - 1.0).abs() < 1e-6);
        assert!((sol.objective.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equality_convexity_constraint() {
        let mut p = LpProblem::new();
        let a = p.add_variable("a", 0.0, 1.0, 3.0);
        let b = p.add_variable("b", 0.0, 1.0, 5.0);
        p.add_constraint("conv", Sense::Eq, 1.0, vec![(a, 1.0), (b, 1.0)]);

        let solver = BoundedSimplex::new();
        let sol = solver.solve(&p, None);
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.primal[a] + sol.primal[b] - 1.0).abs() < 1e-6);
        assert!((sol.objective.unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn detects_infeasibility() {
        let mut p = LpProblem::new();
        let x = p.add_variable("x", 0.0, 1.0, 1.0);
        p.add_constraint("c0", Sense::Ge, 2.0, vec![(x, 1.0)]);

        let solver = BoundedSimplex::new();
        let sol = solver.solve(&p, None);
        assert_eq!(sol.status, LpStatus::Infeasible);
    }

    #[test]
    fn detects_unboundedness() {
        let mut p = LpProblem::new();
        let x = p.add_variable("x", 0.0, f64::INFINITY, 1.0);
        p.add_constraint("c0", Sense::Ge, 0.0, vec![(x, 1.0)]);

        let solver = BoundedSimplex::new();
        let sol = solver.solve(&p, None);
        assert_eq!(sol.status, LpStatus::Unbounded);
    }
}
