//! 0/1 knapsack DP with arbitrary (possibly negative) per-item scores (C2).
//!
//! This is the workhorse both the pattern initializer (§4.3) and the pricing subproblems (§4.5)
//! build on: "pick the best-scoring subset of items that fits in a capacity" is the one primitive
//! both need, with the score vector swapped out each time (raw profits for initialization,
//! reduced-cost scores for pricing).

use ndarray::Array2;

/// Solves `max Σ values[j]` subject to `Σ weights[j] ≤ capacity`, `j` ranging over a 0/1 choice
/// per item. `values` may contain zero or negative entries; such items are only included when
/// doing so strictly improves the objective, so they are never force-included on a tie.
///
/// Returns the selected item indices (ascending) and the achieved objective value.
pub fn solve(weights: &[u64], values: &[f64], capacity: u64) -> (Vec<usize>, f64) {
    let n = weights.len();
    let cap = capacity as usize;

    if n == 0 || cap == 0 {
        return (Vec::new(), 0.0);
    }

    // dp[i][c] = best achievable value using the first i items with capacity budget c.
    let mut dp = Array2::<f64>::zeros((n + 1, cap + 1));
    // choice[i][c] = true iff item i-1 is included in the optimal solution for dp[i][c].
    let mut choice = vec![vec![false; cap + 1]; n + 1];

    for i in 1..=n {
        let w = weights[i - 1] as usize;
        let v = values[i - 1];
        for c in 0..=cap {
            let without = dp[[i - 1, c]];
            if w <= c {
                let with = dp[[i - 1, c - w]] + v;
                if with > without {
                    dp[[i, c]] = with;
                    choice[i][c] = true;
                    continue;
                }
            }
            dp[[i, c]] = without;
        }
    }

    let best_value = dp[[n, cap]];
    let mut selected = Vec::new();
    let mut c = cap;
    for i in (1..=n).rev() {
        if choice[i][c] {
            selected.push(i - 1);
            c -= weights[i - 1] as usize;
        }
    }
    selected.reverse();

    (selected, best_value)
}
