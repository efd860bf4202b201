//! Knapsack-based pricing subproblems (C5, §4.5).
//!
//! Each pool gets a single 0/1 knapsack call per column-generation iteration: the score vector is
//! built from the current duals, branching fixings are folded into the candidate set (forbidden
//! items excluded, required items pre-included for P0 only), and a pattern is emitted iff its
//! reduced cost clears the `1e-6` tolerance.

use std::collections::HashMap;

use crate::knapsack;
use crate::master::DualValues;
use crate::model::{GenIdCounter, Instance, Pattern};

const RC_TOLERANCE: f64 = 1e-6;

/// Prices P0: score `rho_j = p_j*(1-tau) - mu_j`, capacity `total_capacity`. Required items are
/// pre-included (their weight pre-debited, their score pre-added); forbidden items are excluded
/// from the DP entirely. Returns `None` if no improving column exists, or if the required items
/// alone already exceed capacity.
pub fn price_p0(
    instance: &Instance,
    duals: &DualValues,
    fixings: &HashMap<usize, bool>,
    gen_ids: &GenIdCounter,
) -> Option<Pattern> {
    let capacity = instance.total_capacity();
    let tau = duals.tau;
    let pi0 = duals.pi[0];

    let mut required = Vec::new();
    let mut required_weight = 0u64;
    let mut base_score = 0.0f64;
    let mut cand_ids = Vec::new();
    let mut cand_weights = Vec::new();
    let mut cand_scores = Vec::new();

    for item in &instance.items {
        let j = item.id;
        match fixings.get(&j) {
            Some(false) => continue, // forbidden
            Some(true) => {
                required.push(j);
                required_weight += item.weight;
                base_score += item.profit as f64 * (1.0 - tau) - duals.mu[j];
            }
            None => {
                cand_ids.push(j);
                cand_weights.push(item.weight);
                cand_scores.push(item.profit as f64 * (1.0 - tau) - duals.mu[j]);
            }
        }
    }

    if required_weight > capacity {
        return None;
    }
    let remaining_capacity = capacity - required_weight;

    let (chosen, dp_value) = knapsack::solve(&cand_weights, &cand_scores, remaining_capacity);
    let reduced_cost = base_score + dp_value - pi0;
    if reduced_cost <= RC_TOLERANCE {
        return None;
    }

    let mut selected = required;
    selected.extend(chosen.into_iter().map(|k| cand_ids[k]));
    Some(Pattern::from_items(instance, &selected, gen_ids.next()))
}

/// Prices `Pi(bin_id)`: score `rho_j = mu_j`, capacity `capacity(bin_id)`. Only forbidden items
/// are excluded; required items are a P0-only concern here.
pub fn price_pi(
    instance: &Instance,
    bin_id: usize,
    duals: &DualValues,
    fixings: &HashMap<usize, bool>,
    gen_ids: &GenIdCounter,
) -> Option<Pattern> {
    let capacity = instance.capacity(bin_id);
    let pi_bin = duals.pi[1 + bin_id];

    let mut cand_ids = Vec::new();
    let mut cand_weights = Vec::new();
    let mut cand_scores = Vec::new();
    for item in &instance.items {
        let j = item.id;
        if fixings.get(&j) == Some(&false) {
            continue;
        }
        cand_ids.push(j);
        cand_weights.push(item.weight);
        cand_scores.push(duals.mu[j]);
    }

    let (chosen, dp_value) = knapsack::solve(&cand_weights, &cand_scores, capacity);
    let reduced_cost = dp_value - pi_bin;
    if reduced_cost <= RC_TOLERANCE {
        return None;
    }

    let selected: Vec<usize> = chosen.into_iter().map(|k| cand_ids[k]).collect();
    Some(Pattern::from_items(instance, &selected, gen_ids.next()))
}
