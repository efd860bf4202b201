//! Pattern pool seeding (C3, §4.3).
//!
//! The initializer is the only code allowed to seed a pool from scratch; column generation (C6)
//! only ever adds to what this module plants. Deduplication happens for free on insertion
//! (`PatternPool` is content-unique), so every helper below just proposes candidates.

use rand::seq::SliceRandom;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::BpResult;
use crate::knapsack;
use crate::model::{GenIdCounter, Instance, Pattern, PatternPool, PoolId};

/// Fixed so that every run seeds identical "shuffled greedy" patterns; determinism here matters
/// for reproducible column generation traces, not for solution quality.
const SHUFFLE_SEED: u64 = 0x6d6b705f627000; // "mkp_bp" in hex-ish, non-semantic.

/// A greedy packing: scan items in `order`, add an item if it still fits.
fn greedy_pack(instance: &Instance, order: &[usize], capacity: u64) -> Vec<usize> {
    let mut weight = 0u64;
    let mut selected = Vec::new();
    for &j in order {
        let w = instance.items[j].weight;
        if weight + w <= capacity {
            weight += w;
            selected.push(j);
        }
    }
    selected
}

fn orderings(instance: &Instance) -> Vec<Vec<usize>> {
    let n = instance.n_items();
    let mut by_ratio_desc: Vec<usize> = (0..n).collect();
    by_ratio_desc.sort_by(|&a, &b| {
        let ra = instance.items[a].profit as u128 * instance.items[b].weight as u128;
        let rb = instance.items[b].profit as u128 * instance.items[a].weight as u128;
        rb.cmp(&ra)
    });

    let mut by_profit_desc: Vec<usize> = (0..n).collect();
    by_profit_desc.sort_by(|&a, &b| instance.items[b].profit.cmp(&instance.items[a].profit));

    let mut by_weight_asc: Vec<usize> = (0..n).collect();
    by_weight_asc.sort_by(|&a, &b| instance.items[a].weight.cmp(&instance.items[b].weight));

    let mut by_ratio_asc = by_ratio_desc.clone();
    by_ratio_asc.reverse();

    let mut shuffled: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(SHUFFLE_SEED);
    shuffled.shuffle(&mut rng);

    vec![by_ratio_desc, by_profit_desc, by_weight_asc, by_ratio_asc, shuffled]
}

/// Seeds a single pool (identified by `pool`, with capacity `capacity`) per §4.3 steps 1-5.
fn seed_pool(
    instance: &Instance,
    pool: PoolId,
    capacity: u64,
    pool_out: &mut PatternPool,
    gen_ids: &GenIdCounter,
) -> BpResult<()> {
    let n = instance.n_items();

    // 1. Empty pattern.
    insert(instance, pool, pool_out, Pattern::empty(n, gen_ids.next()))?;

    // 2. Singletons that fit.
    for item in &instance.items {
        if item.weight <= capacity {
            let p = Pattern::from_items(instance, &[item.id], gen_ids.next());
            insert(instance, pool, pool_out, p)?;
        }
    }

    // 3. Greedy packings under several orderings.
    for order in orderings(instance) {
        let selected = greedy_pack(instance, &order, capacity);
        let p = Pattern::from_items(instance, &selected, gen_ids.next());
        insert(instance, pool, pool_out, p)?;
    }

    // 4. Capacity-optimal core pattern via the knapsack DP on raw profits.
    let weights: Vec<u64> = instance.items.iter().map(|it| it.weight).collect();
    let values: Vec<f64> = instance.items.iter().map(|it| it.profit as f64).collect();
    let (core, _) = knapsack::solve(&weights, &values, capacity);
    let core_pattern = Pattern::from_items(instance, &core, gen_ids.next());
    insert(instance, pool, pool_out, core_pattern)?;

    // 5. All feasible pairs, for small instances.
    if n <= 20 {
        for a in 0..n {
            for b in (a + 1)..n {
                let w = instance.items[a].weight + instance.items[b].weight;
                if w <= capacity {
                    let p = Pattern::from_items(instance, &[a, b], gen_ids.next());
                    insert(instance, pool, pool_out, p)?;
                }
            }
        }
    }

    Ok(())
}

fn insert(
    instance: &Instance,
    pool: PoolId,
    pool_out: &mut PatternPool,
    p: Pattern,
) -> BpResult<()> {
    match pool {
        PoolId::P0 => {
            pool_out.add_p0(instance, p)?;
        }
        PoolId::Pi(i) => {
            pool_out.add_pi(instance, i, p)?;
        }
    }
    Ok(())
}

/// Builds the root pattern pool for `instance`: seeds P0 (capacity = total capacity) and every
/// Pi(bin_id) (capacity = that bin's capacity).
///
/// Takes `gen_ids` rather than starting a fresh counter so that every pattern seeded here and
/// every pattern priced later (§4.5) during the same run draws from one monotone sequence — two
/// independent counters could otherwise tag an init-seeded pattern and a priced pattern with the
/// same `gen_id`, and thus the same LP variable name (§4.4's naming contract requires uniqueness).
pub fn seed_root_pool(instance: &Instance, gen_ids: &GenIdCounter) -> BpResult<PatternPool> {
    let mut pool = PatternPool::new(instance.n_bins());

    seed_pool(instance, PoolId::P0, instance.total_capacity(), &mut pool, gen_ids)?;
    for bin in &instance.bins {
        seed_pool(instance, PoolId::Pi(bin.id), bin.capacity, &mut pool, gen_ids)?;
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bin, Item};

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
    fn seeds_empty_pattern_in_every_pool() {
        let instance = small_instance();
        let pool = seed_root_pool(&instance, &GenIdCounter::new()).unwrap();
        assert!(pool.iter_p0().any(|p| p.is_empty()));
        for bin in &instance.bins {
            assert!(pool.iter_pi(bin.id).any(|p| p.is_empty()));
        }
    }

    #[test]
    fn seeds_feasible_singletons_only() {
        let instance = small_instance();
        let pool = seed_root_pool(&instance, &GenIdCounter::new()).unwrap();
        for p in pool.iter_pi(1) {
            assert!(p.weight <= instance.capacity(1));
        }
    }

    #[test]
    fn all_pairs_seeded_for_small_n() {
        let instance = small_instance();
        let pool = seed_root_pool(&instance, &GenIdCounter::new()).unwrap();
        // pair (3,4): weights 2+1=3 <= total_capacity(13)
        assert!(pool
            .iter_p0()
            .any(|p| p.contains(3) && p.contains(4) && p.iter_items().count() == 2));
    }

    #[test]
    fn pool_stays_content_unique_after_seeding() {
        let instance = small_instance();
        let pool = seed_root_pool(&instance, &GenIdCounter::new()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for p in pool.iter_p0() {
            assert!(seen.insert(p.bits().to_bitvec()));
        }
    }
}
