use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mkp_bp::driver::{BranchAndPrice, SolveConfig};
use mkp_bp::knapsack;
use mkp_bp::lp::BoundedSimplex;
use mkp_bp::model::{Bin, GenIdCounter, Instance, Item};
use mkp_bp::pattern_init::seed_root_pool;
use mkp_bp::repair::BacktrackingPacker;

/// A mid-sized instance exercising every subsystem: big enough that column generation and
/// branching actually run a handful of iterations, small enough to stay fast under criterion's
/// sampling.
fn bench_instance() -> Instance {
    let items: Vec<Item> = (0..18)
        .map(|id| Item {
            id,
            weight: 3 + (id as u64 * 7) % 19,
            profit: 5 + (id as u64 * 11) % 23,
        })
        .collect();
    let bins = vec![
        Bin { id: 0, capacity: 40 },
        Bin { id: 1, capacity: 35 },
        Bin { id: 2, capacity: 28 },
    ];
    Instance::new("bench", items, bins).unwrap()
}

fn bench_knapsack_dp(c: &mut Criterion) {
    let instance = bench_instance();
    let weights: Vec<u64> = instance.items.iter().map(|it| it.weight).collect();
    let values: Vec<f64> = instance.items.iter().map(|it| it.profit as f64).collect();
    let capacity = instance.total_capacity();

    c.bench_function("knapsack_dp", |b| {
        b.iter(|| knapsack::solve(black_box(&weights), black_box(&values), black_box(capacity)))
    });
}

fn bench_root_master_lp(c: &mut Criterion) {
    let instance = bench_instance();
    let pool = seed_root_pool(&instance, &GenIdCounter::new()).unwrap();
    let solver = BoundedSimplex::new();

    c.bench_function("root_master_lp", |b| {
        b.iter(|| {
            mkp_bp::master::solve_master(
                black_box(&instance),
                black_box(&pool),
                None,
                &[],
                &solver,
                None,
            )
        })
    });
}

/// End-to-end exact solve. Dominated by branch-and-bound wall time rather than any single
/// subsystem, so this is the number that matters for regressions in the overall search, not a
/// microbenchmark of one component.
fn bench_full_solve(c: &mut Criterion) {
    let instance = bench_instance();

    c.bench_function("full_solve", |b| {
        b.iter(|| {
            let bp = BranchAndPrice::new(
                black_box(&instance),
                Box::new(BoundedSimplex::new()),
                Box::new(BacktrackingPacker::new()),
                SolveConfig::default(),
            );
            bp.solve().unwrap()
        })
    });
}

criterion_group!(benches, bench_knapsack_dp, bench_root_master_lp, bench_full_solve);
criterion_main!(benches);
