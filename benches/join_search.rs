use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use robust_opt_framework::config::RobustConfig;
use robust_opt_framework::cost::SimpleCostModel;
use robust_opt_framework::dp::DpOptimizer;
use robust_opt_framework::optimizer::{Optimizer, OptimizerContext};
use robust_opt_framework::query::JoinQuery;
use robust_opt_framework::relset::RelSet;
use robust_opt_framework::stat::FeedbackStore;

/// Chain of `n` relations with a feedback history on every adjacent pair.
fn workload(n: usize) -> (JoinQuery, SimpleCostModel, FeedbackStore) {
    let mut query = JoinQuery::new();
    let mut model = SimpleCostModel::new();
    let stats = FeedbackStore::new();
    for i in 0..n {
        query.add_relation(format!("t{}", i));
        model.add_relation(1_000.0 * (1 + i % 4) as f64);
        if i > 0 {
            model.add_join_edge(i - 1, i, 0.001);
            for k in 0..16 {
                stats.record_log_error(RelSet::from_ids([i - 1, i]), (k as f64 - 8.0) * 0.25);
            }
        }
    }
    (query, model, stats)
}

fn join_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_search");
    for n in [4, 6, 8] {
        for (name, config) in [
            ("cost_only", RobustConfig {
                main_objective_id: 3,
                retain_strategy_id: 3,
                final_score_id: 3,
                error_sample_seed: Some(1),
                ..RobustConfig::default()
            }),
            ("robust", RobustConfig {
                main_objective_id: 11,
                retain_strategy_id: 13,
                final_score_id: 0,
                add_path_limit: 4,
                retain_path_limit: 2,
                error_sample_seed: Some(1),
                ..RobustConfig::default()
            }),
        ] {
            let (query, model, stats) = workload(n);
            let ctx = OptimizerContext::new(config, Arc::new(model), Arc::new(stats))
                .expect("valid benchmark configuration");
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
                b.iter(|| {
                    DpOptimizer::new(black_box(query.clone()), ctx.clone())
                        .find_best_plan()
                        .expect("chain query is feasible")
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, join_search);
criterion_main!(benches);
