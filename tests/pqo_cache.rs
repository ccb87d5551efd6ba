use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use robust_opt_framework::config::RobustConfig;
use robust_opt_framework::cost::SimpleCostModel;
use robust_opt_framework::dp::DpOptimizer;
use robust_opt_framework::error::OptResult;
use robust_opt_framework::optimizer::{Optimizer, OptimizerContext};
use robust_opt_framework::plan::Plan;
use robust_opt_framework::pqo::{
    BindingBucketer, CacheLookup, ParameterBinding, PqoManager, TemplateId,
};
use robust_opt_framework::query::JoinQuery;
use robust_opt_framework::stat::NoStatistics;

fn query() -> JoinQuery {
    JoinQuery::new()
        .with_relation("orders")
        .with_relation("customers")
        .with_relation("nations")
}

/// Binding position `i` is the filter selectivity of relation `i`.
fn model(binding: &ParameterBinding) -> SimpleCostModel {
    let mut model = SimpleCostModel::new()
        .with_relation(1_000_000.0)
        .with_relation(50_000.0)
        .with_relation(25.0)
        .with_join_edge(0, 1, 1.0 / 50_000.0)
        .with_join_edge(1, 2, 1.0 / 25.0)
        .with_index(1);
    for (rel, selectivity) in binding.selectivities().iter().enumerate() {
        model.set_filter_selectivity(rel, *selectivity);
    }
    model
}

fn context(config: &RobustConfig, binding: &ParameterBinding) -> OptimizerContext {
    OptimizerContext::new(
        config.clone(),
        Arc::new(model(binding)),
        Arc::new(NoStatistics),
    )
    .unwrap()
}

fn config() -> RobustConfig {
    RobustConfig {
        add_path_limit: 4,
        retain_path_limit: 3,
        error_sample_seed: Some(17),
        ..RobustConfig::default()
    }
}

fn compile(config: &RobustConfig) -> impl Fn(&ParameterBinding) -> OptResult<Plan> + '_ {
    move |binding| DpOptimizer::new(query(), context(config, binding)).find_best_plan()
}

#[test]
fn test_lookup_after_precompute_returns_stored_entry() {
    let config = config();
    let manager = PqoManager::new(&config);
    let template = TemplateId::from("orders_by_nation");
    let bindings: Vec<ParameterBinding> = vec![
        vec![0.5, 1.0, 1.0].into(),
        vec![0.4, 1.0, 1.0].into(),
        vec![0.001, 1.0, 0.04].into(),
    ];

    let stored = manager
        .precompute(&template, &bindings, &config, compile(&config))
        .unwrap();
    // The first two bindings share a bucket.
    assert_eq!(stored.len(), 2);
    assert_eq!(manager.cache().len(), 2);

    for (binding, entry) in [(&bindings[0], &stored[0]), (&bindings[2], &stored[1])] {
        match manager.lookup(&template, binding) {
            CacheLookup::Hit(found) => {
                assert_eq!(found, *entry);
                assert_eq!(found.binding(), binding);
                assert!(found.winner().is_some());
                assert!(found.candidates().len() <= 3);
            }
            CacheLookup::Miss => panic!("expected a hit for {:?}", binding),
        }
    }
    assert!(manager.lookup(&template, &bindings[1]).is_hit());
    assert!(!manager
        .lookup(&TemplateId::from("other"), &bindings[0])
        .is_hit());
}

#[test]
fn test_reconfigure_invalidates() {
    let config = config();
    let manager = PqoManager::new(&config);
    let template = TemplateId::from("t");
    let binding: ParameterBinding = vec![0.2, 1.0, 1.0].into();
    manager
        .precompute(&template, &[binding.clone()], &config, compile(&config))
        .unwrap();
    assert!(manager.lookup(&template, &binding).is_hit());

    // Output-only settings leave the cache alone.
    manager.reconfigure(&RobustConfig {
        score_filename: Some("score.txt".into()),
        ..config.clone()
    });
    assert!(manager.lookup(&template, &binding).is_hit());

    manager.reconfigure(&RobustConfig {
        final_score_id: 3,
        ..config
    });
    assert_eq!(manager.lookup(&template, &binding), CacheLookup::Miss);
    assert!(manager.cache().is_empty());

    let stats = manager.cache().stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.stale, 1);
}

#[test]
fn test_get_or_compile_writes_through() {
    let config = config();
    let manager = PqoManager::new(&config);
    let template = TemplateId::from("t");
    let compiled = AtomicUsize::new(0);
    let counting = |binding: &ParameterBinding| {
        compiled.fetch_add(1, Ordering::SeqCst);
        compile(&config)(binding)
    };

    let first: ParameterBinding = vec![0.3, 1.0, 1.0].into();
    let ctx = context(&config, &first);
    let miss = manager
        .get_or_compile(&template, &first, &ctx, counting)
        .unwrap();
    assert_eq!(compiled.load(Ordering::SeqCst), 1);

    // Same bucket, slightly different selectivity: served from the cache, re-priced.
    let nearby: ParameterBinding = vec![0.25, 1.0, 1.0].into();
    let hit = manager
        .get_or_compile(&template, &nearby, &context(&config, &nearby), counting)
        .unwrap();
    assert_eq!(compiled.load(Ordering::SeqCst), 1);
    assert_eq!(hit.candidates(), miss.candidates());
    assert!(hit
        .candidates()
        .iter()
        .any(|c| Arc::ptr_eq(c, &hit.root())));

    // A context with another objective configuration never sees the old entry.
    let changed = RobustConfig {
        main_objective_id: 1,
        ..config.clone()
    };
    manager
        .get_or_compile(&template, &nearby, &context(&changed, &nearby), counting)
        .unwrap();
    assert_eq!(compiled.load(Ordering::SeqCst), 2);
    assert_eq!(manager.cache().version(), changed.fingerprint());
}

#[test]
fn test_concurrent_readers() {
    let config = config();
    let manager = Arc::new(PqoManager::new(&config));
    let template = TemplateId::from("t");
    let bindings: Vec<ParameterBinding> = [1.0, 0.1, 0.01, 0.001]
        .iter()
        .map(|s| vec![*s * 0.9, 1.0, 1.0].into())
        .collect();
    let stored = manager
        .precompute(&template, &bindings, &config, compile(&config))
        .unwrap();
    assert_eq!(stored.len(), 4);

    thread::scope(|scope| {
        for worker in 0..8 {
            let manager = manager.clone();
            let (template, bindings, stored) = (&template, &bindings, &stored);
            scope.spawn(move || {
                for round in 0..100 {
                    let i = (worker + round) % bindings.len();
                    match manager.lookup(template, &bindings[i]) {
                        CacheLookup::Hit(entry) => assert_eq!(entry, stored[i]),
                        CacheLookup::Miss => panic!("unexpected miss"),
                    }
                }
            });
        }
    });
    assert_eq!(manager.cache().stats().hits, 800);
}

#[test]
fn test_plan_compiled_under_replaced_config_is_not_cached() {
    let config = config();
    let replaced = RobustConfig {
        final_score_id: 3,
        ..config.clone()
    };
    let manager = PqoManager::new(&config);
    let template = TemplateId::from("t");
    let binding: ParameterBinding = vec![0.2, 1.0, 1.0].into();

    let ctx = context(&config, &binding);
    manager
        .get_or_compile(&template, &binding, &ctx, |b| {
            let plan = compile(&config)(b);
            manager.reconfigure(&replaced);
            plan
        })
        .unwrap();
    assert_eq!(manager.cache().version(), replaced.fingerprint());
    assert!(manager.cache().is_empty());
    assert_eq!(manager.lookup(&template, &binding), CacheLookup::Miss);

    // Same race during precompute: nothing of the old configuration survives.
    let stored = manager
        .precompute(&template, &[binding.clone()], &config, |b| {
            let plan = compile(&config)(b);
            manager.reconfigure(&replaced);
            plan
        })
        .unwrap();
    assert!(stored.is_empty());
    assert!(manager.cache().is_empty());
    assert_eq!(manager.cache().stats().stale, 0);
}

#[test]
fn test_precompute_stamps_compiling_config() {
    let config = config();
    let other = RobustConfig {
        main_objective_id: 1,
        ..config.clone()
    };
    let manager = PqoManager::new(&config);
    let template = TemplateId::from("t");
    let binding: ParameterBinding = vec![0.2, 1.0, 1.0].into();

    let stored = manager
        .precompute(&template, &[binding.clone()], &other, compile(&other))
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].version(), other.fingerprint());
    assert_eq!(manager.cache().version(), other.fingerprint());
    assert!(manager.lookup(&template, &binding).is_hit());

    manager.reconfigure(&config);
    assert_eq!(manager.lookup(&template, &binding), CacheLookup::Miss);
}

#[test]
fn test_cache_hit_writes_score_file() {
    let dir = tempfile::tempdir().unwrap();
    let score_file = dir.path().join("score.txt");
    let config = RobustConfig {
        score_filename: Some(score_file.clone()),
        ..config()
    };
    let manager = PqoManager::new(&config);
    let template = TemplateId::from("t");
    let binding: ParameterBinding = vec![0.3, 1.0, 1.0].into();
    manager
        .precompute(&template, &[binding.clone()], &config, compile(&config))
        .unwrap();
    std::fs::remove_file(&score_file).unwrap();

    let plan = manager
        .get_or_compile(
            &template,
            &binding,
            &context(&config, &binding),
            |_: &ParameterBinding| -> OptResult<Plan> { panic!("compiled on a cache hit") },
        )
        .unwrap();
    let written = std::fs::read_to_string(&score_file).unwrap();
    assert!(written.starts_with(&format!("score={} ", plan.score())));
    assert!(written.trim_end().ends_with("relids={0,1,2}"));
}

#[test]
fn test_lookup_never_mixes_bucketing_and_version() {
    let coarse = RobustConfig {
        pqo_buckets_per_decade: 1,
        ..config()
    };
    let fine = RobustConfig {
        pqo_buckets_per_decade: 4,
        ..config()
    };
    let binding: ParameterBinding = vec![0.2, 1.0, 1.0].into();
    let coarse_key = BindingBucketer::from_config(&coarse).key(&binding);
    let fine_key = BindingBucketer::from_config(&fine).key(&binding);
    assert_ne!(coarse_key, fine_key);

    let manager = PqoManager::new(&coarse);
    let template = TemplateId::from("t");
    for config in [&coarse, &fine] {
        manager
            .precompute(&template, &[binding.clone()], config, compile(config))
            .unwrap();
    }
    assert_eq!(manager.cache().len(), 2);

    thread::scope(|scope| {
        let manager = &manager;
        scope.spawn(|| {
            for round in 0..200 {
                manager.reconfigure(if round % 2 == 0 { &coarse } else { &fine });
            }
        });
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    if let CacheLookup::Hit(entry) = manager.lookup(&template, &binding) {
                        let expected = if entry.version() == coarse.fingerprint() {
                            &coarse_key
                        } else {
                            &fine_key
                        };
                        assert_eq!(entry.bucket(), expected);
                    }
                }
            });
        }
    });
    assert_eq!(manager.cache().stats().stale, 0);
    assert_eq!(manager.cache().len(), 2);
}
