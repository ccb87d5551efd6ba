use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use crate::cost::Estimate;
use crate::dp::SubproblemArena;
use crate::envelope::{EnvelopeExplorer, ExplorerStats, Retained};
use crate::error::{OptError, OptResult};
use crate::objective::ScenarioMatrix;
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::plan::{PathBuilder, PathRef, Plan};
use crate::query::JoinQuery;
use crate::relset::RelSet;
use crate::report;
use crate::sampler::ProfileCache;

/// Counters of one search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub subproblems: usize,
    pub explorer: ExplorerStats,
    /// Relation sets scored without error statistics.
    pub degraded_profiles: usize,
}

/// Everything a finished search produced.
#[derive(Debug)]
pub struct SearchOutcome {
    pub plan: Plan,
    pub stats: SearchStats,
    /// Every finalized subproblem, the top-level one included.
    pub subproblems: SubproblemArena,
}

/// Exhaustive dynamic programming join search with robustness-aware retention.
pub struct DpOptimizer {
    query: JoinQuery,
    context: OptimizerContext,
}

impl Optimizer for DpOptimizer {
    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn find_best_plan(self) -> OptResult<Plan> {
        self.optimize().map(|outcome| outcome.plan)
    }
}

/// Relation sets of `size` members out of `0..n`, in increasing bit order.
fn masks_of_size(n: usize, size: usize) -> impl Iterator<Item = RelSet> {
    let limit = 1u64 << n;
    let mut next = if size == 0 || size > n {
        limit
    } else {
        (1u64 << size) - 1
    };
    std::iter::from_fn(move || {
        if next >= limit {
            return None;
        }
        let current = next;
        // Gosper's hack: next larger integer with the same popcount.
        let lowest = current & current.wrapping_neg();
        let ripple = current + lowest;
        next = if ripple >= limit || lowest == 0 {
            limit
        } else {
            (((ripple ^ current) >> 2) / lowest) | ripple
        };
        Some(RelSet::from_bits(current))
    })
}

impl DpOptimizer {
    pub fn new(query: JoinQuery, context: OptimizerContext) -> Self {
        Self { query, context }
    }

    pub fn query(&self) -> &JoinQuery {
        &self.query
    }

    fn infeasible(&self, relids: RelSet) -> OptError {
        OptError::NoFeasiblePlan {
            relids,
            relations: self.query.describe(relids),
        }
    }

    /// Runs the search and returns the selected plan with the search counters.
    pub fn optimize(&self) -> OptResult<SearchOutcome> {
        let started = Instant::now();
        let config = self.context.config();
        let n = self.query.len();
        if n == 0 {
            return Err(self.infeasible(RelSet::EMPTY));
        }
        if n > config.max_relations {
            return Err(OptError::TooManyRelations {
                count: n,
                max: config.max_relations,
            });
        }

        let profiles = self.context.profile_cache();
        let explorer = EnvelopeExplorer::new(
            config,
            self.context.hooks(),
            &profiles,
            self.context.cost_model(),
        );
        let mut arena = SubproblemArena::new();
        self.fill_leaves(&explorer, &mut arena)?;

        let pool = if config.parallel_workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.parallel_workers)
                    .thread_name(|i| format!("join-search-{}", i))
                    .build()
                    .map_err(|e| OptError::External(e.into()))?,
            )
        } else {
            None
        };

        for size in 2..=n {
            let masks: Vec<RelSet> = masks_of_size(n, size).collect();
            let results: Vec<(RelSet, OptResult<Option<Retained>>)> = match &pool {
                Some(pool) => pool.install(|| {
                    masks
                        .par_iter()
                        .map(|&relids| (relids, self.fill_join(relids, &explorer, &arena)))
                        .collect()
                }),
                None => masks
                    .iter()
                    .map(|&relids| (relids, self.fill_join(relids, &explorer, &arena)))
                    .collect(),
            };

            for (relids, result) in results {
                let Some(retained) = result? else {
                    continue;
                };
                if retained.paths.is_empty() {
                    return Err(self.infeasible(relids));
                }
                let subproblem = arena.insert(relids, retained);
                debug!(
                    "Subproblem {} [{}]: {:?}",
                    relids,
                    self.query.describe(relids),
                    subproblem.stats()
                );
            }
        }

        let full = self.query.all_relids();
        let top = arena.get(full).ok_or_else(|| self.infeasible(full))?;
        let plan = self.select_final(top.candidates(), &profiles)?;
        report::write_score(config, &plan);

        let stats = SearchStats {
            subproblems: arena.len(),
            explorer: arena.total_stats(),
            degraded_profiles: profiles.degraded_count(),
        };
        info!(
            "Join search over {} relations finished in {:?}: {} subproblems, {} paths generated, \
             {} scored, score {}",
            n,
            started.elapsed(),
            stats.subproblems,
            stats.explorer.generated,
            stats.explorer.scored,
            plan.score()
        );
        Ok(SearchOutcome {
            plan,
            stats,
            subproblems: arena,
        })
    }

    fn fill_leaves(
        &self,
        explorer: &EnvelopeExplorer<'_>,
        arena: &mut SubproblemArena,
    ) -> OptResult<()> {
        let model = self.context.cost_model();
        for relation in self.query.relations() {
            let relids = RelSet::singleton(relation.id());
            self.context.check_cancelled(relids)?;

            let mut builder = PathBuilder::new(relids);
            let paths = model
                .scan_choices(relation)?
                .iter()
                .map(|choice| builder.scan(relation, choice))
                .collect();
            let retained = explorer.explore(relids, paths);
            if retained.paths.is_empty() {
                return Err(self.infeasible(relids));
            }
            arena.insert(relids, retained);
        }
        Ok(())
    }

    /// Generates and retains the paths of one relation set. `None` means no valid split exists,
    /// so the relation set is not a subproblem.
    fn fill_join(
        &self,
        relids: RelSet,
        explorer: &EnvelopeExplorer<'_>,
        arena: &SubproblemArena,
    ) -> OptResult<Option<Retained>> {
        self.context.check_cancelled(relids)?;

        let model = self.context.cost_model();
        let mut builder = PathBuilder::new(relids);
        let mut generated = Vec::new();
        let mut has_split = false;
        for left in relids.proper_subsets() {
            let right = relids.difference(left);
            let (Some(outer), Some(inner)) = (arena.get(left), arena.get(right)) else {
                continue;
            };
            if !model.is_valid_join(left, right) {
                continue;
            }
            has_split = true;

            for choice in model.join_choices(left, right) {
                for outer_path in outer.candidates() {
                    for inner_path in inner.candidates() {
                        let rows =
                            model.join_rows(left, right, outer_path.rows(), inner_path.rows());
                        let cost = model.join_cost(
                            choice.strategy,
                            outer_path.estimate(),
                            inner_path.estimate(),
                            rows,
                        );
                        generated.push(builder.join(
                            &choice,
                            outer_path,
                            inner_path,
                            Estimate::new(cost, rows),
                        ));
                    }
                }
            }
        }

        if !has_split {
            return Ok(None);
        }
        Ok(Some(explorer.explore(relids, generated)))
    }

    fn select_final(&self, candidates: &[PathRef], profiles: &ProfileCache) -> OptResult<Plan> {
        let full = self.query.all_relids();
        let matrix = ScenarioMatrix::build(candidates, profiles, self.context.cost_model());
        let (idx, score) = self
            .context
            .hooks()
            .select_final(&matrix)
            .ok_or_else(|| self.infeasible(full))?;
        Ok(Plan::new(matrix.path(idx).clone(), score, candidates.to_vec()))
    }
}
