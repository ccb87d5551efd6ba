use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RobustConfig;
use crate::cost::CostModel;
use crate::error::{OptError, OptResult};
use crate::objective::HookSet;
use crate::plan::Plan;
use crate::relset::RelSet;
use crate::sampler::ProfileCache;
use crate::stat::StatsProvider;

/// Everything a compilation reads: configuration, resolved hooks and the collaborators.
///
/// The context is cheap to clone and is shared by every worker of a compilation.
#[derive(Clone)]
pub struct OptimizerContext {
    config: Arc<RobustConfig>,
    hooks: Arc<HookSet>,
    cost_model: Arc<dyn CostModel>,
    stats: Arc<dyn StatsProvider>,
    cancel: Option<Arc<AtomicBool>>,
}

impl OptimizerContext {
    /// Validates the configuration and resolves the objective hooks.
    pub fn new(
        config: RobustConfig,
        cost_model: Arc<dyn CostModel>,
        stats: Arc<dyn StatsProvider>,
    ) -> OptResult<Self> {
        config.validate()?;
        let hooks = config.hooks()?;
        Ok(Self {
            config: Arc::new(config),
            hooks: Arc::new(hooks),
            cost_model,
            stats,
            cancel: None,
        })
    }

    /// Installs a flag that aborts the search between two subproblems once set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Same configuration and statistics, another cost model.
    pub fn with_cost_model(&self, cost_model: Arc<dyn CostModel>) -> Self {
        Self {
            cost_model,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &RobustConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    pub fn cost_model(&self) -> &dyn CostModel {
        self.cost_model.as_ref()
    }

    pub fn stats(&self) -> Arc<dyn StatsProvider> {
        self.stats.clone()
    }

    /// Fresh error profile cache for one compilation.
    pub fn profile_cache(&self) -> ProfileCache {
        ProfileCache::new(&self.config, self.stats.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Fails with [`OptError::Cancelled`] if cancellation was requested before `relids`.
    pub fn check_cancelled(&self, relids: RelSet) -> OptResult<()> {
        if self.is_cancelled() {
            Err(OptError::Cancelled { relids })
        } else {
            Ok(())
        }
    }
}

pub trait Optimizer {
    fn context(&self) -> &OptimizerContext;

    fn find_best_plan(self) -> OptResult<Plan>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::SimpleCostModel;
    use crate::objective::ObjectiveId;
    use crate::stat::NoStatistics;

    #[test]
    fn test_context_validates() {
        let bad = RobustConfig {
            retain_strategy_id: 12,
            ..RobustConfig::default()
        };
        let err = OptimizerContext::new(
            bad,
            Arc::new(SimpleCostModel::new()),
            Arc::new(NoStatistics),
        )
        .err()
        .unwrap();
        assert!(err.is_configuration());

        let ctx = OptimizerContext::new(
            RobustConfig {
                final_score_id: 16,
                ..RobustConfig::default()
            },
            Arc::new(SimpleCostModel::new()),
            Arc::new(NoStatistics),
        )
        .unwrap();
        assert_eq!(ctx.hooks().final_objective().id(), ObjectiveId::JoinOnlyCost);
        assert!(ctx.check_cancelled(RelSet::EMPTY).is_ok());
    }

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = OptimizerContext::new(
            RobustConfig::default(),
            Arc::new(SimpleCostModel::new()),
            Arc::new(NoStatistics),
        )
        .unwrap()
        .with_cancel_flag(flag.clone());

        assert!(!ctx.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(matches!(
            ctx.check_cancelled(RelSet::singleton(2)),
            Err(OptError::Cancelled { relids }) if relids == RelSet::singleton(2)
        ));
    }
}
