use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use crate::config::RobustConfig;
use crate::error::{OptError, OptResult};
use crate::objective::ScenarioMatrix;
use crate::optimizer::OptimizerContext;
use crate::plan::Plan;
use crate::pqo::{
    BindingBucketer, BucketKey, CacheEntry, CacheLookup, ParameterBinding, PlanCache, TemplateId,
};
use crate::report;

/// Front door of parametric optimization: precompute, lookup and compile-through.
pub struct PqoManager {
    cache: PlanCache,
    bucketer: RwLock<BindingBucketer>,
}

impl PqoManager {
    pub fn new(config: &RobustConfig) -> Self {
        Self {
            cache: PlanCache::new(config.fingerprint()),
            bucketer: RwLock::new(BindingBucketer::from_config(config)),
        }
    }

    pub fn cache(&self) -> &PlanCache {
        &self.cache
    }

    pub fn bucket(&self, binding: &ParameterBinding) -> BucketKey {
        self.bucketer.read().key(binding)
    }

    /// Adopts a new configuration. Entries of the previous one become stale.
    ///
    /// The version and the bucketing change under the same write lock, so a lookup never pairs
    /// the new bucketing with the old version.
    pub fn reconfigure(&self, config: &RobustConfig) {
        let mut bucketer = self.bucketer.write();
        if self.cache.set_version(config.fingerprint()) {
            info!("Plan cache invalidated by configuration change");
        }
        *bucketer = BindingBucketer::from_config(config);
    }

    /// Stores the final candidates of `plan`, compiled under `config`, for the bucket of
    /// `binding`.
    ///
    /// Returns `None` when `config` is not the configuration the cache currently serves.
    pub fn store(
        &self,
        template: &TemplateId,
        binding: &ParameterBinding,
        plan: &Plan,
        config: &RobustConfig,
    ) -> Option<Arc<CacheEntry>> {
        let root = plan.root();
        let mut candidates = plan.candidates().to_vec();
        let winner = match candidates.iter().position(|c| Arc::ptr_eq(c, &root)) {
            Some(winner) => winner,
            None => {
                candidates.insert(0, root);
                0
            }
        };
        self.cache.insert(CacheEntry::new(
            template.clone(),
            BindingBucketer::from_config(config).key(binding),
            config.fingerprint(),
            binding.clone(),
            candidates,
            winner,
        ))
    }

    /// Compiles one representative binding per distinct bucket under `config` and caches the
    /// results.
    ///
    /// Entries whose configuration was replaced while compiling are not kept.
    pub fn precompute<F>(
        &self,
        template: &TemplateId,
        bindings: &[ParameterBinding],
        config: &RobustConfig,
        mut compile: F,
    ) -> OptResult<Vec<Arc<CacheEntry>>>
    where
        F: FnMut(&ParameterBinding) -> OptResult<Plan>,
    {
        if config.fingerprint() != self.cache.version() {
            self.reconfigure(config);
        }
        let bucketer = BindingBucketer::from_config(config);
        let mut seen = FxHashSet::default();
        let mut stored = Vec::new();
        for binding in bindings {
            if !seen.insert(bucketer.key(binding)) {
                continue;
            }
            let plan = compile(binding)?;
            stored.extend(self.store(template, binding, &plan, config));
        }
        info!(
            "Precomputed {} buckets for template {} from {} bindings",
            stored.len(),
            template,
            bindings.len()
        );
        Ok(stored)
    }

    pub fn lookup(&self, template: &TemplateId, binding: &ParameterBinding) -> CacheLookup {
        let bucketer = self.bucketer.read();
        self.cache.get(template, &bucketer.key(binding))
    }

    /// Serves a binding from the cache, or compiles it and writes the result through.
    ///
    /// On a hit the final objective is re-applied to the stored candidates, priced with the
    /// context's cost model, which is expected to describe `binding`, and the selected plan's
    /// score goes to the configured score file.
    pub fn get_or_compile<F>(
        &self,
        template: &TemplateId,
        binding: &ParameterBinding,
        ctx: &OptimizerContext,
        compile: F,
    ) -> OptResult<Plan>
    where
        F: FnOnce(&ParameterBinding) -> OptResult<Plan>,
    {
        let config = ctx.config();
        if config.fingerprint() != self.cache.version() {
            self.reconfigure(config);
        }

        match self.lookup(template, binding) {
            CacheLookup::Hit(entry) => {
                debug!("Plan cache hit for {} {}", template, entry.bucket());
                let plan = Self::reselect(&entry, ctx)?;
                report::write_score(config, &plan);
                Ok(plan)
            }
            CacheLookup::Miss => {
                let plan = compile(binding)?;
                if self.store(template, binding, &plan, config).is_none() {
                    debug!("Plan for {} compiled under a replaced configuration", template);
                }
                Ok(plan)
            }
        }
    }

    fn reselect(entry: &CacheEntry, ctx: &OptimizerContext) -> OptResult<Plan> {
        let profiles = ctx.profile_cache();
        let matrix = ScenarioMatrix::build(entry.candidates(), &profiles, ctx.cost_model());
        let (idx, score) = ctx.hooks().select_final(&matrix).ok_or_else(|| {
            OptError::NoFeasiblePlan {
                relids: entry.relids(),
                relations: format!("cached template {}", entry.template()),
            }
        })?;
        Ok(Plan::new(
            matrix.path(idx).clone(),
            score,
            entry.candidates().to_vec(),
        ))
    }
}
