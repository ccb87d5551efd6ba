use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::warn;

use crate::config::RobustConfig;
use crate::error::OptResult;
use crate::relset::RelSet;
use crate::sampler::{ErrorProfile, ErrorSamples, ErrorScenario, SamplerSettings};
use crate::stat::StatsProvider;

/// Error samples of every relation set seen during one compilation.
///
/// Sample sets are built lazily on first request and never change afterwards, so concurrent
/// workers always observe the same samples for the same relation set.
pub struct ProfileCache {
    settings: SamplerSettings,
    artifact_dir: Option<PathBuf>,
    stats: Arc<dyn StatsProvider>,
    samples: DashMap<RelSet, Arc<ErrorSamples>>,
    degraded: AtomicUsize,
}

impl ProfileCache {
    pub fn new(config: &RobustConfig, stats: Arc<dyn StatsProvider>) -> Self {
        Self {
            settings: SamplerSettings::from_config(config),
            artifact_dir: config.error_profile_path.clone(),
            stats,
            samples: DashMap::new(),
            degraded: AtomicUsize::new(0),
        }
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Number of error scenarios, i.e. samples per relation set.
    pub fn scenario_count(&self) -> usize {
        self.settings.count
    }

    /// Relation sets whose profile fell back to zero error.
    pub fn degraded_count(&self) -> usize {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Builds the profile from persisted artifacts first, then from the statistics provider.
    pub fn build_profile(&self, relids: RelSet) -> OptResult<ErrorProfile> {
        let persisted = match &self.artifact_dir {
            Some(dir) => ErrorProfile::load_observations(dir, relids)?,
            None => None,
        };
        let observations = match persisted {
            Some(observations) => observations,
            None => self.stats.error_observations(relids)?,
        };
        ErrorProfile::build(relids, observations, self.settings.bandwidth)
    }

    /// Sample set for `relids`. Statistics problems degrade to a zero-error set.
    pub fn samples(&self, relids: RelSet) -> Arc<ErrorSamples> {
        if let Some(samples) = self.samples.get(&relids) {
            return samples.clone();
        }

        self.samples
            .entry(relids)
            .or_insert_with(|| match self.build_profile(relids) {
                Ok(profile) => Arc::new(profile.sample(&self.settings)),
                Err(e) => {
                    self.degraded.fetch_add(1, Ordering::Relaxed);
                    if e.is_recoverable() {
                        warn!("Falling back to cost-only scoring: {}", e);
                    } else {
                        warn!(
                            "Failed to build error profile for {}, using zero error: {}",
                            relids, e
                        );
                    }
                    Arc::new(ErrorSamples::zero(relids, self.settings.count))
                }
            })
            .clone()
    }

    pub fn scenario(&self, index: usize) -> SampledScenario<'_> {
        SampledScenario { cache: self, index }
    }
}

/// Error scenario `index`: sample `index` of every relation set.
#[derive(Clone, Copy)]
pub struct SampledScenario<'a> {
    cache: &'a ProfileCache,
    index: usize,
}

impl<'a> SampledScenario<'a> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<'a> ErrorScenario for SampledScenario<'a> {
    fn factor(&self, relids: RelSet) -> f64 {
        self.cache.samples(relids).factor(self.index)
    }
}
