//! Empirical estimation-error distributions.
//!
//! For each relation set touched by the search, the sampler fits a Gaussian kernel density
//! estimate to the historical log error ratios and draws a fixed number of samples from it.
//! Sample `s` of every relation set together forms error scenario `s`, so all paths competing
//! for a subproblem are priced against the very same hypothetical worlds.

use std::sync::Arc;

use crate::config::RobustConfig;
use crate::relset::RelSet;

mod kde;
pub use kde::*;
mod cache;
pub use cache::*;

lazy_static! {
    /// Seed used when none is configured: random per process, stable within it.
    static ref PROCESS_SEED: u64 = rand::random();
}

/// One hypothetical deviation of true cardinality from the estimate, as a log ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorSample(f64);

impl ErrorSample {
    pub fn new(log_error: f64) -> Self {
        Self(log_error)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Multiplier applied to the estimated row count.
    pub fn factor(self) -> f64 {
        self.0.exp()
    }
}

/// Fixed-size ordered sample set for one relation set.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorSamples {
    relids: RelSet,
    samples: Arc<[ErrorSample]>,
    degraded: bool,
}

impl ErrorSamples {
    pub fn new(relids: RelSet, samples: Vec<ErrorSample>) -> Self {
        Self {
            relids,
            samples: samples.into(),
            degraded: false,
        }
    }

    /// All-zero error: every scenario sees exactly the point estimate.
    pub fn zero(relids: RelSet, count: usize) -> Self {
        Self {
            relids,
            samples: vec![ErrorSample(0.0); count].into(),
            degraded: true,
        }
    }

    pub fn relids(&self) -> RelSet {
        self.relids
    }

    pub fn samples(&self) -> &[ErrorSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether this set stands in for a profile that could not be built.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn factor(&self, scenario: usize) -> f64 {
        if self.samples.is_empty() {
            1.0
        } else {
            self.samples[scenario % self.samples.len()].factor()
        }
    }
}

/// Sampler parameters extracted from the configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerSettings {
    pub count: usize,
    pub bins: usize,
    pub bandwidth: f64,
    pub seed: u64,
}

impl SamplerSettings {
    pub fn from_config(config: &RobustConfig) -> Self {
        Self {
            count: config.error_sample_count,
            bins: config.error_bin_count,
            bandwidth: config.error_sample_kde_bandwidth,
            seed: config.error_sample_seed.unwrap_or(*PROCESS_SEED),
        }
    }

    /// Seed for the sample set of one relation set.
    pub fn seed_for(&self, relids: RelSet) -> u64 {
        mix_seed(self.seed, relids.bits())
    }
}

/// Something that tells how far reality strays from the estimate for a relation set.
pub trait ErrorScenario {
    fn factor(&self, relids: RelSet) -> f64;
}

/// The estimate is exactly right.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointEstimate;

impl ErrorScenario for PointEstimate {
    fn factor(&self, _relids: RelSet) -> f64 {
        1.0
    }
}

/// SplitMix64 finalizer over a combined seed.
pub fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut z = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
