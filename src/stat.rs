//! Sources of historical cardinality-estimation error.
//!
//! An observation is the natural log of `actual_rows / estimated_rows` for one relation set.
//! Working in log space keeps over- and under-estimation symmetric, which is what the kernel
//! density estimate in [`crate::sampler`] expects.

use std::collections::VecDeque;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::relset::RelSet;

/// Largest error ratio recorded; anything beyond is clamped.
pub const MAX_ERROR_RATIO: f64 = 100.0;

/// Smallest error ratio recorded.
pub const MIN_ERROR_RATIO: f64 = 0.01;

/// Default number of observations retained per relation set.
pub const DEFAULT_MAX_OBSERVATIONS: usize = 256;

/// Statistics collaborator: historical error observations for a relation or join.
pub trait StatsProvider: Send + Sync {
    fn error_observations(&self, relids: RelSet) -> anyhow::Result<Vec<f64>>;
}

/// Provider without any history. Every profile degrades to zero error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatistics;

impl StatsProvider for NoStatistics {
    fn error_observations(&self, _relids: RelSet) -> anyhow::Result<Vec<f64>> {
        Ok(vec![])
    }
}

/// Log error ratio of one execution, clamped to `[MIN_ERROR_RATIO, MAX_ERROR_RATIO]`.
pub fn log_error_ratio(estimated_rows: f64, actual_rows: f64) -> f64 {
    if estimated_rows <= 0.0 || actual_rows < 0.0 {
        return 0.0;
    }
    (actual_rows.max(1.0) / estimated_rows.max(1.0))
        .clamp(MIN_ERROR_RATIO, MAX_ERROR_RATIO)
        .ln()
}

/// In-memory store of estimated-versus-actual feedback, keyed by relation set.
#[derive(Debug)]
pub struct FeedbackStore {
    entries: RwLock<FxHashMap<RelSet, VecDeque<f64>>>,
    max_observations: usize,
}

impl Default for FeedbackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_OBSERVATIONS)
    }

    pub fn with_capacity(max_observations: usize) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            max_observations: max_observations.max(1),
        }
    }

    /// Records one execution of `relids`.
    pub fn record(&self, relids: RelSet, estimated_rows: f64, actual_rows: f64) {
        self.record_log_error(relids, log_error_ratio(estimated_rows, actual_rows));
    }

    /// Records a precomputed log error ratio. The oldest observation is evicted when full.
    pub fn record_log_error(&self, relids: RelSet, log_error: f64) {
        if !log_error.is_finite() {
            return;
        }
        let mut entries = self.entries.write();
        let observations = entries.entry(relids).or_default();
        if observations.len() >= self.max_observations {
            observations.pop_front();
        }
        observations.push_back(log_error);
    }

    pub fn with_log_errors<I: IntoIterator<Item = f64>>(self, relids: RelSet, errors: I) -> Self {
        for e in errors {
            self.record_log_error(relids, e);
        }
        self
    }

    pub fn observation_count(&self, relids: RelSet) -> usize {
        self.entries
            .read()
            .get(&relids)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl StatsProvider for FeedbackStore {
    fn error_observations(&self, relids: RelSet) -> anyhow::Result<Vec<f64>> {
        Ok(self
            .entries
            .read()
            .get(&relids)
            .map(|o| o.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_error_ratio_clamped() {
        assert_eq!(log_error_ratio(100.0, 100.0), 0.0);
        assert!((log_error_ratio(100.0, 1000.0) - 10f64.ln()).abs() < 1e-12);
        assert!((log_error_ratio(1.0, 1e9) - MAX_ERROR_RATIO.ln()).abs() < 1e-12);
        assert!((log_error_ratio(1e9, 1.0) - MIN_ERROR_RATIO.ln()).abs() < 1e-12);
        assert_eq!(log_error_ratio(0.0, 10.0), 0.0);
    }

    #[test]
    fn test_feedback_eviction() {
        let store = FeedbackStore::with_capacity(3);
        let relids = RelSet::singleton(0);
        for actual in [10.0, 20.0, 40.0, 80.0] {
            store.record(relids, 10.0, actual);
        }
        assert_eq!(store.observation_count(relids), 3);

        let observations = store.error_observations(relids).unwrap();
        assert!((observations[0] - 2f64.ln()).abs() < 1e-12);
        assert!((observations[2] - 8f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_no_statistics_is_empty() {
        assert!(NoStatistics
            .error_observations(RelSet::singleton(1))
            .unwrap()
            .is_empty());
        let store = FeedbackStore::new();
        assert!(store
            .error_observations(RelSet::singleton(1))
            .unwrap()
            .is_empty());
    }
}
