use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{OptError, OptResult};
use crate::relset::RelSet;
use crate::sampler::{ErrorSample, ErrorSamples, SamplerSettings};

/// Gaussian kernel density estimate over the log error ratios of one relation set.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorProfile {
    relids: RelSet,
    observations: Vec<f64>,
    bandwidth: f64,
}

/// On-disk form of an error profile's observations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ProfileArtifact {
    relids: RelSet,
    observations: Vec<f64>,
}

impl ErrorProfile {
    pub fn build(relids: RelSet, observations: Vec<f64>, bandwidth: f64) -> OptResult<Self> {
        let mut observations: Vec<f64> = observations
            .into_iter()
            .filter(|o| o.is_finite())
            .collect();
        if observations.is_empty() {
            return Err(OptError::InsufficientStatistics { relids });
        }
        observations.sort_by(f64::total_cmp);
        Ok(Self {
            relids,
            observations,
            bandwidth,
        })
    }

    pub fn relids(&self) -> RelSet {
        self.relids
    }

    pub fn observations(&self) -> &[f64] {
        &self.observations
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn mean(&self) -> f64 {
        self.observations.iter().sum::<f64>() / self.observations.len() as f64
    }

    /// Draws `settings.count` samples.
    ///
    /// Sample `i` falls into stratum `i % bins`, which restricts the kernel centre to the
    /// matching quantile range of the observations. The sequence depends only on the settings
    /// and the relation set.
    pub fn sample(&self, settings: &SamplerSettings) -> ErrorSamples {
        let mut rng = StdRng::seed_from_u64(settings.seed_for(self.relids));
        let n = self.observations.len();
        let bins = settings.bins.max(1);

        let samples = (0..settings.count)
            .map(|i| {
                let bin = i % bins;
                let u = (bin as f64 + rng.gen::<f64>()) / bins as f64;
                let centre = self.observations[((u * n as f64) as usize).min(n - 1)];
                ErrorSample::new(centre + self.bandwidth * standard_normal(&mut rng))
            })
            .collect();

        debug!(
            "Drew {} error samples for {} from {} observations",
            settings.count, self.relids, n
        );
        ErrorSamples::new(self.relids, samples)
    }

    pub fn artifact_path(dir: &Path, relids: RelSet) -> PathBuf {
        dir.join(format!("profile_{}.json", relids.bits()))
    }

    /// Persists the observations under `dir`.
    pub fn save(&self, dir: &Path) -> OptResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::artifact_path(dir, self.relids);
        let artifact = ProfileArtifact {
            relids: self.relids,
            observations: self.observations.clone(),
        };
        fs::write(&path, serde_json::to_vec_pretty(&artifact)?)?;
        Ok(path)
    }

    /// Loads persisted observations, `Ok(None)` when no artifact exists for `relids`.
    pub fn load_observations(dir: &Path, relids: RelSet) -> OptResult<Option<Vec<f64>>> {
        let path = Self::artifact_path(dir, relids);
        if !path.exists() {
            return Ok(None);
        }
        let artifact: ProfileArtifact = serde_json::from_slice(&fs::read(&path)?)?;
        if artifact.relids != relids {
            return Err(OptError::config(
                "error_profile_path",
                format!(
                    "{} holds observations for {} instead of {}",
                    path.display(),
                    artifact.relids,
                    relids
                ),
            ));
        }
        Ok(Some(artifact.observations))
    }
}

/// Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(count: usize, bins: usize, bandwidth: f64) -> SamplerSettings {
        SamplerSettings {
            count,
            bins,
            bandwidth,
            seed: 1234,
        }
    }

    #[test]
    fn test_empty_observations_are_insufficient() {
        let err = ErrorProfile::build(RelSet::singleton(3), vec![], 0.5).unwrap_err();
        assert!(matches!(
            err,
            OptError::InsufficientStatistics { relids } if relids == RelSet::singleton(3)
        ));

        let err = ErrorProfile::build(RelSet::singleton(3), vec![f64::NAN], 0.5).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_zero_bandwidth_reproduces_observations() {
        let profile = ErrorProfile::build(RelSet::singleton(0), vec![0.5, -0.5, 1.5], 0.0).unwrap();
        let samples = profile.sample(&settings(32, 1, 0.0));
        assert_eq!(samples.len(), 32);
        assert!(samples
            .samples()
            .iter()
            .all(|s| profile.observations().contains(&s.value())));
    }

    #[test]
    fn test_stratification_covers_every_bin() {
        let observations: Vec<f64> = (0..8).map(f64::from).collect();
        let profile = ErrorProfile::build(RelSet::singleton(0), observations, 0.0).unwrap();
        let samples = profile.sample(&settings(8, 8, 0.0));
        let mut values: Vec<f64> = samples.samples().iter().map(|s| s.value()).collect();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, (0..8).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_mean_approximates_profile() {
        let observations: Vec<f64> = (0..100).map(|i| (i as f64 - 49.5) / 50.0 + 1.0).collect();
        let profile = ErrorProfile::build(RelSet::singleton(1), observations, 0.1).unwrap();
        let samples = profile.sample(&settings(64, 8, 0.1));
        let mean = samples.samples().iter().map(|s| s.value()).sum::<f64>() / 64.0;
        assert!((mean - profile.mean()).abs() < 0.2, "mean {}", mean);
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let relids = RelSet::from_ids([0, 2]);
        let profile = ErrorProfile::build(relids, vec![0.3, -0.1], 0.5).unwrap();
        let path = profile.save(dir.path()).unwrap();
        assert!(path.ends_with("profile_5.json"));

        let loaded = ErrorProfile::load_observations(dir.path(), relids).unwrap();
        assert_eq!(loaded, Some(vec![-0.1, 0.3]));
        assert_eq!(
            ErrorProfile::load_observations(dir.path(), RelSet::singleton(1)).unwrap(),
            None
        );
    }
}
