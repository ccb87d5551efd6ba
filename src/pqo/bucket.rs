use std::fmt::{Display, Formatter};

use derive_more::{Display as DeriveDisplay, From};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::RobustConfig;

/// Highest bucket index. Also used for non-positive selectivities.
pub const MAX_BUCKET: u32 = 63;

/// Identifier of a parameterized query template.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, DeriveDisplay, From, Serialize, Deserialize,
)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Selectivity of every selectivity-affecting parameter of one template instance, by position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterBinding {
    selectivities: Vec<f64>,
}

impl ParameterBinding {
    pub fn new(selectivities: Vec<f64>) -> Self {
        Self { selectivities }
    }

    pub fn selectivities(&self) -> &[f64] {
        &self.selectivities
    }

    pub fn len(&self) -> usize {
        self.selectivities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectivities.is_empty()
    }
}

impl From<Vec<f64>> for ParameterBinding {
    fn from(selectivities: Vec<f64>) -> Self {
        Self::new(selectivities)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey(Vec<u32>);

impl BucketKey {
    pub fn buckets(&self) -> &[u32] {
        &self.0
    }
}

impl Display for BucketKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(","))
    }
}

/// Logarithmic selectivity buckets: `buckets_per_decade` buckets per power of ten.
///
/// Selectivity 1 falls into bucket 0, 0.1 into bucket `buckets_per_decade`, and so on up to
/// [`MAX_BUCKET`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingBucketer {
    buckets_per_decade: u32,
}

impl BindingBucketer {
    pub fn new(buckets_per_decade: u32) -> Self {
        Self {
            buckets_per_decade: buckets_per_decade.max(1),
        }
    }

    pub fn from_config(config: &RobustConfig) -> Self {
        Self::new(config.pqo_buckets_per_decade as u32)
    }

    pub fn buckets_per_decade(&self) -> u32 {
        self.buckets_per_decade
    }

    pub fn bucket_of(&self, selectivity: f64) -> u32 {
        if selectivity.is_nan() || selectivity <= 0.0 {
            return MAX_BUCKET;
        }
        let bucket = (-selectivity.log10() * self.buckets_per_decade as f64).floor();
        bucket.clamp(0.0, MAX_BUCKET as f64) as u32
    }

    pub fn key(&self, binding: &ParameterBinding) -> BucketKey {
        BucketKey(
            binding
                .selectivities()
                .iter()
                .map(|s| self.bucket_of(*s))
                .collect(),
        )
    }
}
