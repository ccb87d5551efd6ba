//! Interface to the cost/cardinality estimation collaborator.
//!
//! The optimizer never computes selectivities or operator costs itself. Everything it knows
//! about the price of a plan comes through [`CostModel`], which must also be able to re-price an
//! operator when its inputs carry a different row count than the one originally estimated. That
//! is what makes robustness scoring under sampled estimation error possible.

use derive_more::{Add, AddAssign};
use serde::{Deserialize, Serialize};

use crate::operator::{JoinStrategy, ScanMethod};
use crate::query::BaseRelation;
use crate::relset::{RelId, RelSet};

mod graph;
pub use graph::*;
mod simple;
pub use simple::*;

/// Identifier of an interesting output ordering, assigned by the cost model.
pub type OrderingId = u32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Add, AddAssign, Serialize, Deserialize)]
pub struct Cost {
    pub startup: f64,
    pub total: f64,
}

impl Cost {
    pub fn new(startup: f64, total: f64) -> Self {
        Self { startup, total }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

impl From<f64> for Cost {
    fn from(total: f64) -> Self {
        Self {
            startup: 0.0,
            total,
        }
    }
}

/// Cumulative cost and output cardinality of a (sub)plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub cost: Cost,
    pub rows: f64,
}

impl Estimate {
    pub fn new(cost: Cost, rows: f64) -> Self {
        Self { cost, rows }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanChoice {
    pub method: ScanMethod,
    pub estimate: Estimate,
    pub ordering: Option<OrderingId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinChoice {
    pub strategy: JoinStrategy,
    pub ordering: Option<OrderingId>,
}

impl JoinChoice {
    pub fn unordered(strategy: JoinStrategy) -> Self {
        Self {
            strategy,
            ordering: None,
        }
    }
}

pub trait CostModel: Send + Sync {
    /// Access paths available for a base relation.
    fn scan_choices(&self, rel: &BaseRelation) -> anyhow::Result<Vec<ScanChoice>>;

    /// Point estimate of one access path, used when a path is re-priced.
    fn scan_estimate(&self, rel: RelId, method: ScanMethod) -> Estimate;

    /// Cost of one access path when it actually returns `rows` tuples. Fixed costs such as an
    /// index descent stay, the per-row part follows `rows`.
    fn scan_cost(&self, rel: RelId, method: ScanMethod, rows: f64) -> Cost;

    /// Output cardinality of joining two disjoint relation sets with the given input sizes.
    fn join_rows(&self, left: RelSet, right: RelSet, left_rows: f64, right_rows: f64) -> f64;

    /// Join algorithms worth trying for `left` as outer and `right` as inner.
    fn join_choices(&self, left: RelSet, right: RelSet) -> Vec<JoinChoice>;

    /// Cumulative cost of a join, including the cost of producing both inputs.
    fn join_cost(
        &self,
        strategy: JoinStrategy,
        outer: &Estimate,
        inner: &Estimate,
        output_rows: f64,
    ) -> Cost;

    /// Join-order validity constraint, e.g. rejecting unnecessary cross products.
    fn is_valid_join(&self, left: RelSet, right: RelSet) -> bool;
}
