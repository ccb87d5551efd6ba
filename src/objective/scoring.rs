use std::cmp::Ordering;

use crate::cost::CostModel;
use crate::plan::PathRef;
use crate::sampler::{ErrorScenario, PointEstimate, ProfileCache};

/// Relative slack under which a path counts as matching the best cost of a scenario.
const WIN_TOLERANCE: f64 = 1e-9;

/// Costs of a fixed set of competing paths under every error scenario.
///
/// The matrix is the only input of every objective: scores depend on the competing set, since
/// penalty is measured against the best competitor of each scenario.
#[derive(Clone, Debug)]
pub struct ScenarioMatrix {
    paths: Vec<PathRef>,
    totals: Vec<Vec<f64>>,
    startups: Vec<Vec<f64>>,
    join_costs: Vec<Vec<f64>>,
    best: Vec<f64>,
}

impl ScenarioMatrix {
    /// Prices every path under the sampled scenarios of `profiles`.
    pub fn build(paths: &[PathRef], profiles: &ProfileCache, model: &dyn CostModel) -> Self {
        let scenarios: Vec<_> = (0..profiles.scenario_count())
            .map(|s| profiles.scenario(s))
            .collect();
        Self::price(paths, model, &scenarios)
    }

    /// Single scenario matrix over the plain estimates.
    pub fn point_estimate(paths: &[PathRef], model: &dyn CostModel) -> Self {
        Self::price(paths, model, &[PointEstimate])
    }

    /// Prices every path under each of the given scenarios.
    pub fn price<S: ErrorScenario>(
        paths: &[PathRef],
        model: &dyn CostModel,
        scenarios: &[S],
    ) -> Self {
        let mut totals = Vec::with_capacity(paths.len());
        let mut startups = Vec::with_capacity(paths.len());
        let mut join_costs = Vec::with_capacity(paths.len());
        for path in paths {
            let priced: Vec<_> = scenarios
                .iter()
                .map(|scenario| path.cost_under(model, scenario))
                .collect();
            totals.push(priced.iter().map(|c| c.estimate.cost.total).collect());
            startups.push(priced.iter().map(|c| c.estimate.cost.startup).collect());
            join_costs.push(priced.iter().map(|c| c.join_cost).collect());
        }
        Self::from_rows(paths.to_vec(), totals, startups, join_costs)
    }

    fn from_rows(
        paths: Vec<PathRef>,
        totals: Vec<Vec<f64>>,
        startups: Vec<Vec<f64>>,
        join_costs: Vec<Vec<f64>>,
    ) -> Self {
        let scenario_count = totals.first().map(Vec::len).unwrap_or(0);
        let best = (0..scenario_count)
            .map(|s| {
                totals
                    .iter()
                    .map(|row| row[s])
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        Self {
            paths,
            totals,
            startups,
            join_costs,
            best,
        }
    }

    /// Matrix restricted to some rows. Penalties are re-based on the remaining paths; nothing is
    /// re-priced.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self::from_rows(
            indices.iter().map(|&i| self.paths[i].clone()).collect(),
            indices.iter().map(|&i| self.totals[i].clone()).collect(),
            indices.iter().map(|&i| self.startups[i].clone()).collect(),
            indices.iter().map(|&i| self.join_costs[i].clone()).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn scenario_count(&self) -> usize {
        self.best.len()
    }

    pub fn paths(&self) -> &[PathRef] {
        &self.paths
    }

    pub fn path(&self, idx: usize) -> &PathRef {
        &self.paths[idx]
    }

    pub fn totals(&self, idx: usize) -> &[f64] {
        &self.totals[idx]
    }

    pub fn startups(&self, idx: usize) -> &[f64] {
        &self.startups[idx]
    }

    pub fn join_costs(&self, idx: usize) -> &[f64] {
        &self.join_costs[idx]
    }

    /// Cheapest total cost of scenario `s` over all paths of the matrix.
    pub fn best(&self, s: usize) -> f64 {
        self.best[s]
    }

    pub fn penalty(&self, idx: usize, s: usize) -> f64 {
        (self.totals[idx][s] - self.best[s]).max(0.0)
    }

    pub fn penalties(&self, idx: usize) -> Vec<f64> {
        (0..self.scenario_count())
            .map(|s| self.penalty(idx, s))
            .collect()
    }

    /// Whether path `idx` is (one of) the cheapest in scenario `s`.
    pub fn wins(&self, idx: usize, s: usize) -> bool {
        self.penalty(idx, s) <= self.best[s].abs() * WIN_TOLERANCE
    }

    pub fn win_count(&self, idx: usize) -> usize {
        (0..self.scenario_count())
            .filter(|&s| self.wins(idx, s))
            .count()
    }

    /// Tie-break between two rows: raw estimated cost, then construction order.
    pub fn compare_raw(&self, a: usize, b: usize) -> Ordering {
        let (pa, pb) = (&self.paths[a], &self.paths[b]);
        pa.cost()
            .total
            .total_cmp(&pb.cost().total)
            .then_with(|| pa.id().cmp(&pb.id()))
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Linearly interpolated quantile, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_util::matrix;
    use super::*;

    #[test]
    fn test_penalty_against_best_competitor() {
        let m = matrix(&[(10.0, &[10.0, 30.0]), (20.0, &[20.0, 15.0])]);
        assert_eq!(m.scenario_count(), 2);
        assert_eq!(m.best(0), 10.0);
        assert_eq!(m.best(1), 15.0);
        assert_eq!(m.penalties(0), vec![0.0, 15.0]);
        assert_eq!(m.penalties(1), vec![10.0, 0.0]);
        assert!(m.wins(0, 0) && !m.wins(0, 1));
        assert_eq!(m.win_count(1), 1);
    }

    #[test]
    fn test_subset_rebases_penalty() {
        let m = matrix(&[
            (10.0, &[10.0, 30.0]),
            (20.0, &[20.0, 15.0]),
            (30.0, &[25.0, 25.0]),
        ]);
        let sub = m.subset(&[2, 1]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.best(0), 20.0);
        assert_eq!(sub.penalties(0), vec![5.0, 10.0]);
        assert!(Arc::ptr_eq(sub.path(0), m.path(2)));
        assert_eq!(sub.compare_raw(0, 1), Ordering::Greater);
    }

    #[test]
    fn test_statistics() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_eq!(quantile(&[4.0, 1.0, 3.0, 2.0, 5.0], 0.5), 3.0);
        assert_eq!(quantile(&[1.0, 2.0], 0.25), 1.25);
        assert_eq!(quantile(&[1.0, 2.0], 1.0), 2.0);
    }
}
