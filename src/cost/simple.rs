use anyhow::anyhow;

use crate::cost::{Cost, CostModel, Estimate, JoinChoice, JoinGraph, OrderingId, ScanChoice};
use crate::operator::{JoinStrategy, ScanMethod};
use crate::query::BaseRelation;
use crate::relset::{RelId, RelSet};

/// Per-tuple and per-page cost constants, in abstract cost units.
#[derive(Debug, Clone, PartialEq)]
pub struct CostConstants {
    pub cpu_tuple_cost: f64,
    pub cpu_index_tuple_cost: f64,
    pub cpu_operator_cost: f64,
    pub seq_page_cost: f64,
    pub random_page_cost: f64,
    pub rows_per_page: f64,
    pub hash_build_cost: f64,
    pub hash_probe_cost: f64,
    pub nested_loop_compare_cost: f64,
    pub merge_compare_cost: f64,
    pub sort_cost_per_row: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        Self {
            cpu_tuple_cost: 0.01,
            cpu_index_tuple_cost: 0.005,
            cpu_operator_cost: 0.0025,
            seq_page_cost: 1.0,
            random_page_cost: 4.0,
            rows_per_page: 100.0,
            hash_build_cost: 0.02,
            hash_probe_cost: 0.01,
            nested_loop_compare_cost: 0.01,
            merge_compare_cost: 0.005,
            sort_cost_per_row: 0.03,
        }
    }
}

#[derive(Debug, Clone)]
struct RelationInfo {
    rows: f64,
    filter_selectivity: f64,
    indexed: bool,
}

/// A self-contained textbook cost model over a join graph.
///
/// It stands in for a real catalog-backed estimator in tests, benchmarks and embedding
/// applications that only know table sizes and predicate selectivities.
#[derive(Debug, Clone, Default)]
pub struct SimpleCostModel {
    constants: CostConstants,
    relations: Vec<RelationInfo>,
    graph: JoinGraph,
}

impl SimpleCostModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constants(constants: CostConstants) -> Self {
        Self {
            constants,
            ..Self::default()
        }
    }

    pub fn constants(&self) -> &CostConstants {
        &self.constants
    }

    pub fn graph(&self) -> &JoinGraph {
        &self.graph
    }

    /// Registers a base relation with `rows` tuples. Ids are handed out in registration order
    /// and must match the query's relation ids.
    pub fn add_relation(&mut self, rows: f64) -> RelId {
        let id = self.relations.len();
        self.relations.push(RelationInfo {
            rows: rows.max(1.0),
            filter_selectivity: 1.0,
            indexed: false,
        });
        while self.graph.relation_count() <= id {
            self.graph.add_relation();
        }
        id
    }

    pub fn with_relation(mut self, rows: f64) -> Self {
        self.add_relation(rows);
        self
    }

    /// Offers an ordered index scan for the relation.
    pub fn with_index(mut self, rel: RelId) -> Self {
        if let Some(info) = self.relations.get_mut(rel) {
            info.indexed = true;
        }
        self
    }

    pub fn add_join_edge(&mut self, a: RelId, b: RelId, selectivity: f64) {
        self.graph.add_edge(a, b, selectivity);
    }

    pub fn with_join_edge(mut self, a: RelId, b: RelId, selectivity: f64) -> Self {
        self.add_join_edge(a, b, selectivity);
        self
    }

    /// Selectivity of the local filter on a relation, e.g. a bound query parameter.
    pub fn set_filter_selectivity(&mut self, rel: RelId, selectivity: f64) {
        if let Some(info) = self.relations.get_mut(rel) {
            info.filter_selectivity = selectivity.clamp(f64::MIN_POSITIVE, 1.0);
        }
    }

    fn ordering_for(rel: RelId) -> OrderingId {
        rel as OrderingId
    }

    fn merge_ordering(&self, left: RelSet, right: RelSet) -> Option<OrderingId> {
        self.graph
            .crossing_edges(left, right)
            .map(|(a, b, _)| 1000 + (a.min(b) * 64 + a.max(b)) as OrderingId)
            .min()
    }

    fn sort_cost(&self, rows: f64) -> f64 {
        let rows = rows.max(1.0);
        rows * rows.log2().max(1.0) * self.constants.sort_cost_per_row
    }
}

impl CostModel for SimpleCostModel {
    fn scan_choices(&self, rel: &BaseRelation) -> anyhow::Result<Vec<ScanChoice>> {
        let info = self
            .relations
            .get(rel.id())
            .ok_or_else(|| anyhow!("relation {} ({}) has no statistics", rel.id(), rel.name()))?;

        let mut choices = vec![ScanChoice {
            method: ScanMethod::SeqScan,
            estimate: self.scan_estimate(rel.id(), ScanMethod::SeqScan),
            ordering: None,
        }];
        if info.indexed {
            choices.push(ScanChoice {
                method: ScanMethod::IndexScan,
                estimate: self.scan_estimate(rel.id(), ScanMethod::IndexScan),
                ordering: Some(Self::ordering_for(rel.id())),
            });
        }
        Ok(choices)
    }

    fn scan_estimate(&self, rel: RelId, method: ScanMethod) -> Estimate {
        let Some(info) = self.relations.get(rel) else {
            return Estimate::new(Cost::zero(), 1.0);
        };
        let out_rows = (info.rows * info.filter_selectivity).max(1.0);
        Estimate::new(self.scan_cost(rel, method, out_rows), out_rows)
    }

    fn scan_cost(&self, rel: RelId, method: ScanMethod, rows: f64) -> Cost {
        let Some(info) = self.relations.get(rel) else {
            return Cost::zero();
        };
        let c = &self.constants;
        match method {
            ScanMethod::SeqScan => {
                let pages = (info.rows / c.rows_per_page).ceil().max(1.0);
                Cost::new(
                    0.0,
                    pages * c.seq_page_cost + info.rows * (c.cpu_tuple_cost + c.cpu_operator_cost),
                )
            }
            ScanMethod::IndexScan => {
                let descent = info.rows.log2().max(1.0) * c.cpu_operator_cost;
                Cost::new(
                    descent,
                    descent
                        + rows.max(0.0)
                            * (c.cpu_index_tuple_cost
                                + c.cpu_tuple_cost
                                + c.random_page_cost / c.rows_per_page),
                )
            }
        }
    }

    fn join_rows(&self, left: RelSet, right: RelSet, left_rows: f64, right_rows: f64) -> f64 {
        let selectivity = self.graph.selectivity_between(left, right).unwrap_or(1.0);
        (left_rows * right_rows * selectivity).max(1.0)
    }

    fn join_choices(&self, left: RelSet, right: RelSet) -> Vec<JoinChoice> {
        if self.graph.connects(left, right) {
            vec![
                JoinChoice::unordered(JoinStrategy::HashJoin),
                JoinChoice::unordered(JoinStrategy::NestedLoop),
                JoinChoice {
                    strategy: JoinStrategy::MergeJoin,
                    ordering: self.merge_ordering(left, right),
                },
            ]
        } else {
            vec![JoinChoice::unordered(JoinStrategy::NestedLoop)]
        }
    }

    fn join_cost(
        &self,
        strategy: JoinStrategy,
        outer: &Estimate,
        inner: &Estimate,
        output_rows: f64,
    ) -> Cost {
        let c = &self.constants;
        let emit = output_rows * c.cpu_tuple_cost;
        let inputs = outer.cost.total + inner.cost.total;
        match strategy {
            JoinStrategy::HashJoin => {
                let build = inner.rows * (c.cpu_tuple_cost + c.hash_build_cost);
                let probe =
                    outer.rows * (c.cpu_tuple_cost + c.hash_probe_cost + c.cpu_operator_cost);
                Cost::new(
                    inner.cost.total + build + outer.cost.startup,
                    inputs + build + probe + emit,
                )
            }
            JoinStrategy::NestedLoop => {
                let compare =
                    outer.rows * inner.rows * (c.cpu_tuple_cost + c.nested_loop_compare_cost);
                Cost::new(
                    outer.cost.startup + inner.cost.startup,
                    inputs + compare + emit,
                )
            }
            JoinStrategy::MergeJoin => {
                let sorts = self.sort_cost(outer.rows) + self.sort_cost(inner.rows);
                let merge = (outer.rows + inner.rows) * (c.merge_compare_cost + c.cpu_tuple_cost);
                let startup = inputs + sorts;
                Cost::new(startup, startup + merge + emit)
            }
        }
    }

    fn is_valid_join(&self, left: RelSet, right: RelSet) -> bool {
        // Cross products are only required between otherwise unconnected components.
        self.graph.connects(left, right) || self.graph.component_of(left).is_disjoint(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SimpleCostModel {
        SimpleCostModel::new()
            .with_relation(1000.0)
            .with_relation(10_000.0)
            .with_relation(500.0)
            .with_join_edge(0, 1, 0.001)
            .with_join_edge(1, 2, 0.002)
            .with_index(2)
    }

    #[test]
    fn test_scan_choices() {
        let model = model();
        let choices = model
            .scan_choices(&BaseRelation::new(2, "products"))
            .unwrap();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[1].method, ScanMethod::IndexScan);
        assert!(choices[1].ordering.is_some());

        assert!(model
            .scan_choices(&BaseRelation::new(9, "missing"))
            .is_err());
    }

    #[test]
    fn test_filter_selectivity_reduces_rows() {
        let mut model = model();
        let before = model.scan_estimate(1, ScanMethod::SeqScan);
        model.set_filter_selectivity(1, 0.01);
        let after = model.scan_estimate(1, ScanMethod::SeqScan);
        assert_eq!(before.rows, 10_000.0);
        assert_eq!(after.rows, 100.0);
        assert_eq!(before.cost, after.cost);
    }

    #[test]
    fn test_scan_cost_follows_actual_rows() {
        let model = model();
        let point = model.scan_estimate(2, ScanMethod::IndexScan);
        assert_eq!(
            model.scan_cost(2, ScanMethod::IndexScan, point.rows),
            point.cost
        );

        let tenfold = model.scan_cost(2, ScanMethod::IndexScan, point.rows * 10.0);
        assert_eq!(tenfold.startup, point.cost.startup);
        let per_row = point.cost.total - point.cost.startup;
        assert!((tenfold.total - tenfold.startup - 10.0 * per_row).abs() < 1e-9);

        // A sequential scan reads the whole table no matter how many rows qualify.
        let seq = model.scan_estimate(2, ScanMethod::SeqScan);
        assert_eq!(model.scan_cost(2, ScanMethod::SeqScan, seq.rows * 10.0), seq.cost);
    }

    #[test]
    fn test_join_rows_and_validity() {
        let model = model();
        let a = RelSet::singleton(0);
        let b = RelSet::singleton(1);
        let c = RelSet::singleton(2);
        assert_eq!(model.join_rows(a, b, 1000.0, 10_000.0), 10_000.0);
        assert!(model.is_valid_join(a, b));
        // a and c sit in the same component, joining them directly is a needless cross product
        assert!(!model.is_valid_join(a, c));
        assert_eq!(model.join_choices(a, b).len(), 3);
    }

    #[test]
    fn test_join_cost_is_cumulative() {
        let model = model();
        let outer = Estimate::new(Cost::new(0.0, 20.0), 1000.0);
        let inner = Estimate::new(Cost::new(0.0, 200.0), 10_000.0);
        for strategy in [
            JoinStrategy::HashJoin,
            JoinStrategy::NestedLoop,
            JoinStrategy::MergeJoin,
        ] {
            let cost = model.join_cost(strategy, &outer, &inner, 10_000.0);
            assert!(cost.total > 220.0, "{:?}", strategy);
            assert!(cost.startup <= cost.total);
        }
    }
}
