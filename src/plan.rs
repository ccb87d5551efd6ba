use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use crate::cost::{Cost, CostModel, Estimate, JoinChoice, OrderingId, ScanChoice};
use crate::objective::ObjectiveScore;
use crate::operator::{Join, JoinStrategy, Operator, ScanMethod, TableScan};
use crate::query::BaseRelation;
use crate::relset::{RelId, RelSet};
use crate::sampler::ErrorScenario;

pub type PathRef = Arc<Path>;

/// Identity of a path: the subproblem that generated it plus its construction order there.
///
/// Construction order is deterministic for a given query and configuration, which makes it a
/// reproducible tie-breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId {
    relids: RelSet,
    seq: u32,
}

impl PathId {
    pub fn relids(&self) -> RelSet {
        self.relids
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }
}

/// One concrete way to produce the rows of a join subproblem.
///
/// Paths are immutable once built. Sub-paths are shared: the same cheap two-way join is usually
/// the input of many larger candidates.
pub struct Path {
    id: PathId,
    operator: Operator,
    inputs: SmallVec<[PathRef; 2]>,
    relids: RelSet,
    estimate: Estimate,
    ordering: Option<OrderingId>,
}

/// The `eq` should ignore `id`.
impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.inputs == other.inputs
            && self.relids == other.relids
            && self.estimate == other.estimate
            && self.ordering == other.ordering
    }
}

impl Debug for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Path")
            .field("id", &self.id)
            .field("operator", &self.operator)
            .field("relids", &self.relids)
            .field("cost", &self.estimate.cost.total)
            .field("rows", &self.estimate.rows)
            .field("inputs", &self.inputs)
            .finish()
    }
}

/// Building block of structural similarity between two paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeSignature {
    Scan(RelId, ScanMethod),
    Join(JoinStrategy, RelSet, RelSet),
}

/// Price of a path under one error scenario.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScenarioCost {
    pub estimate: Estimate,
    /// Share of the total spent in join operators, excluding scans.
    pub join_cost: f64,
}

impl Path {
    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn inputs(&self) -> &[PathRef] {
        &self.inputs
    }

    pub fn relids(&self) -> RelSet {
        self.relids
    }

    pub fn estimate(&self) -> &Estimate {
        &self.estimate
    }

    pub fn cost(&self) -> Cost {
        self.estimate.cost
    }

    pub fn rows(&self) -> f64 {
        self.estimate.rows
    }

    pub fn ordering(&self) -> Option<OrderingId> {
        self.ordering
    }

    pub fn construction_order(&self) -> u32 {
        self.id.seq
    }

    pub fn is_join(&self) -> bool {
        matches!(self.operator, Operator::Join(_))
    }

    pub fn outer(&self) -> Option<&PathRef> {
        self.inputs.first()
    }

    pub fn inner(&self) -> Option<&PathRef> {
        self.inputs.get(1)
    }

    pub fn join_strategy(&self) -> Option<JoinStrategy> {
        self.operator.as_join().map(Join::strategy)
    }

    /// Number of join operators in the tree.
    pub fn join_count(&self) -> usize {
        usize::from(self.is_join()) + self.inputs.iter().map(|i| i.join_count()).sum::<usize>()
    }

    /// Same operator over the very same sub-paths.
    pub fn structurally_equal(&self, other: &Path) -> bool {
        self.operator == other.operator
            && self.inputs.len() == other.inputs.len()
            && self
                .inputs
                .iter()
                .zip(other.inputs.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    /// Sorted, de-duplicated operator shapes of the whole tree.
    pub fn signature(&self) -> Vec<NodeSignature> {
        let mut signature = Vec::new();
        self.collect_signature(&mut signature);
        signature.sort();
        signature.dedup();
        signature
    }

    fn collect_signature(&self, out: &mut Vec<NodeSignature>) {
        match &self.operator {
            Operator::Scan(scan) => out.push(NodeSignature::Scan(scan.relation(), scan.method())),
            Operator::Join(join) => {
                let outer = self.outer().map(|p| p.relids).unwrap_or_default();
                let inner = self.inner().map(|p| p.relids).unwrap_or_default();
                out.push(NodeSignature::Join(join.strategy(), outer, inner));
            }
        }
        for input in &self.inputs {
            input.collect_signature(out);
        }
    }

    /// Re-prices the tree bottom-up under an error scenario.
    ///
    /// The actual row count of every node is what the cost model derives from the actual input
    /// sizes, scaled by the scenario's factor for the node's relation set.
    pub fn cost_under<S: ErrorScenario + ?Sized>(
        &self,
        model: &dyn CostModel,
        scenario: &S,
    ) -> ScenarioCost {
        match &self.operator {
            Operator::Scan(scan) => {
                let point = model.scan_estimate(scan.relation(), scan.method());
                let rows = point.rows * scenario.factor(self.relids);
                ScenarioCost {
                    estimate: Estimate::new(
                        model.scan_cost(scan.relation(), scan.method(), rows),
                        rows,
                    ),
                    join_cost: 0.0,
                }
            }
            Operator::Join(join) => {
                let (Some(outer), Some(inner)) = (self.outer(), self.inner()) else {
                    return ScenarioCost::default();
                };
                let outer_cost = outer.cost_under(model, scenario);
                let inner_cost = inner.cost_under(model, scenario);
                let rows = model.join_rows(
                    outer.relids,
                    inner.relids,
                    outer_cost.estimate.rows,
                    inner_cost.estimate.rows,
                ) * scenario.factor(self.relids);
                let cost = model.join_cost(
                    join.strategy(),
                    &outer_cost.estimate,
                    &inner_cost.estimate,
                    rows,
                );
                let own =
                    cost.total - outer_cost.estimate.cost.total - inner_cost.estimate.cost.total;
                ScenarioCost {
                    estimate: Estimate::new(cost, rows),
                    join_cost: outer_cost.join_cost + inner_cost.join_cost + own.max(0.0),
                }
            }
        }
    }
}

/// Hands out paths for one join subproblem in construction order.
pub struct PathBuilder {
    relids: RelSet,
    next_seq: u32,
}

impl PathBuilder {
    pub fn new(relids: RelSet) -> Self {
        Self {
            relids,
            next_seq: 0,
        }
    }

    fn next_id(&mut self) -> PathId {
        let id = PathId {
            relids: self.relids,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        id
    }

    pub fn built(&self) -> usize {
        self.next_seq as usize
    }

    pub fn scan(&mut self, relation: &BaseRelation, choice: &ScanChoice) -> PathRef {
        debug_assert_eq!(self.relids, RelSet::singleton(relation.id()));
        Arc::new(Path {
            id: self.next_id(),
            operator: Operator::Scan(TableScan::new(
                relation.id(),
                relation.name(),
                choice.method,
            )),
            inputs: SmallVec::new(),
            relids: self.relids,
            estimate: choice.estimate,
            ordering: choice.ordering,
        })
    }

    /// Joins two paths of disjoint relation sets whose union is this builder's subproblem.
    pub fn join(
        &mut self,
        choice: &JoinChoice,
        outer: &PathRef,
        inner: &PathRef,
        estimate: Estimate,
    ) -> PathRef {
        debug_assert!(outer.relids.is_disjoint(inner.relids));
        debug_assert_eq!(outer.relids | inner.relids, self.relids);
        Arc::new(Path {
            id: self.next_id(),
            operator: Operator::Join(Join::new(choice.strategy)),
            inputs: smallvec![outer.clone(), inner.clone()],
            relids: self.relids,
            estimate,
            ordering: choice.ordering,
        })
    }
}

/// Output of a compilation: the selected path plus the final candidate list it was chosen from.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    root: PathRef,
    score: ObjectiveScore,
    candidates: Vec<PathRef>,
}

impl Plan {
    pub fn new(root: PathRef, score: ObjectiveScore, candidates: Vec<PathRef>) -> Self {
        Self {
            root,
            score,
            candidates,
        }
    }

    pub fn root(&self) -> PathRef {
        self.root.clone()
    }

    /// Robustness score of the selected path under the final objective.
    pub fn score(&self) -> ObjectiveScore {
        self.score
    }

    pub fn candidates(&self) -> &[PathRef] {
        &self.candidates
    }

    /// Breadth first walk over the distinct nodes of the selected tree.
    pub fn bfs_iterator(&self) -> impl Iterator<Item = PathRef> {
        let mut queue = std::collections::VecDeque::from([self.root.clone()]);
        std::iter::from_fn(move || {
            let next = queue.pop_front()?;
            queue.extend(next.inputs.iter().cloned());
            Some(next)
        })
    }
}
