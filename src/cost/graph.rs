use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::relset::{RelId, RelSet};

/// Undirected join graph: relations are nodes, join predicates are edges weighted by their
/// selectivity.
#[derive(Clone, Debug, Default)]
pub struct JoinGraph {
    graph: UnGraph<RelId, f64>,
    nodes: Vec<NodeIndex>,
    components: Vec<RelSet>,
}

impl JoinGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_relation(&mut self) -> RelId {
        let id = self.nodes.len();
        self.nodes.push(self.graph.add_node(id));
        self.components.push(RelSet::singleton(id));
        id
    }

    pub fn relation_count(&self) -> usize {
        self.nodes.len()
    }

    /// Adds a join predicate. Relations are registered on demand.
    pub fn add_edge(&mut self, a: RelId, b: RelId, selectivity: f64) {
        while self.nodes.len() <= a.max(b) {
            self.add_relation();
        }
        self.graph
            .add_edge(self.nodes[a], self.nodes[b], selectivity.clamp(0.0, 1.0));
        self.recompute_components();
    }

    fn recompute_components(&mut self) {
        let mut uf = UnionFind::<usize>::new(self.nodes.len());
        for edge in self.graph.edge_references() {
            uf.union(edge.source().index(), edge.target().index());
        }
        let labels = uf.into_labeling();
        self.components = (0..self.nodes.len())
            .map(|id| {
                labels
                    .iter()
                    .enumerate()
                    .filter(|(_, label)| **label == labels[id])
                    .map(|(other, _)| self.graph[NodeIndex::new(other)])
                    .collect()
            })
            .collect();
    }

    /// Whether at least one join predicate links the two sets.
    pub fn connects(&self, left: RelSet, right: RelSet) -> bool {
        self.crossing_edges(left, right).next().is_some()
    }

    /// Combined selectivity of every predicate crossing the split, `None` for a cross product.
    pub fn selectivity_between(&self, left: RelSet, right: RelSet) -> Option<f64> {
        self.crossing_edges(left, right)
            .map(|(_, _, sel)| sel)
            .reduce(|a, b| a * b)
    }

    /// Predicates crossing the split as `(left rel, right rel, selectivity)`.
    pub fn crossing_edges(
        &self,
        left: RelSet,
        right: RelSet,
    ) -> impl Iterator<Item = (RelId, RelId, f64)> + '_ {
        self.graph.edge_references().filter_map(move |edge| {
            let a = self.graph[edge.source()];
            let b = self.graph[edge.target()];
            if left.contains(a) && right.contains(b) {
                Some((a, b, *edge.weight()))
            } else if left.contains(b) && right.contains(a) {
                Some((b, a, *edge.weight()))
            } else {
                None
            }
        })
    }

    /// Relations reachable from any member of `relids`.
    pub fn component_of(&self, relids: RelSet) -> RelSet {
        relids
            .iter()
            .filter_map(|id| self.components.get(id).copied())
            .fold(relids, |acc, c| acc | c)
    }

    pub fn is_connected(&self) -> bool {
        self.nodes.is_empty() || self.component_of(RelSet::singleton(0)).len() == self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> JoinGraph {
        // 0 - 1 - 2, 3 isolated
        let mut graph = JoinGraph::new();
        graph.add_edge(0, 1, 0.01);
        graph.add_edge(1, 2, 0.1);
        graph.add_relation();
        graph
    }

    #[test]
    fn test_connects() {
        let graph = chain();
        assert!(graph.connects(RelSet::singleton(0), RelSet::singleton(1)));
        assert!(!graph.connects(RelSet::singleton(0), RelSet::singleton(2)));
        assert!(graph.connects(RelSet::from_ids([0, 1]), RelSet::singleton(2)));
    }

    #[test]
    fn test_selectivity_between() {
        let graph = chain();
        let sel = graph.selectivity_between(RelSet::singleton(1), RelSet::from_ids([0, 2]));
        assert!((sel.unwrap_or_default() - 0.001).abs() < 1e-12);
        assert_eq!(
            graph.selectivity_between(RelSet::singleton(0), RelSet::singleton(3)),
            None
        );
    }

    #[test]
    fn test_components() {
        let graph = chain();
        assert_eq!(graph.relation_count(), 4);
        assert_eq!(graph.component_of(RelSet::singleton(2)), RelSet::full(3));
        assert_eq!(graph.component_of(RelSet::singleton(3)), RelSet::singleton(3));
        assert!(!graph.is_connected());
    }
}
