use std::cmp::Ordering;

use itertools::Itertools;
use log::trace;

use crate::objective::{ExpectedCost, ExplicitSet, ScenarioMatrix, ScoreObjective, Similarity};
use crate::plan::NodeSignature;

impl Similarity {
    /// Greedy max-min selection.
    ///
    /// The cheapest path by expected cost goes first. Every following pick is the path whose
    /// smallest distance to the paths already picked is the largest. A path structurally equal
    /// to a picked one is never picked.
    pub fn select(&self, matrix: &ScenarioMatrix, limit: usize) -> Vec<usize> {
        if limit == 0 || matrix.is_empty() {
            return vec![];
        }

        let order: Vec<usize> = (0..matrix.len())
            .sorted_by(|a, b| {
                ExpectedCost
                    .score(*a, matrix)
                    .total_cmp(&ExpectedCost.score(*b, matrix))
                    .then_with(|| matrix.compare_raw(*a, *b))
            })
            .collect();
        let signatures: Vec<Vec<NodeSignature>> =
            matrix.paths().iter().map(|p| p.signature()).collect();

        let mut selected = vec![order[0]];
        // Smallest distance of every candidate to the selected set so far.
        let mut nearest = vec![f64::INFINITY; matrix.len()];
        while selected.len() < limit {
            let Some(&last) = selected.last() else {
                break;
            };
            for &idx in &order {
                let d = distance(matrix, &signatures, idx, last);
                nearest[idx] = nearest[idx].min(d);
            }

            let mut next: Option<usize> = None;
            for &idx in &order {
                if selected.contains(&idx) {
                    continue;
                }
                let path = matrix.path(idx);
                if selected
                    .iter()
                    .any(|&s| path.structurally_equal(matrix.path(s)))
                {
                    continue;
                }
                match next {
                    Some(best) if nearest[idx].total_cmp(&nearest[best]) != Ordering::Greater => {}
                    _ => next = Some(idx),
                }
            }
            match next {
                Some(idx) => {
                    trace!(
                        "Similarity picks {:?} at distance {:.4}",
                        matrix.path(idx).id(),
                        nearest[idx]
                    );
                    selected.push(idx);
                }
                None => break,
            }
        }
        selected
    }
}

/// Distance in `[0, 1]` mixing plan shape and cost behaviour across scenarios.
fn distance(matrix: &ScenarioMatrix, signatures: &[Vec<NodeSignature>], a: usize, b: usize) -> f64 {
    0.5 * (1.0 - jaccard(&signatures[a], &signatures[b]))
        + 0.5 * cost_distance(matrix.totals(a), matrix.totals(b))
}

/// Jaccard index of two sorted, de-duplicated sequences.
fn jaccard(a: &[NodeSignature], b: &[NodeSignature]) -> f64 {
    let union = a.len() + b.len();
    if union == 0 {
        return 1.0;
    }
    let (mut i, mut j, mut common) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                common += 1;
                i += 1;
                j += 1;
            }
        }
    }
    common as f64 / (union - common) as f64
}

/// L1 distance normalized by the element-wise maximum.
fn cost_distance(a: &[f64], b: &[f64]) -> f64 {
    let (diff, scale) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0), |(diff, scale), (x, y)| {
            (diff + (x - y).abs(), scale + x.abs().max(y.abs()))
        });
    if scale > 0.0 {
        diff / scale
    } else {
        0.0
    }
}

impl ExplicitSet {
    /// Paths that are the cheapest in at least one scenario, most frequent winners first.
    pub fn select(&self, matrix: &ScenarioMatrix, limit: usize) -> Vec<usize> {
        if limit == 0 || matrix.is_empty() {
            return vec![];
        }
        let wins: Vec<usize> = (0..matrix.len()).map(|i| matrix.win_count(i)).collect();
        let selected: Vec<usize> = (0..matrix.len())
            .filter(|&i| wins[i] > 0)
            .sorted_by(|a, b| wins[*b].cmp(&wins[*a]).then_with(|| matrix.compare_raw(*a, *b)))
            .take(limit)
            .collect();
        if selected.is_empty() {
            // Only possible without scenarios.
            return (0..matrix.len())
                .min_by(|a, b| matrix.compare_raw(*a, *b))
                .into_iter()
                .collect();
        }
        selected
    }
}
