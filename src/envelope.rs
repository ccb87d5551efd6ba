//! Two-pass retention of the paths generated for one join subproblem.
//!
//! Pricing a path under every error scenario is the expensive part of the search, so the
//! explorer first computes a lower envelope on raw estimated cost and only scores what survives
//! it. The survivors are admitted into a bounded candidate list by the local objective, and the
//! diversify strategy decides which admitted paths are propagated to larger subproblems.

use std::cmp::Ordering;

use derive_more::AddAssign;
use itertools::Itertools;
use log::trace;
use rustc_hash::FxHashSet;

use crate::config::RobustConfig;
use crate::cost::CostModel;
use crate::objective::{HookSet, ObjectiveScore, ScenarioMatrix, ScoreObjective};
use crate::plan::PathRef;
use crate::relset::RelSet;
use crate::sampler::ProfileCache;

/// Path counts at each stage of the explorer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AddAssign)]
pub struct ExplorerStats {
    pub generated: usize,
    pub envelope: usize,
    pub scored: usize,
    pub admitted: usize,
    pub retained: usize,
}

/// Output of the explorer for one subproblem.
#[derive(Clone, Debug, Default)]
pub struct Retained {
    /// Paths propagated to larger subproblems, in propagation order.
    pub paths: Vec<PathRef>,
    /// The local objective's candidate list, best first.
    pub admitted: Vec<PathRef>,
    pub stats: ExplorerStats,
}

/// Result of offering a path to a [`CandidateList`].
#[derive(Clone, Debug, PartialEq)]
pub enum Admission {
    Admitted,
    /// Admitted, pushing out the given path.
    Displaced(PathRef),
    Rejected,
}

#[derive(Clone, Debug)]
struct Candidate {
    path: PathRef,
    score: ObjectiveScore,
    row: usize,
}

/// Candidates ordered by score, then raw estimated cost, then construction order, holding at
/// most `capacity` entries.
#[derive(Clone, Debug)]
pub struct CandidateList {
    capacity: usize,
    entries: Vec<Candidate>,
}

impl CandidateList {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::with_capacity(capacity.max(1) + 1),
        }
    }

    fn compare(a: &PathRef, sa: ObjectiveScore, b: &PathRef, sb: ObjectiveScore) -> Ordering {
        sa.total_cmp(&sb)
            .then_with(|| a.cost().total.total_cmp(&b.cost().total))
            .then_with(|| a.id().cmp(&b.id()))
    }

    /// Offers a path with its local score. `row` is the caller's handle for the path.
    pub fn admit(&mut self, path: PathRef, score: ObjectiveScore, row: usize) -> Admission {
        let pos = self
            .entries
            .partition_point(|c| Self::compare(&c.path, c.score, &path, score) == Ordering::Less);
        if pos >= self.capacity {
            return Admission::Rejected;
        }
        self.entries.insert(pos, Candidate { path, score, row });
        if self.entries.len() > self.capacity {
            match self.entries.pop() {
                Some(evicted) => Admission::Displaced(evicted.path),
                None => Admission::Admitted,
            }
        } else {
            Admission::Admitted
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathRef> {
        self.entries.iter().map(|c| &c.path)
    }

    pub fn scores(&self) -> impl Iterator<Item = ObjectiveScore> + '_ {
        self.entries.iter().map(|c| c.score)
    }

    fn rows(&self) -> Vec<usize> {
        self.entries.iter().map(|c| c.row).collect()
    }
}

pub struct EnvelopeExplorer<'a> {
    config: &'a RobustConfig,
    hooks: &'a HookSet,
    profiles: &'a ProfileCache,
    model: &'a dyn CostModel,
}

impl<'a> EnvelopeExplorer<'a> {
    pub fn new(
        config: &'a RobustConfig,
        hooks: &'a HookSet,
        profiles: &'a ProfileCache,
        model: &'a dyn CostModel,
    ) -> Self {
        Self {
            config,
            hooks,
            profiles,
            model,
        }
    }

    /// Size bound of the lower envelope, not counting preserved orderings.
    pub fn envelope_limit(&self) -> usize {
        self.config.add_path_limit * self.config.envelope_multiplier
    }

    /// Pass 1: drops paths dominated on raw cost by more than the configured margin.
    ///
    /// Path P is dominated when an earlier path Q has both `Q.total * margin < P.total` and
    /// `Q.startup * margin < P.startup`. The result is sorted by total cost then construction
    /// order.
    pub fn lower_envelope(&self, mut paths: Vec<PathRef>) -> Vec<PathRef> {
        paths.sort_by(|a, b| {
            a.cost()
                .total
                .total_cmp(&b.cost().total)
                .then_with(|| a.id().cmp(&b.id()))
        });

        let margin = self.config.envelope_margin;
        let mut survivors = Vec::with_capacity(paths.len());
        // Paths before `frontier` are cheap enough to dominate the current one on total cost.
        let mut frontier = 0;
        let mut min_startup = f64::INFINITY;
        for path in &paths {
            let cost = path.cost();
            while frontier < paths.len() && paths[frontier].cost().total * margin < cost.total {
                min_startup = min_startup.min(paths[frontier].cost().startup);
                frontier += 1;
            }
            if min_startup * margin < cost.startup {
                trace!("Envelope drops {:?} with cost {:?}", path.id(), cost);
            } else {
                survivors.push(path.clone());
            }
        }
        survivors.truncate(self.envelope_limit());

        if self.config.preserve_orderings {
            let mut seen = FxHashSet::default();
            let kept: FxHashSet<_> = survivors.iter().map(|p| p.id()).collect();
            for path in &paths {
                let Some(ordering) = path.ordering() else {
                    continue;
                };
                if seen.insert(ordering) && !kept.contains(&path.id()) {
                    trace!("Envelope keeps {:?} for ordering {}", path.id(), ordering);
                    survivors.push(path.clone());
                }
            }
        }
        survivors
    }

    /// Runs both passes and the diversify step over the paths generated for `relids`.
    pub fn explore(&self, relids: RelSet, generated: Vec<PathRef>) -> Retained {
        let mut stats = ExplorerStats {
            generated: generated.len(),
            ..ExplorerStats::default()
        };
        let reduced = self.lower_envelope(generated);
        stats.envelope = reduced.len();
        if reduced.is_empty() {
            return Retained {
                stats,
                ..Retained::default()
            };
        }

        let matrix = ScenarioMatrix::build(&reduced, self.profiles, self.model);
        stats.scored = matrix.len();

        let local = self.hooks.local();
        let mut candidates = CandidateList::new(self.config.add_path_limit);
        for (row, path) in reduced.iter().enumerate() {
            let score = local.score(row, &matrix);
            match candidates.admit(path.clone(), score, row) {
                Admission::Rejected => trace!("{}: rejected {:?} ({})", relids, path.id(), score),
                Admission::Displaced(old) => {
                    trace!("{}: {:?} ({}) displaces {:?}", relids, path.id(), score, old.id())
                }
                Admission::Admitted => {}
            }
        }
        let admitted: Vec<PathRef> = candidates.paths().cloned().collect();
        stats.admitted = admitted.len();

        let paths = match self.config.retain_path_limit {
            0 => admitted.clone(),
            limit => {
                let subset = matrix.subset(&candidates.rows());
                self.hooks
                    .diversify()
                    .select(&subset, limit)
                    .into_iter()
                    .map(|i| subset.path(i).clone())
                    .collect()
            }
        };
        stats.retained = paths.len();
        trace!(
            "{}: retained {}",
            relids,
            paths.iter().map(|p| p.id().seq()).join(",")
        );

        Retained {
            paths,
            admitted,
            stats,
        }
    }
}
