use log::debug;
use rustc_hash::FxHashMap;

use crate::envelope::{ExplorerStats, Retained};
use crate::plan::PathRef;
use crate::relset::RelSet;

/// The finalized candidate list of one relation set.
#[derive(Clone, Debug)]
pub struct JoinSubproblem {
    relids: RelSet,
    candidates: Vec<PathRef>,
    generation: u64,
    stats: ExplorerStats,
}

impl JoinSubproblem {
    pub fn relids(&self) -> RelSet {
        self.relids
    }

    /// Paths propagated to larger subproblems.
    pub fn candidates(&self) -> &[PathRef] {
        &self.candidates
    }

    /// Order in which the subproblem was finalized within its search.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &ExplorerStats {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// All subproblems of one search, keyed by relation set.
#[derive(Debug, Default)]
pub struct SubproblemArena {
    entries: FxHashMap<RelSet, JoinSubproblem>,
    generation: u64,
}

impl SubproblemArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalizes a subproblem with the explorer's output, replacing any previous list as a whole.
    pub fn insert(&mut self, relids: RelSet, retained: Retained) -> &JoinSubproblem {
        self.generation += 1;
        let subproblem = JoinSubproblem {
            relids,
            candidates: retained.paths,
            generation: self.generation,
            stats: retained.stats,
        };
        if let Some(old) = self.entries.insert(relids, subproblem) {
            debug!(
                "Replaced subproblem {} of generation {}",
                relids,
                old.generation()
            );
        }
        &self.entries[&relids]
    }

    pub fn get(&self, relids: RelSet) -> Option<&JoinSubproblem> {
        self.entries.get(&relids)
    }

    pub fn contains(&self, relids: RelSet) -> bool {
        self.entries.contains_key(&relids)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JoinSubproblem> {
        self.entries.values()
    }

    /// Explorer counters summed over every subproblem.
    pub fn total_stats(&self) -> ExplorerStats {
        let mut total = ExplorerStats::default();
        for subproblem in self.entries.values() {
            total += subproblem.stats;
        }
        total
    }
}
