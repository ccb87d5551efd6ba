//! Sets of base relations.
//!
//! Every join subproblem is identified by the set of base relations it covers. Queries are
//! limited to 64 relations so a set fits in one machine word, which keeps subset enumeration a
//! matter of bit twiddling.

use std::fmt::{Debug, Display, Formatter};

use derive_more::{BitAnd, BitOr, BitXor};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Index of a base relation inside its query.
pub type RelId = usize;

/// Upper bound on relations representable by a [`RelSet`].
pub const MAX_RELATIONS: usize = 64;

#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BitAnd,
    BitOr,
    BitXor,
    Serialize,
    Deserialize,
)]
pub struct RelSet(u64);

impl RelSet {
    pub const EMPTY: RelSet = RelSet(0);

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn singleton(id: RelId) -> Self {
        debug_assert!(id < MAX_RELATIONS);
        Self(1u64 << id)
    }

    /// Set of relations `0..n`.
    pub fn full(n: usize) -> Self {
        if n >= MAX_RELATIONS {
            Self(u64::MAX)
        } else {
            Self((1u64 << n) - 1)
        }
    }

    pub fn from_ids<I: IntoIterator<Item = RelId>>(ids: I) -> Self {
        ids.into_iter()
            .fold(Self::EMPTY, |acc, id| acc | Self::singleton(id))
    }

    pub fn contains(self, id: RelId) -> bool {
        id < MAX_RELATIONS && self.0 & (1u64 << id) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: RelSet) -> RelSet {
        self | other
    }

    pub fn intersection(self, other: RelSet) -> RelSet {
        self & other
    }

    pub fn difference(self, other: RelSet) -> RelSet {
        RelSet(self.0 & !other.0)
    }

    pub fn is_subset_of(self, other: RelSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_disjoint(self, other: RelSet) -> bool {
        self.0 & other.0 == 0
    }

    pub fn first(self) -> Option<RelId> {
        if self.is_empty() {
            None
        } else {
            Some(self.0.trailing_zeros() as RelId)
        }
    }

    /// Relation ids in ascending order.
    pub fn iter(self) -> RelSetIter {
        RelSetIter { remaining: self.0 }
    }

    /// Non-empty proper subsets, from the largest bit pattern down.
    pub fn proper_subsets(self) -> ProperSubsets {
        ProperSubsets {
            mask: self.0,
            current: self.0,
        }
    }
}

pub struct RelSetIter {
    remaining: u64,
}

impl Iterator for RelSetIter {
    type Item = RelId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.remaining.trailing_zeros() as RelId;
        self.remaining &= self.remaining - 1;
        Some(id)
    }
}

pub struct ProperSubsets {
    mask: u64,
    current: u64,
}

impl Iterator for ProperSubsets {
    type Item = RelSet;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == 0 {
            return None;
        }
        self.current = (self.current - 1) & self.mask;
        if self.current == 0 {
            None
        } else {
            Some(RelSet(self.current))
        }
    }
}

impl FromIterator<RelId> for RelSet {
    fn from_iter<T: IntoIterator<Item = RelId>>(iter: T) -> Self {
        RelSet::from_ids(iter)
    }
}

impl IntoIterator for RelSet {
    type Item = RelId;
    type IntoIter = RelSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for RelSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.iter().join(","))
    }
}

impl Debug for RelSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RelSet{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_algebra() {
        let ab = RelSet::from_ids([0, 1]);
        let bc = RelSet::from_ids([1, 2]);

        assert_eq!(ab.union(bc), RelSet::full(3));
        assert_eq!(ab.intersection(bc), RelSet::singleton(1));
        assert_eq!(ab.difference(bc), RelSet::singleton(0));
        assert!(RelSet::singleton(0).is_subset_of(ab));
        assert!(!ab.is_disjoint(bc));
        assert!(RelSet::singleton(0).is_disjoint(bc));
        assert_eq!(ab.len(), 2);
        assert_eq!(bc.first(), Some(1));
        assert_eq!(RelSet::EMPTY.first(), None);
    }

    #[test]
    fn test_full_set_limits() {
        assert_eq!(RelSet::full(0), RelSet::EMPTY);
        assert_eq!(RelSet::full(3).bits(), 0b111);
        assert_eq!(RelSet::full(64).len(), 64);
    }

    #[test]
    fn test_proper_subsets() {
        let subsets: Vec<RelSet> = RelSet::full(3).proper_subsets().collect();
        assert_eq!(subsets.len(), 6);
        assert!(!subsets.contains(&RelSet::full(3)));
        assert!(!subsets.contains(&RelSet::EMPTY));

        assert_eq!(RelSet::singleton(4).proper_subsets().count(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(RelSet::from_ids([2, 0, 5]).to_string(), "{0,2,5}");
        assert_eq!(RelSet::EMPTY.to_string(), "{}");
        assert_eq!(
            RelSet::from_ids([3, 1]).iter().collect::<Vec<_>>(),
            vec![1, 3]
        );
    }
}
