use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Physical join algorithms the cost model can offer for a split.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum JoinStrategy {
    NestedLoop,
    HashJoin,
    MergeJoin,
}

/// Physical join operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Join {
    strategy: JoinStrategy,
}

impl Join {
    pub fn new(strategy: JoinStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }
}
