//! Pluggable objective hooks.
//!
//! Three hooks steer the search: the *local* objective ranks new paths while a join subproblem
//! is being filled, the *diversify* strategy picks which admitted paths are propagated to larger
//! subproblems, and the *final* objective picks the plan that is executed. Each hook is chosen
//! by a numeric id from a fixed table; the ids are resolved once when the configuration is
//! loaded so no unknown id can surface mid-search.
//!
//! | id | objective                          |
//! |----|------------------------------------|
//! | 0  | quantile of penalty                |
//! | 1  | expectation of penalty             |
//! | 3  | expectation of cost                |
//! | 4  | expectation of startup cost        |
//! | 5  | quantile of startup cost           |
//! | 6  | probability of no penalty          |
//! | 7  | random                             |
//! | 11 | expected penalty + λ · stdev       |
//! | 13 | similarity (diversification)       |
//! | 14 | set (diversification)              |
//! | 16 | expectation of join-only cost      |

use std::cmp::Ordering;

use derive_more::{Display, From, Into};
use enum_dispatch::enum_dispatch;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::config::RobustConfig;
use crate::error::{OptError, OptResult};

mod scoring;
pub use scoring::*;
#[cfg(test)]
pub(crate) use scoring::test_util;
mod scorers;
pub use scorers::*;
mod diversify;

/// Output of an objective for one path. Lower is better.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Display, From, Into)]
pub struct ObjectiveScore(f64);

impl ObjectiveScore {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ObjectiveRole {
    #[strum(serialize = "local")]
    Local,
    #[strum(serialize = "diversify")]
    Diversify,
    #[strum(serialize = "final")]
    Final,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, strum_macros::Display)]
#[repr(u8)]
pub enum ObjectiveId {
    #[strum(serialize = "quantile[penalty]")]
    QuantilePenalty = 0,
    #[strum(serialize = "E[penalty]")]
    ExpectedPenalty = 1,
    #[strum(serialize = "E[cost]")]
    ExpectedCost = 3,
    #[strum(serialize = "E[startup cost]")]
    ExpectedStartupCost = 4,
    #[strum(serialize = "quantile[startup cost]")]
    QuantileStartupCost = 5,
    #[strum(serialize = "P[no penalty]")]
    NoPenaltyProbability = 6,
    #[strum(serialize = "random")]
    Random = 7,
    #[strum(serialize = "E[penalty]+lambda*stdev")]
    PenaltyPlusStdev = 11,
    #[strum(serialize = "similarity")]
    Similarity = 13,
    #[strum(serialize = "set")]
    Set = 14,
    #[strum(serialize = "E[cost] joins only")]
    JoinOnlyCost = 16,
}

impl ObjectiveId {
    pub fn from_raw(id: i64, role: ObjectiveRole) -> OptResult<Self> {
        ObjectiveId::iter()
            .find(|o| *o as i64 == id)
            .ok_or(OptError::UnknownObjective { role, id })
    }

    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Whether the id names a selection strategy rather than a score.
    pub fn is_selection_only(self) -> bool {
        matches!(self, ObjectiveId::Similarity | ObjectiveId::Set)
    }
}

#[enum_dispatch]
pub trait ScoreObjective {
    /// Scores path `idx` of the matrix. Must not depend on anything but the matrix.
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore;
}

#[enum_dispatch(ScoreObjective)]
#[derive(Clone, Debug, PartialEq)]
pub enum Objective {
    QuantilePenalty,
    ExpectedPenalty,
    ExpectedCost,
    ExpectedStartupCost,
    QuantileStartupCost,
    NoPenaltyProbability,
    RandomScore,
    PenaltyPlusStdev,
    Similarity,
    ExplicitSet,
    JoinOnlyCost,
}

impl Objective {
    pub fn from_id(id: ObjectiveId, config: &RobustConfig) -> Self {
        let quantile = config.penalty_quantile;
        match id {
            ObjectiveId::QuantilePenalty => QuantilePenalty { quantile }.into(),
            ObjectiveId::ExpectedPenalty => ExpectedPenalty.into(),
            ObjectiveId::ExpectedCost => ExpectedCost.into(),
            ObjectiveId::ExpectedStartupCost => ExpectedStartupCost.into(),
            ObjectiveId::QuantileStartupCost => QuantileStartupCost { quantile }.into(),
            ObjectiveId::NoPenaltyProbability => NoPenaltyProbability.into(),
            ObjectiveId::Random => RandomScore {
                seed: config.error_sample_seed.unwrap_or_default(),
            }
            .into(),
            ObjectiveId::PenaltyPlusStdev => PenaltyPlusStdev {
                lambda: config.penalty_stdev_lambda,
            }
            .into(),
            ObjectiveId::Similarity => Similarity.into(),
            ObjectiveId::Set => ExplicitSet.into(),
            ObjectiveId::JoinOnlyCost => JoinOnlyCost.into(),
        }
    }

    pub fn id(&self) -> ObjectiveId {
        match self {
            Objective::QuantilePenalty(_) => ObjectiveId::QuantilePenalty,
            Objective::ExpectedPenalty(_) => ObjectiveId::ExpectedPenalty,
            Objective::ExpectedCost(_) => ObjectiveId::ExpectedCost,
            Objective::ExpectedStartupCost(_) => ObjectiveId::ExpectedStartupCost,
            Objective::QuantileStartupCost(_) => ObjectiveId::QuantileStartupCost,
            Objective::NoPenaltyProbability(_) => ObjectiveId::NoPenaltyProbability,
            Objective::RandomScore(_) => ObjectiveId::Random,
            Objective::PenaltyPlusStdev(_) => ObjectiveId::PenaltyPlusStdev,
            Objective::Similarity(_) => ObjectiveId::Similarity,
            Objective::ExplicitSet(_) => ObjectiveId::Set,
            Objective::JoinOnlyCost(_) => ObjectiveId::JoinOnlyCost,
        }
    }

    /// Scores every path of the matrix and orders them best first.
    ///
    /// Ties go to the lower raw estimated cost, then to the earlier constructed path.
    pub fn rank(&self, matrix: &ScenarioMatrix) -> Vec<(usize, ObjectiveScore)> {
        let mut ranked: Vec<(usize, ObjectiveScore)> = (0..matrix.len())
            .map(|idx| (idx, self.score(idx, matrix)))
            .collect();
        ranked.sort_by(|(a, sa), (b, sb)| {
            sa.total_cmp(sb)
                .then_with(|| matrix.compare_raw(*a, *b))
        });
        ranked
    }

    /// Diversification: picks at most `limit` matrix rows to propagate, in propagation order.
    pub fn select(&self, matrix: &ScenarioMatrix, limit: usize) -> Vec<usize> {
        match self {
            Objective::Similarity(s) => s.select(matrix, limit),
            Objective::ExplicitSet(s) => s.select(matrix, limit),
            other => other
                .rank(matrix)
                .into_iter()
                .take(limit)
                .map(|(idx, _)| idx)
                .collect(),
        }
    }
}

impl TryFrom<u8> for ObjectiveId {
    type Error = OptError;

    fn try_from(id: u8) -> OptResult<Self> {
        ObjectiveId::from_raw(id as i64, ObjectiveRole::Local)
    }
}

/// The three configured hooks.
#[derive(Clone, Debug, PartialEq)]
pub struct HookSet {
    local: Objective,
    diversify: Objective,
    final_objective: Objective,
}

impl HookSet {
    pub fn from_config(config: &RobustConfig) -> OptResult<Self> {
        Ok(Self {
            local: Objective::from_id(config.objective_id(ObjectiveRole::Local)?, config),
            diversify: Objective::from_id(config.objective_id(ObjectiveRole::Diversify)?, config),
            final_objective: Objective::from_id(config.objective_id(ObjectiveRole::Final)?, config),
        })
    }

    pub fn local(&self) -> &Objective {
        &self.local
    }

    pub fn diversify(&self) -> &Objective {
        &self.diversify
    }

    pub fn final_objective(&self) -> &Objective {
        &self.final_objective
    }

    pub fn get(&self, role: ObjectiveRole) -> &Objective {
        match role {
            ObjectiveRole::Local => &self.local,
            ObjectiveRole::Diversify => &self.diversify,
            ObjectiveRole::Final => &self.final_objective,
        }
    }

    /// Applies the final objective: the best ranked row and its score.
    pub fn select_final(&self, matrix: &ScenarioMatrix) -> Option<(usize, ObjectiveScore)> {
        self.final_objective.rank(matrix).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_table() {
        let valid: Vec<u8> = ObjectiveId::iter().map(ObjectiveId::raw).collect();
        assert_eq!(valid, vec![0, 1, 3, 4, 5, 6, 7, 11, 13, 14, 16]);

        for reserved in [2, 8, 9, 10, 12, 15] {
            assert!(matches!(
                ObjectiveId::from_raw(reserved, ObjectiveRole::Local),
                Err(OptError::UnknownObjective { id, .. }) if id == reserved
            ));
        }
        assert_eq!(
            ObjectiveId::from_raw(13, ObjectiveRole::Diversify).unwrap(),
            ObjectiveId::Similarity
        );
    }

    #[test]
    fn test_hooks_from_config() {
        let config = RobustConfig {
            main_objective_id: 11,
            retain_strategy_id: 13,
            final_score_id: 3,
            ..RobustConfig::default()
        };
        let hooks = HookSet::from_config(&config).unwrap();
        assert_eq!(hooks.local().id(), ObjectiveId::PenaltyPlusStdev);
        assert_eq!(hooks.diversify().id(), ObjectiveId::Similarity);
        assert_eq!(hooks.get(ObjectiveRole::Final).id(), ObjectiveId::ExpectedCost);
        assert!(hooks.diversify().id().is_selection_only());
    }

    #[test]
    fn test_score_ordering() {
        let a = ObjectiveScore::from(1.0);
        let b = ObjectiveScore::from(2.0);
        assert_eq!(a.total_cmp(&b), Ordering::Less);
        assert_eq!(f64::from(b), 2.0);
        assert_eq!(a.to_string(), "1");
    }
}
