use crate::objective::{mean, quantile, stdev, ObjectiveScore, ScenarioMatrix, ScoreObjective};
use crate::sampler::mix_seed;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantilePenalty {
    pub quantile: f64,
}

impl ScoreObjective for QuantilePenalty {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        quantile(&matrix.penalties(idx), self.quantile).into()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExpectedPenalty;

impl ScoreObjective for ExpectedPenalty {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        mean(&matrix.penalties(idx)).into()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExpectedCost;

impl ScoreObjective for ExpectedCost {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        mean(matrix.totals(idx)).into()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExpectedStartupCost;

impl ScoreObjective for ExpectedStartupCost {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        mean(matrix.startups(idx)).into()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantileStartupCost {
    pub quantile: f64,
}

impl ScoreObjective for QuantileStartupCost {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        quantile(matrix.startups(idx), self.quantile).into()
    }
}

/// Scores `1 - P[no penalty]`, so that the path most likely to be the cheapest ranks first.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NoPenaltyProbability;

impl ScoreObjective for NoPenaltyProbability {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        let scenarios = matrix.scenario_count();
        if scenarios == 0 {
            return ObjectiveScore::from(0.0);
        }
        (1.0 - matrix.win_count(idx) as f64 / scenarios as f64).into()
    }
}

/// Uniform score in `[0, 1)` derived from the seed and the path identity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RandomScore {
    pub seed: u64,
}

impl ScoreObjective for RandomScore {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        let id = matrix.path(idx).id();
        let hash = mix_seed(mix_seed(self.seed, id.relids().bits()), id.seq() as u64);
        ((hash >> 11) as f64 / (1u64 << 53) as f64).into()
    }
}

/// Expected penalty plus `lambda` standard deviations of the penalty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenaltyPlusStdev {
    pub lambda: f64,
}

impl ScoreObjective for PenaltyPlusStdev {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        let penalties = matrix.penalties(idx);
        (mean(&penalties) + self.lambda * stdev(&penalties)).into()
    }
}

/// Diversification by structural dissimilarity. As a score it falls back to expected cost.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Similarity;

impl ScoreObjective for Similarity {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        ExpectedCost.score(idx, matrix)
    }
}

/// Diversification by scenario winners. As a score it falls back to expected cost.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExplicitSet;

impl ScoreObjective for ExplicitSet {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        ExpectedCost.score(idx, matrix)
    }
}

/// Expected cost of the join operators alone, ignoring base relation access.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JoinOnlyCost;

impl ScoreObjective for JoinOnlyCost {
    fn score(&self, idx: usize, matrix: &ScenarioMatrix) -> ObjectiveScore {
        mean(matrix.join_costs(idx)).into()
    }
}
