use thiserror::Error;

use crate::objective::ObjectiveRole;
use crate::relset::RelSet;

pub type OptResult<T> = Result<T, OptError>;

/// Errors raised while configuring or running a robust join search.
#[derive(Error, Debug)]
pub enum OptError {
    #[error("invalid value for configuration key `{key}`: {reason}")]
    Configuration { key: String, reason: String },

    #[error("unknown objective id {id} for {role} hook")]
    UnknownObjective { role: ObjectiveRole, id: i64 },

    #[error("no usable error observations for relation set {relids}")]
    InsufficientStatistics { relids: RelSet },

    #[error("no feasible plan for join subproblem {relids} [{relations}]")]
    NoFeasiblePlan { relids: RelSet, relations: String },

    #[error("query joins {count} relations, exhaustive search supports at most {max}")]
    TooManyRelations { count: usize, max: usize },

    #[error("compilation cancelled before join subproblem {relids}")]
    Cancelled { relids: RelSet },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl OptError {
    pub fn config<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        OptError::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Configuration-class errors are fatal for the compilation and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            OptError::Configuration { .. }
                | OptError::UnknownObjective { .. }
                | OptError::TooManyRelations { .. }
        )
    }

    /// Only missing statistics can be absorbed by degrading to cost-only scoring.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OptError::InsufficientStatistics { .. })
    }

    /// The join subproblem that first became infeasible, if this is a feasibility error.
    pub fn infeasible_relids(&self) -> Option<RelSet> {
        match self {
            OptError::NoFeasiblePlan { relids, .. } => Some(*relids),
            _ => None,
        }
    }
}
