//! Side-channel output of the selected plan's robustness score.

use std::fs;
use std::path::PathBuf;

use log::{debug, warn};

use crate::config::RobustConfig;
use crate::error::OptResult;
use crate::plan::Plan;

/// Where the score file goes, if anywhere. Relative names live in the error profile directory
/// when one is configured.
pub fn score_path(config: &RobustConfig) -> Option<PathBuf> {
    let name = config.score_filename.as_ref()?;
    match &config.error_profile_path {
        Some(dir) if name.is_relative() => Some(dir.join(name)),
        _ => Some(name.clone()),
    }
}

/// One line: `score=<f> cost=<f> rows=<f> relids=<set>`.
pub fn format_score(plan: &Plan) -> String {
    let root = plan.root();
    format!(
        "score={} cost={} rows={} relids={}\n",
        plan.score(),
        root.cost().total,
        root.rows(),
        root.relids()
    )
}

pub fn try_write_score(config: &RobustConfig, plan: &Plan) -> OptResult<Option<PathBuf>> {
    let Some(path) = score_path(config) else {
        return Ok(None);
    };
    fs::write(&path, format_score(plan))?;
    Ok(Some(path))
}

/// Writes the score file. Failures are logged and otherwise ignored.
pub fn write_score(config: &RobustConfig, plan: &Plan) {
    match try_write_score(config, plan) {
        Ok(Some(path)) => debug!("Wrote plan score to {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Failed to write plan score: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{Cost, Estimate, ScanChoice};
    use crate::objective::ObjectiveScore;
    use crate::operator::ScanMethod;
    use crate::plan::PathBuilder;
    use crate::query::BaseRelation;
    use crate::relset::RelSet;

    fn plan() -> Plan {
        let path = PathBuilder::new(RelSet::singleton(0)).scan(
            &BaseRelation::new(0, "t"),
            &ScanChoice {
                method: ScanMethod::SeqScan,
                estimate: Estimate::new(Cost::new(0.0, 12.5), 40.0),
                ordering: None,
            },
        );
        Plan::new(path.clone(), ObjectiveScore::from(3.25), vec![path])
    }

    #[test]
    fn test_score_path_resolution() {
        let mut config = RobustConfig::default();
        assert_eq!(score_path(&config), None);

        config.score_filename = Some("score.txt".into());
        assert_eq!(score_path(&config), Some(PathBuf::from("score.txt")));

        config.error_profile_path = Some("/var/profiles".into());
        assert_eq!(
            score_path(&config),
            Some(PathBuf::from("/var/profiles/score.txt"))
        );

        config.score_filename = Some("/tmp/abs.txt".into());
        assert_eq!(score_path(&config), Some(PathBuf::from("/tmp/abs.txt")));
    }

    #[test]
    fn test_write_score() {
        let dir = tempfile::tempdir().unwrap();
        let config = RobustConfig {
            error_profile_path: Some(dir.path().to_path_buf()),
            score_filename: Some("score.txt".into()),
            ..RobustConfig::default()
        };
        let written = try_write_score(&config, &plan()).unwrap().unwrap();
        assert_eq!(
            fs::read_to_string(written).unwrap(),
            "score=3.25 cost=12.5 rows=40 relids={0}\n"
        );
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let config = RobustConfig {
            score_filename: Some("/nonexistent-dir/for/score.txt".into()),
            ..RobustConfig::default()
        };
        assert!(try_write_score(&config, &plan()).is_err());
        write_score(&config, &plan());
    }
}
