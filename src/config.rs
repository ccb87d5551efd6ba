//! Search configuration.
//!
//! All settings are read once at the start of a compilation. Keys are case-insensitive and may
//! be supplied one at a time, as pairs, or as `key = value` lines:
//!
//! ```text
//! # robustness settings
//! error_sample_count = 32
//! MAIN_OBJECTIVE_ID  = 11
//! score_filename     = 'scores.txt'
//! ```

use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use rustc_hash::FxHasher;

use crate::error::{OptError, OptResult};
use crate::objective::{HookSet, ObjectiveId, ObjectiveRole};

pub const ERROR_SAMPLE_COUNT_RANGE: RangeInclusive<usize> = 4..=64;
pub const ERROR_BIN_COUNT_RANGE: RangeInclusive<usize> = 1..=8;
pub const KDE_BANDWIDTH_RANGE: RangeInclusive<f64> = 0.0..=2.0;
pub const OBJECTIVE_ID_RANGE: RangeInclusive<i64> = 0..=16;
pub const ADD_PATH_LIMIT_RANGE: RangeInclusive<usize> = 1..=64;
pub const RETAIN_PATH_LIMIT_RANGE: RangeInclusive<usize> = 0..=64;
pub const PENALTY_QUANTILE_RANGE: RangeInclusive<f64> = 0.0..=1.0;
pub const STDEV_LAMBDA_RANGE: RangeInclusive<f64> = 0.0..=10.0;
pub const ENVELOPE_MARGIN_RANGE: RangeInclusive<f64> = 1.0..=100.0;
pub const ENVELOPE_MULTIPLIER_RANGE: RangeInclusive<usize> = 1..=16;
pub const PARALLEL_WORKERS_RANGE: RangeInclusive<usize> = 0..=64;
pub const MAX_RELATIONS_RANGE: RangeInclusive<usize> = 2..=24;
pub const BUCKETS_PER_DECADE_RANGE: RangeInclusive<u32> = 1..=10;

#[derive(Clone, Debug, PartialEq)]
pub struct RobustConfig {
    /// Directory holding persisted error-profile artifacts.
    pub error_profile_path: Option<PathBuf>,
    /// Side-channel output for the selected plan's robustness score.
    pub score_filename: Option<PathBuf>,
    pub error_sample_count: usize,
    pub error_bin_count: usize,
    pub error_sample_kde_bandwidth: f64,
    pub error_sample_seed: Option<u64>,
    pub main_objective_id: i64,
    pub retain_strategy_id: i64,
    pub final_score_id: i64,
    pub add_path_limit: usize,
    /// 0 propagates the locally admitted candidates unchanged.
    pub retain_path_limit: usize,
    pub penalty_quantile: f64,
    pub penalty_stdev_lambda: f64,
    pub envelope_margin: f64,
    pub envelope_multiplier: usize,
    pub preserve_orderings: bool,
    pub parallel_workers: usize,
    pub max_relations: usize,
    pub pqo_buckets_per_decade: u32,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            error_profile_path: None,
            score_filename: None,
            error_sample_count: 20,
            error_bin_count: 1,
            error_sample_kde_bandwidth: 0.5,
            error_sample_seed: None,
            main_objective_id: 0,
            retain_strategy_id: 0,
            final_score_id: 0,
            add_path_limit: 1,
            retain_path_limit: 1,
            penalty_quantile: 0.9,
            penalty_stdev_lambda: 1.0,
            envelope_margin: 2.0,
            envelope_multiplier: 4,
            preserve_orderings: false,
            parallel_workers: 0,
            max_relations: 16,
            pqo_buckets_per_decade: 2,
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    key: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> OptResult<T> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(OptError::config(
            key,
            format!(
                "{} is outside the range {}..={}",
                value,
                range.start(),
                range.end()
            ),
        ))
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> OptResult<T> {
    value
        .parse::<T>()
        .map_err(|_| OptError::config(key, format!("cannot parse `{}`", value)))
}

fn parse_bool(key: &str, value: &str) -> OptResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(OptError::config(key, format!("`{}` is not a boolean", value))),
    }
}

fn optional(value: &str) -> Option<&str> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value)
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

impl RobustConfig {
    /// Sets one key. Keys are matched case-insensitively; unknown keys are rejected.
    pub fn set(&mut self, key: &str, value: &str) -> OptResult<()> {
        let key = key.trim().to_ascii_lowercase();
        let value = unquote(value);
        let k = key.as_str();
        match k {
            "error_profile_path" => self.error_profile_path = optional(value).map(PathBuf::from),
            "score_filename" => self.score_filename = optional(value).map(PathBuf::from),
            "error_sample_count" => {
                self.error_sample_count =
                    check_range(k, parse_value(k, value)?, &ERROR_SAMPLE_COUNT_RANGE)?
            }
            "error_bin_count" => {
                self.error_bin_count =
                    check_range(k, parse_value(k, value)?, &ERROR_BIN_COUNT_RANGE)?
            }
            "error_sample_kde_bandwidth" => {
                self.error_sample_kde_bandwidth =
                    check_range(k, parse_value(k, value)?, &KDE_BANDWIDTH_RANGE)?
            }
            "error_sample_seed" => {
                self.error_sample_seed = match optional(value) {
                    Some(v) => Some(parse_value::<i64>(k, v)? as u64),
                    None => None,
                }
            }
            "main_objective_id" => {
                self.main_objective_id =
                    check_range(k, parse_value(k, value)?, &OBJECTIVE_ID_RANGE)?
            }
            "retain_strategy_id" => {
                self.retain_strategy_id =
                    check_range(k, parse_value(k, value)?, &OBJECTIVE_ID_RANGE)?
            }
            "final_score_id" => {
                self.final_score_id = check_range(k, parse_value(k, value)?, &OBJECTIVE_ID_RANGE)?
            }
            "add_path_limit" => {
                self.add_path_limit = check_range(k, parse_value(k, value)?, &ADD_PATH_LIMIT_RANGE)?
            }
            "retain_path_limit" => {
                self.retain_path_limit =
                    check_range(k, parse_value(k, value)?, &RETAIN_PATH_LIMIT_RANGE)?
            }
            "penalty_quantile" => {
                self.penalty_quantile =
                    check_range(k, parse_value(k, value)?, &PENALTY_QUANTILE_RANGE)?
            }
            "penalty_stdev_lambda" => {
                self.penalty_stdev_lambda =
                    check_range(k, parse_value(k, value)?, &STDEV_LAMBDA_RANGE)?
            }
            "envelope_margin" => {
                self.envelope_margin =
                    check_range(k, parse_value(k, value)?, &ENVELOPE_MARGIN_RANGE)?
            }
            "envelope_multiplier" => {
                self.envelope_multiplier =
                    check_range(k, parse_value(k, value)?, &ENVELOPE_MULTIPLIER_RANGE)?
            }
            "preserve_orderings" => self.preserve_orderings = parse_bool(k, value)?,
            "parallel_workers" => {
                self.parallel_workers =
                    check_range(k, parse_value(k, value)?, &PARALLEL_WORKERS_RANGE)?
            }
            "max_relations" => {
                self.max_relations = check_range(k, parse_value(k, value)?, &MAX_RELATIONS_RANGE)?
            }
            "pqo_buckets_per_decade" => {
                self.pqo_buckets_per_decade =
                    check_range(k, parse_value(k, value)?, &BUCKETS_PER_DECADE_RANGE)?
            }
            _ => return Err(OptError::config(k, "unknown configuration key")),
        }
        Ok(())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> OptResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            config.set(key.as_ref(), value.as_ref())?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks every range and resolves the hook ids.
    ///
    /// Fields are public, so this must run again after direct mutation; the optimizer context
    /// calls it before any search starts.
    pub fn validate(&self) -> OptResult<()> {
        check_range(
            "error_sample_count",
            self.error_sample_count,
            &ERROR_SAMPLE_COUNT_RANGE,
        )?;
        check_range("error_bin_count", self.error_bin_count, &ERROR_BIN_COUNT_RANGE)?;
        check_range(
            "error_sample_kde_bandwidth",
            self.error_sample_kde_bandwidth,
            &KDE_BANDWIDTH_RANGE,
        )?;
        check_range("add_path_limit", self.add_path_limit, &ADD_PATH_LIMIT_RANGE)?;
        check_range(
            "retain_path_limit",
            self.retain_path_limit,
            &RETAIN_PATH_LIMIT_RANGE,
        )?;
        check_range("penalty_quantile", self.penalty_quantile, &PENALTY_QUANTILE_RANGE)?;
        check_range(
            "penalty_stdev_lambda",
            self.penalty_stdev_lambda,
            &STDEV_LAMBDA_RANGE,
        )?;
        check_range("envelope_margin", self.envelope_margin, &ENVELOPE_MARGIN_RANGE)?;
        check_range(
            "envelope_multiplier",
            self.envelope_multiplier,
            &ENVELOPE_MULTIPLIER_RANGE,
        )?;
        check_range("parallel_workers", self.parallel_workers, &PARALLEL_WORKERS_RANGE)?;
        check_range("max_relations", self.max_relations, &MAX_RELATIONS_RANGE)?;
        check_range(
            "pqo_buckets_per_decade",
            self.pqo_buckets_per_decade,
            &BUCKETS_PER_DECADE_RANGE,
        )?;
        self.objective_id(ObjectiveRole::Local)?;
        self.objective_id(ObjectiveRole::Diversify)?;
        self.objective_id(ObjectiveRole::Final)?;
        Ok(())
    }

    pub fn config_key(role: ObjectiveRole) -> &'static str {
        match role {
            ObjectiveRole::Local => "main_objective_id",
            ObjectiveRole::Diversify => "retain_strategy_id",
            ObjectiveRole::Final => "final_score_id",
        }
    }

    /// Resolves the configured id of one hook.
    pub fn objective_id(&self, role: ObjectiveRole) -> OptResult<ObjectiveId> {
        let raw = match role {
            ObjectiveRole::Local => self.main_objective_id,
            ObjectiveRole::Diversify => self.retain_strategy_id,
            ObjectiveRole::Final => self.final_score_id,
        };
        check_range(Self::config_key(role), raw, &OBJECTIVE_ID_RANGE)?;
        ObjectiveId::from_raw(raw, role)
    }

    pub fn hooks(&self) -> OptResult<HookSet> {
        HookSet::from_config(self)
    }

    /// Version stamp over every setting that can change which candidates a search produces.
    ///
    /// Output-only settings (`score_filename`) and execution settings (`parallel_workers`) are
    /// left out.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.error_profile_path.hash(&mut hasher);
        self.error_sample_count.hash(&mut hasher);
        self.error_bin_count.hash(&mut hasher);
        self.error_sample_kde_bandwidth.to_bits().hash(&mut hasher);
        self.error_sample_seed.hash(&mut hasher);
        self.main_objective_id.hash(&mut hasher);
        self.retain_strategy_id.hash(&mut hasher);
        self.final_score_id.hash(&mut hasher);
        self.add_path_limit.hash(&mut hasher);
        self.retain_path_limit.hash(&mut hasher);
        self.penalty_quantile.to_bits().hash(&mut hasher);
        self.penalty_stdev_lambda.to_bits().hash(&mut hasher);
        self.envelope_margin.to_bits().hash(&mut hasher);
        self.envelope_multiplier.hash(&mut hasher);
        self.preserve_orderings.hash(&mut hasher);
        self.max_relations.hash(&mut hasher);
        self.pqo_buckets_per_decade.hash(&mut hasher);
        hasher.finish()
    }
}

impl FromStr for RobustConfig {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Self::default();
        for (line_no, line) in s.lines().enumerate() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                OptError::config(
                    line.to_string(),
                    format!("line {} is not of the form `key = value`", line_no + 1),
                )
            })?;
            config.set(key, value)?;
        }
        config.validate()?;
        Ok(config)
    }
}
