//! Reconciliation configuration.
//!
//! Defaults mirror the production policy; every knob can be overridden from
//! `SHELFSYNC_*` environment variables.

use std::time::Duration;

use thiserror::Error;

use shelfsync_inventory::policy::{DEFAULT_AUTO_APPLY_MIN_CONFIDENCE, DEFAULT_MAX_RELATIVE_DELTA};
use shelfsync_inventory::matching::{DEFAULT_CANDIDATE_LIMIT, DEFAULT_UNMATCHED_PENALTY};
use shelfsync_inventory::{DecisionPolicy, MatchPolicy};

pub const ENV_AUTO_APPLY_MIN_CONFIDENCE: &str = "SHELFSYNC_AUTO_APPLY_MIN_CONFIDENCE";
pub const ENV_MAX_RELATIVE_DELTA: &str = "SHELFSYNC_MAX_RELATIVE_DELTA";
pub const ENV_UNMATCHED_PENALTY: &str = "SHELFSYNC_UNMATCHED_PENALTY";
pub const ENV_CANDIDATE_LIMIT: &str = "SHELFSYNC_CANDIDATE_LIMIT";
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "SHELFSYNC_LOOKUP_TIMEOUT_MS";
pub const ENV_LOOKUP_CONCURRENCY: &str = "SHELFSYNC_LOOKUP_CONCURRENCY";
pub const ENV_WRITE_TIMEOUT_MS: &str = "SHELFSYNC_WRITE_TIMEOUT_MS";
pub const ENV_SUBMISSION_DEADLINE_MS: &str = "SHELFSYNC_SUBMISSION_DEADLINE_MS";
pub const ENV_REVIEW_CONFIDENCE_FLOOR: &str = "SHELFSYNC_REVIEW_CONFIDENCE_FLOOR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Tunables for one reconciler instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub decision: DecisionPolicy,
    pub matching: MatchPolicy,
    /// Per catalog search.
    pub lookup_timeout: Duration,
    /// Catalog searches in flight per submission. Keep at or below the store's
    /// connection pool size.
    pub lookup_concurrency: usize,
    /// Per catalog write (including the wait for the product lock).
    pub write_timeout: Duration,
    /// Whole-submission bound.
    pub submission_deadline: Duration,
    /// Batch confidence below which callers flag the run for review.
    pub review_confidence_floor: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            decision: DecisionPolicy::new(DEFAULT_AUTO_APPLY_MIN_CONFIDENCE, DEFAULT_MAX_RELATIVE_DELTA),
            matching: MatchPolicy {
                candidate_limit: DEFAULT_CANDIDATE_LIMIT,
                unmatched_penalty: DEFAULT_UNMATCHED_PENALTY,
            },
            lookup_timeout: Duration::from_millis(2_000),
            lookup_concurrency: 4,
            write_timeout: Duration::from_millis(2_000),
            submission_deadline: Duration::from_millis(30_000),
            review_confidence_floor: 0.7,
        }
    }
}

impl ReconcileConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = read_f64(&lookup, ENV_AUTO_APPLY_MIN_CONFIDENCE)? {
            cfg.decision.auto_apply_min_confidence = v;
        }
        if let Some(v) = read_f64(&lookup, ENV_MAX_RELATIVE_DELTA)? {
            cfg.decision.max_relative_delta = v;
        }
        if let Some(v) = read_f64(&lookup, ENV_UNMATCHED_PENALTY)? {
            cfg.matching.unmatched_penalty = v;
        }
        if let Some(v) = read_u64(&lookup, ENV_CANDIDATE_LIMIT)? {
            cfg.matching.candidate_limit = v as usize;
        }
        if let Some(v) = read_u64(&lookup, ENV_LOOKUP_TIMEOUT_MS)? {
            cfg.lookup_timeout = Duration::from_millis(v);
        }
        if let Some(v) = read_u64(&lookup, ENV_LOOKUP_CONCURRENCY)? {
            cfg.lookup_concurrency = v as usize;
        }
        if let Some(v) = read_u64(&lookup, ENV_WRITE_TIMEOUT_MS)? {
            cfg.write_timeout = Duration::from_millis(v);
        }
        if let Some(v) = read_u64(&lookup, ENV_SUBMISSION_DEADLINE_MS)? {
            cfg.submission_deadline = Duration::from_millis(v);
        }
        if let Some(v) = read_f64(&lookup, ENV_REVIEW_CONFIDENCE_FLOOR)? {
            cfg.review_confidence_floor = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_lookup_concurrency(mut self, concurrency: usize) -> Self {
        self.lookup_concurrency = concurrency;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_submission_deadline(mut self, deadline: Duration) -> Self {
        self.submission_deadline = deadline;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval(ENV_AUTO_APPLY_MIN_CONFIDENCE, self.decision.auto_apply_min_confidence)?;
        if !(self.decision.max_relative_delta.is_finite() && self.decision.max_relative_delta > 0.0) {
            return Err(ConfigError::invalid(
                ENV_MAX_RELATIVE_DELTA,
                "must be a finite positive number",
            ));
        }
        unit_interval(ENV_UNMATCHED_PENALTY, self.matching.unmatched_penalty)?;
        unit_interval(ENV_REVIEW_CONFIDENCE_FLOOR, self.review_confidence_floor)?;
        if self.matching.candidate_limit == 0 {
            return Err(ConfigError::invalid(ENV_CANDIDATE_LIMIT, "must be at least 1"));
        }
        if self.lookup_concurrency == 0 {
            return Err(ConfigError::invalid(ENV_LOOKUP_CONCURRENCY, "must be at least 1"));
        }
        for (key, d) in [
            (ENV_LOOKUP_TIMEOUT_MS, self.lookup_timeout),
            (ENV_WRITE_TIMEOUT_MS, self.write_timeout),
            (ENV_SUBMISSION_DEADLINE_MS, self.submission_deadline),
        ] {
            if d.is_zero() {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
        }
        Ok(())
    }
}

fn unit_interval(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("must be within [0, 1] (got {v})")))
    }
}

fn read_f64<F>(lookup: &F, key: &'static str) -> Result<Option<f64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, e.to_string())),
    }
}

fn read_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, e.to_string())),
    }
}
