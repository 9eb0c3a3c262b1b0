//! Find configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::AggregateFn;
use crate::observability::Severity;
use crate::request::SortDirection;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How deep loads bound rows per parent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeepRanking {
    /// Per-parent ranking pushed into the query
    #[default]
    Window,
    /// Unbounded batched query, groups truncated after fetch
    ClientSide,
}

/// Aggregate used when sorting by a to-many column that is not deep-loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToManySortPolicy {
    /// MIN for ascending sorts, MAX for descending sorts
    #[default]
    DirectionAware,
    Min,
    Max,
}

impl ToManySortPolicy {
    /// Aggregate to apply for a sort in `direction`
    pub fn aggregate(&self, direction: SortDirection) -> AggregateFn {
        match (self, direction) {
            (ToManySortPolicy::Min, _) => AggregateFn::Min,
            (ToManySortPolicy::Max, _) => AggregateFn::Max,
            (ToManySortPolicy::DirectionAware, SortDirection::Asc) => AggregateFn::Min,
            (ToManySortPolicy::DirectionAware, SortDirection::Desc) => AggregateFn::Max,
        }
    }
}

/// Find service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindConfig {
    /// Page size when the request has no limit (default: 100)
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Largest accepted limit, root or deep (default: 1000)
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    /// Longest accepted deep relation path (default: 8)
    #[serde(default = "default_max_deep_depth")]
    pub max_deep_depth: usize,

    #[serde(default)]
    pub deep_ranking: DeepRanking,

    #[serde(default)]
    pub to_many_sort: ToManySortPolicy,

    /// Minimum severity written to the log (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_limit() -> u64 {
    100
}

fn default_max_limit() -> u64 {
    1000
}

fn default_max_deep_depth() -> usize {
    8
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for FindConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_deep_depth: default_max_deep_depth(),
            deep_ranking: DeepRanking::default(),
            to_many_sort: ToManySortPolicy::default(),
            log_level: default_log_level(),
        }
    }
}

impl FindConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: FindConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::Invalid("default_limit must be > 0".into()));
        }
        if self.max_limit == 0 {
            return Err(ConfigError::Invalid("max_limit must be > 0".into()));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        if self.max_deep_depth == 0 {
            return Err(ConfigError::Invalid("max_deep_depth must be > 0".into()));
        }
        Ok(())
    }

    pub fn with_deep_ranking(mut self, ranking: DeepRanking) -> Self {
        self.deep_ranking = ranking;
        self
    }

    pub fn with_to_many_sort(mut self, policy: ToManySortPolicy) -> Self {
        self.to_many_sort = policy;
        self
    }
}
