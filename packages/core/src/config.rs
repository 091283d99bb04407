//! Accelerator configuration
//!
//! Defaults come from [`AcceleratorConfig::default`]; a JSON file and the
//! `XACCEL_*` environment variables can override them.
//!
//! # Environment Variables
//!
//! - `XACCEL_DB_PATH`: libsql database file (in-memory when unset or `:memory:`)
//! - `XACCEL_LAYOUT`: `edge` or `ordered`
//! - `XACCEL_STRATEGY`: `closure`, `range` or `auto`
//! - `XACCEL_MAX_DEPTH`: enables the bounded evaluator's depth bound
//! - `XACCEL_SUBTREE_THRESHOLD`: enables the depth bound as well

use crate::db::Layout;
use crate::models::{AncestorScope, AxisOptions, SiblingFilter, StrategyChoice};
use crate::services::{BoundedOptions, DepthBound};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_DB_PATH: &str = "XACCEL_DB_PATH";
pub const ENV_LAYOUT: &str = "XACCEL_LAYOUT";
pub const ENV_STRATEGY: &str = "XACCEL_STRATEGY";
pub const ENV_MAX_DEPTH: &str = "XACCEL_MAX_DEPTH";
pub const ENV_SUBTREE_THRESHOLD: &str = "XACCEL_SUBTREE_THRESHOLD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid_value(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorConfig {
    /// libsql database file; `None` keeps everything in memory
    pub database_path: Option<PathBuf>,

    pub layout: Layout,
    pub strategy: StrategyChoice,
    pub sibling_filter: SiblingFilter,
    pub ancestor_scope: AncestorScope,
    pub bounded: BoundedOptions,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            layout: Layout::Ordered,
            strategy: StrategyChoice::Auto,
            sibling_filter: SiblingFilter::All,
            ancestor_scope: AncestorScope::Node,
            bounded: BoundedOptions::default(),
        }
    }
}

impl AcceleratorConfig {
    /// Defaults with the process environment applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `XACCEL_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = match path.trim() {
                "" | ":memory:" => None,
                other => Some(PathBuf::from(other)),
            };
        }

        if let Some(value) = lookup(ENV_LAYOUT) {
            self.layout = value
                .parse()
                .map_err(|e: String| ConfigError::invalid_value(ENV_LAYOUT, e))?;
        }

        if let Some(value) = lookup(ENV_STRATEGY) {
            self.strategy = value
                .parse()
                .map_err(|e: String| ConfigError::invalid_value(ENV_STRATEGY, e))?;
        }

        let max_depth = lookup(ENV_MAX_DEPTH)
            .map(|v| parse_count(ENV_MAX_DEPTH, &v))
            .transpose()?;
        let threshold = lookup(ENV_SUBTREE_THRESHOLD)
            .map(|v| parse_count(ENV_SUBTREE_THRESHOLD, &v))
            .transpose()?;

        if max_depth.is_some() || threshold.is_some() {
            let mut bound = self.bounded.depth_bound.unwrap_or_default();
            if let Some(max_depth) = max_depth {
                bound.max_depth = max_depth;
            }
            if let Some(threshold) = threshold {
                bound.subtree_threshold = threshold;
            }
            self.bounded.depth_bound = Some(bound);
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bound) = &self.bounded.depth_bound {
            if bound.max_depth < 1 {
                return Err(ConfigError::invalid_value(
                    "bounded.depth_bound.max_depth",
                    "must be at least 1",
                ));
            }
            if bound.subtree_threshold < 0 {
                return Err(ConfigError::invalid_value(
                    "bounded.depth_bound.subtree_threshold",
                    "cannot be negative",
                ));
            }
        }

        if self.strategy == StrategyChoice::Range && !self.layout.supports_range() {
            return Err(ConfigError::invalid_value(
                "strategy",
                format!("range strategy needs an ordered layout, not {}", self.layout),
            ));
        }

        if let SiblingFilter::OfType(node_type) = &self.sibling_filter {
            if node_type.is_empty() {
                return Err(ConfigError::invalid_value(
                    "sibling_filter",
                    "type cannot be empty",
                ));
            }
        }

        Ok(())
    }

    pub fn axis_options(&self) -> AxisOptions {
        AxisOptions {
            strategy: self.strategy,
            sibling_filter: self.sibling_filter.clone(),
            ancestor_scope: self.ancestor_scope.clone(),
        }
    }

    /// Bounded options, sharing the configured ancestor scope
    pub fn bounded_options(&self) -> BoundedOptions {
        BoundedOptions {
            ancestor_scope: self.ancestor_scope.clone(),
            ..self.bounded.clone()
        }
    }

    /// Depth bound in effect, if any
    pub fn depth_bound(&self) -> Option<DepthBound> {
        self.bounded.depth_bound
    }
}

fn parse_count(name: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::invalid_value(name, e.to_string()))
}
