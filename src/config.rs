//! Engine configuration
//!
//! One YAML document configures the whole engine: extractor options, cache
//! sizing, pipeline concurrency, and the metric suite. Unknown keys are
//! rejected so a typo in a metric parameter surfaces at load time instead of
//! silently falling back to a default.

use crate::features::ExtractionConfig;
use crate::metrics::MetricDefinition;
use crate::Result;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The built-in text-quality metric suite, used when no configuration file is
/// supplied.
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../default_config.yml");

/// Cache sizing and failure-retention policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    /// Maximum number of completed results retained.
    pub capacity: usize,

    /// How long a failed result is served from cache before recomputing.
    pub failure_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            failure_ttl_secs: 30,
        }
    }
}

/// Batch execution limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Upper bound on records scored concurrently within a batch.
    pub max_concurrent_records: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_records: 8,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// The metric suite, in declaration order.
    pub metrics: Vec<MetricDefinition>,
}

impl EngineConfig {
    /// Parses a configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).into_app_err("unable to parse engine configuration")
    }

    /// Reads and parses a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .into_app_err_with(|| format!("unable to read configuration file {}", path.display()))?;
        serde_yaml::from_str(&yaml)
            .into_app_err_with(|| format!("unable to parse configuration file {}", path.display()))
    }

    /// The built-in default configuration.
    pub fn built_in() -> Result<Self> {
        Self::from_yaml_str(DEFAULT_CONFIG_YAML)
    }
}
