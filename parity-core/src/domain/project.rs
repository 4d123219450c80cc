// parity-core/src/domain/project.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::domain::retry::RetryPolicy;
use crate::domain::validation::ValidationThresholds;

/// Connection settings of one store (`source:` / `target:`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file, or `:memory:`.
    #[validate(length(min = 1))]
    pub path: String,
    #[validate(range(min = 1, max = 64))]
    pub pool_size: usize,
    /// Pooled connections older than this are closed and replaced. 0 keeps them forever.
    pub recycle_secs: u64,
    /// `SELECT 1` before handing out a connection.
    pub pre_ping: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".into(),
            pool_size: 4,
            recycle_secs: 3600,
            pre_ping: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Partitioned,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::Partitioned => f.write_str("partitioned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineSettings {
    #[validate(range(min = 1, max = 1_000_000))]
    pub batch_size: usize,
    pub mode: ExecutionMode,
    /// Integer column used to split the source in partitioned mode.
    #[validate(length(min = 1))]
    pub partition_column: String,
    #[validate(range(min = 1, max = 256))]
    pub partitions: usize,
    #[validate(range(min = 1, max = 64))]
    pub max_workers: usize,
    pub enable_rollback: bool,
    #[validate(range(min = 1, max = 100_000))]
    pub load_chunk_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            mode: ExecutionMode::Sequential,
            partition_column: "id".into(),
            partitions: 4,
            max_workers: 10,
            enable_rollback: true,
            load_chunk_size: 1_000,
        }
    }
}

fn default_rules_path() -> String {
    "rules".to_string()
}

fn default_target_path() -> String {
    "target".to_string()
}

/// Content of `parity.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub source: StoreConfig,
    #[serde(default)]
    #[validate(nested)]
    pub target: StoreConfig,
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryPolicy,
    #[serde(default)]
    #[validate(nested)]
    pub validation: ValidationThresholds,
    #[serde(rename = "rules-path", default = "default_rules_path")]
    pub rules_path: String,
    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,
}

impl ProjectConfig {
    /// Source and target point at the same database file, so one store must serve both.
    pub fn shares_database(&self) -> bool {
        self.source.path == self.target.path && self.source.path != ":memory:"
    }
}
