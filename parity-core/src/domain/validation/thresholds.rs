// parity-core/src/domain/validation/thresholds.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Tunables of the discrepancy detector. Every field has a default so a
/// partial `validation:` block in the project file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ValidationThresholds {
    /// Allowed relative difference between source and target row counts.
    #[validate(range(min = 0.0, max = 1.0))]
    pub count_tolerance: f64,
    /// A target column is flagged above this null percentage (strict).
    #[validate(range(min = 0.0, max = 100.0))]
    pub null_percentage: f64,
    #[validate(range(min = 0.5))]
    pub outlier_sigma: f64,
    #[validate(range(min = 1, max = 1_000_000))]
    pub sample_limit: usize,
    pub proof_sample_rows: usize,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            count_tolerance: 0.05,
            null_percentage: 50.0,
            outlier_sigma: 3.0,
            sample_limit: 5_000,
            proof_sample_rows: 10,
        }
    }
}
