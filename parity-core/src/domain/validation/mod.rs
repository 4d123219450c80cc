// parity-core/src/domain/validation/mod.rs

pub mod assertions;
pub mod discrepancy;
pub mod profile;
pub mod thresholds;

pub use assertions::{AssertionContext, AssertionRule, AssertionTable};
pub use discrepancy::{Discrepancy, DiscrepancyDetector, DiscrepancyKind, Severity};
pub use profile::StatisticalSummary;
pub use thresholds::ValidationThresholds;
