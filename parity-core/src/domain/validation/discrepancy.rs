// parity-core/src/domain/validation/discrepancy.rs

use serde::{Deserialize, Serialize};

use crate::domain::data::{DType, Table};
use crate::domain::rule::TestScenario;
use crate::domain::validation::profile::{mean, round2, sample_std};
use crate::domain::validation::thresholds::ValidationThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyKind {
    CountMismatch {
        expected: usize,
        actual: usize,
        difference: usize,
        percentage_diff: f64,
    },
    HighNullPercentage {
        column: String,
        null_count: usize,
        null_percentage: f64,
        total_records: usize,
    },
    DatatypeMismatch {
        column: String,
        source_type: DType,
        target_type: DType,
    },
    DuplicatesFound {
        count: usize,
        percentage: f64,
    },
    OutliersDetected {
        column: String,
        outlier_count: usize,
        percentage: f64,
        mean: f64,
        std: f64,
    },
    EmptyResult {
        message: String,
    },
    ExecutionError {
        error: String,
    },
}

impl DiscrepancyKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiscrepancyKind::CountMismatch { .. }
            | DiscrepancyKind::EmptyResult { .. }
            | DiscrepancyKind::ExecutionError { .. } => Severity::High,
            DiscrepancyKind::HighNullPercentage { .. } | DiscrepancyKind::DatatypeMismatch { .. } => {
                Severity::Medium
            }
            DiscrepancyKind::DuplicatesFound { .. } | DiscrepancyKind::OutliersDetected { .. } => {
                Severity::Low
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DiscrepancyKind::CountMismatch { .. } => "COUNT_MISMATCH",
            DiscrepancyKind::HighNullPercentage { .. } => "HIGH_NULL_PERCENTAGE",
            DiscrepancyKind::DatatypeMismatch { .. } => "DATATYPE_MISMATCH",
            DiscrepancyKind::DuplicatesFound { .. } => "DUPLICATES_FOUND",
            DiscrepancyKind::OutliersDetected { .. } => "OUTLIERS_DETECTED",
            DiscrepancyKind::EmptyResult { .. } => "EMPTY_RESULT",
            DiscrepancyKind::ExecutionError { .. } => "EXECUTION_ERROR",
        }
    }
}

/// A structured finding. Serialized flat: `{"type": "...", "severity": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiscrepancyKind,
}

impl From<DiscrepancyKind> for Discrepancy {
    fn from(kind: DiscrepancyKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl Discrepancy {
    pub fn execution_error(message: impl Into<String>) -> Self {
        DiscrepancyKind::ExecutionError {
            error: message.into(),
        }
        .into()
    }
}

fn mentions_empty(text: &str) -> bool {
    text.to_lowercase().contains("empty")
}

/// Layered comparison of a source sample against a target sample.
pub struct DiscrepancyDetector<'a> {
    thresholds: &'a ValidationThresholds,
}

impl<'a> DiscrepancyDetector<'a> {
    pub fn new(thresholds: &'a ValidationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn detect(&self, source: &Table, target: &Table, scenario: &TestScenario) -> Vec<Discrepancy> {
        let mut found = Vec::new();
        self.count_mismatch(source, target, scenario, &mut found);
        self.null_percentages(target, &mut found);
        self.datatype_mismatches(source, target, &mut found);
        self.duplicates(target, &mut found);
        self.outliers(target, &mut found);

        if target.is_empty() && !mentions_empty(&scenario.name) {
            found.push(
                DiscrepancyKind::EmptyResult {
                    message: "Target table has no records, but not expected by scenario".into(),
                }
                .into(),
            );
        }
        found
    }

    fn count_mismatch(
        &self,
        source: &Table,
        target: &Table,
        scenario: &TestScenario,
        found: &mut Vec<Discrepancy>,
    ) {
        if mentions_empty(&scenario.expected_output) {
            return;
        }
        let (expected, actual) = (source.len(), target.len());
        let difference = expected.abs_diff(actual);
        if difference as f64 > expected as f64 * self.thresholds.count_tolerance {
            found.push(
                DiscrepancyKind::CountMismatch {
                    expected,
                    actual,
                    difference,
                    percentage_diff: difference as f64 * 100.0 / expected.max(1) as f64,
                }
                .into(),
            );
        }
    }

    fn null_percentages(&self, target: &Table, found: &mut Vec<Discrepancy>) {
        if target.is_empty() {
            return;
        }
        let total = target.len();
        for (idx, column) in target.columns.iter().enumerate() {
            let null_count = target.null_count(idx);
            let pct = null_count as f64 * 100.0 / total as f64;
            if pct > self.thresholds.null_percentage {
                found.push(
                    DiscrepancyKind::HighNullPercentage {
                        column: column.clone(),
                        null_count,
                        null_percentage: round2(pct),
                        total_records: total,
                    }
                    .into(),
                );
            }
        }
    }

    fn datatype_mismatches(&self, source: &Table, target: &Table, found: &mut Vec<Discrepancy>) {
        if source.is_empty() || target.is_empty() {
            return;
        }
        for (t_idx, column) in target.columns.iter().enumerate() {
            let Some(s_idx) = source.column_index(column) else {
                continue;
            };
            let (source_type, target_type) = (source.column_dtype(s_idx), target.column_dtype(t_idx));
            if source_type != target_type {
                found.push(
                    DiscrepancyKind::DatatypeMismatch {
                        column: column.clone(),
                        source_type,
                        target_type,
                    }
                    .into(),
                );
            }
        }
    }

    fn duplicates(&self, target: &Table, found: &mut Vec<Discrepancy>) {
        let count = target.duplicate_count();
        if count > 0 {
            found.push(
                DiscrepancyKind::DuplicatesFound {
                    count,
                    percentage: round2(count as f64 * 100.0 / target.len() as f64),
                }
                .into(),
            );
        }
    }

    fn outliers(&self, target: &Table, found: &mut Vec<Discrepancy>) {
        for (idx, column) in target.columns.iter().enumerate() {
            if !target.column_dtype(idx).is_numeric() {
                continue;
            }
            let values = target.numeric_values(idx);
            let (Some(m), Some(std)) = (mean(&values), sample_std(&values)) else {
                continue;
            };
            if std <= 0.0 {
                continue;
            }
            let bound = self.thresholds.outlier_sigma * std;
            let outlier_count = values.iter().filter(|v| (*v - m).abs() > bound).count();
            if outlier_count > 0 {
                found.push(
                    DiscrepancyKind::OutliersDetected {
                        column: column.clone(),
                        outlier_count,
                        percentage: round2(outlier_count as f64 * 100.0 / target.len() as f64),
                        mean: round2(m),
                        std: round2(std),
                    }
                    .into(),
                );
            }
        }
    }
}
