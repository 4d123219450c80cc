// parity-core/src/domain/validation/profile.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::data::{DType, Table};

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1). `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub dtype: DType,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatisticalSummary {
    EmptyDataset,
    Profiled {
        record_count: usize,
        column_count: usize,
        memory_usage_mb: f64,
        columns: BTreeMap<String, ColumnProfile>,
    },
    /// Used by ERROR results, where no sample was read.
    NotAvailable,
}

impl StatisticalSummary {
    pub fn of(table: &Table) -> Self {
        if table.is_empty() {
            return StatisticalSummary::EmptyDataset;
        }
        let len = table.len();
        let columns = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let dtype = table.column_dtype(idx);
                let null_count = table.null_count(idx);
                let mut profile = ColumnProfile {
                    dtype,
                    null_count,
                    null_percentage: round2(null_count as f64 * 100.0 / len as f64),
                    unique_count: table.unique_count(idx),
                    min: None,
                    max: None,
                    mean: None,
                    median: None,
                    std: None,
                };
                if dtype.is_numeric() {
                    let values = table.numeric_values(idx);
                    if !values.is_empty() {
                        profile.min = values.iter().copied().reduce(f64::min);
                        profile.max = values.iter().copied().reduce(f64::max);
                        profile.mean = mean(&values).map(round2);
                        profile.median = median(&values).map(round2);
                        // undefined spread (single value) reports 0
                        profile.std = Some(sample_std(&values).map(round2).unwrap_or(0.0));
                    }
                }
                (name.clone(), profile)
            })
            .collect();

        StatisticalSummary::Profiled {
            record_count: len,
            column_count: table.width(),
            memory_usage_mb: round2(table.estimated_bytes() as f64 / 1024.0 / 1024.0),
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::Value;

    #[test]
    fn test_moments() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), Some(5.0));
        assert_eq!(median(&v), Some(4.5));
        let std = sample_std(&v).unwrap_or_default();
        assert!((std - 2.138089935).abs() < 1e-6);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_empty_table_is_empty_dataset() -> anyhow::Result<()> {
        let summary = StatisticalSummary::of(&Table::empty(vec!["a".into()]));
        assert_eq!(summary, StatisticalSummary::EmptyDataset);
        let json = serde_json::to_value(&summary)?;
        assert_eq!(json["status"], "EMPTY_DATASET");
        Ok(())
    }

    #[test]
    fn test_numeric_and_text_columns() {
        let t = Table::new(
            vec!["amount".into(), "label".into()],
            vec![
                vec![Value::Double(1.0), "x".into()],
                vec![Value::Integer(3), Value::Null],
                vec![Value::Null, "y".into()],
            ],
        );
        let StatisticalSummary::Profiled {
            record_count,
            columns,
            ..
        } = StatisticalSummary::of(&t)
        else {
            panic!("expected a profiled summary");
        };
        assert_eq!(record_count, 3);
        let amount = &columns["amount"];
        assert_eq!(amount.dtype, DType::Float64);
        assert_eq!(amount.null_percentage, 33.33);
        assert_eq!(amount.min, Some(1.0));
        assert_eq!(amount.max, Some(3.0));
        assert_eq!(amount.mean, Some(2.0));
        assert_eq!(amount.std, Some(1.41));
        let label = &columns["label"];
        assert_eq!(label.dtype, DType::Object);
        assert_eq!(label.unique_count, 2);
        assert!(label.mean.is_none());
    }
}
