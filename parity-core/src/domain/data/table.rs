// parity-core/src/domain/data/table.rs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::value::{DType, Value};

static NULL_VALUE: Value = Value::Null;

/// Row-oriented batch of tabular data. This is what flows through the
/// pipeline (one per page) and what the validation engine samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Column types declared by the engine that produced the rows. Empty when
    /// unknown, in which case types are inferred from the values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<DType>,
}

pub type Row = Vec<Value>;

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            types: Vec::new(),
        }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, Vec::new())
    }

    pub fn with_types(mut self, types: Vec<DType>) -> Self {
        self.types = types;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column. Short rows read as NULL.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).unwrap_or(&NULL_VALUE))
    }

    pub fn null_count(&self, idx: usize) -> usize {
        self.column_values(idx).filter(|v| v.is_null()).count()
    }

    pub fn total_nulls(&self) -> usize {
        (0..self.width()).map(|i| self.null_count(i)).sum()
    }

    pub fn unique_count(&self, idx: usize) -> usize {
        self.column_values(idx)
            .filter(|v| !v.is_null())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of rows that repeat an earlier row exactly.
    pub fn duplicate_count(&self) -> usize {
        let distinct: HashSet<&Row> = self.rows.iter().collect();
        self.rows.len() - distinct.len()
    }

    pub fn column_dtype(&self, idx: usize) -> DType {
        self.column_values(idx)
            .filter(|v| !v.is_null())
            .fold(DType::Empty, |acc, v| acc.merge(v.dtype()))
    }

    /// The declared type when known, otherwise the one inferred from the values.
    /// An all-NULL column keeps its declared type.
    pub fn storage_dtype(&self, idx: usize) -> DType {
        match self.types.get(idx) {
            Some(t) if *t != DType::Empty => *t,
            _ => self.column_dtype(idx),
        }
    }

    /// Non-null numeric values of a column, in row order.
    pub fn numeric_values(&self, idx: usize) -> Vec<f64> {
        self.column_values(idx).filter_map(Value::as_f64).collect()
    }

    /// Columns whose every value is NULL (only meaningful on non-empty tables).
    pub fn all_null_columns(&self) -> Vec<&str> {
        if self.is_empty() {
            return Vec::new();
        }
        self.columns
            .iter()
            .enumerate()
            .filter(|(i, _)| self.null_count(*i) == self.len())
            .map(|(_, c)| c.as_str())
            .collect()
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
            types: self.types.clone(),
        }
    }

    pub fn estimated_bytes(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .map(Value::estimated_bytes)
            .sum()
    }

    /// Rows as JSON objects keyed by column name (proof-of-execution samples).
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        let v = row.get(i).unwrap_or(&NULL_VALUE);
                        let json = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                        (col.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }

    /// Appends the rows of `other`. Columns of `other` are assumed to match.
    pub fn extend(&mut self, other: Table) {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        if self.types.is_empty() {
            self.types = other.types;
        }
        self.rows.extend(other.rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["id".into(), "name".into(), "score".into()],
            vec![
                vec![1.into(), "a".into(), Value::Double(1.5)],
                vec![2.into(), Value::Null, Value::Integer(3)],
                vec![1.into(), "a".into(), Value::Double(1.5)],
            ],
        )
    }

    #[test]
    fn test_duplicates_and_nulls() {
        let t = sample();
        assert_eq!(t.duplicate_count(), 1);
        assert_eq!(t.null_count(1), 1);
        assert_eq!(t.total_nulls(), 1);
        assert_eq!(t.unique_count(0), 2);
    }

    #[test]
    fn test_column_dtype_inference() {
        let t = sample();
        assert_eq!(t.column_dtype(0), DType::Int64);
        assert_eq!(t.column_dtype(1), DType::Object);
        assert_eq!(t.column_dtype(2), DType::Float64);
    }

    #[test]
    fn test_declared_types_survive_all_null_columns() {
        let t = Table::new(
            vec!["id".into(), "amount".into()],
            vec![vec![1.into(), Value::Null], vec![2.into(), Value::Null]],
        );
        assert_eq!(t.storage_dtype(1), DType::Empty);

        let t = t.with_types(vec![DType::Int64, DType::Float64]);
        assert_eq!(t.storage_dtype(1), DType::Float64);
        assert_eq!(t.head(1).storage_dtype(1), DType::Float64);
        // value inference is unchanged
        assert_eq!(t.column_dtype(1), DType::Empty);
    }

    #[test]
    fn test_short_rows_read_as_null() {
        let t = Table::new(vec!["a".into(), "b".into()], vec![vec![1.into()]]);
        assert_eq!(t.null_count(1), 1);
        assert_eq!(t.all_null_columns(), vec!["b"]);
    }

    #[test]
    fn test_records_are_keyed_by_column() {
        let records = sample().head(1).to_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], serde_json::json!("a"));
        assert_eq!(records[0]["score"], serde_json::json!(1.5));
    }
}
