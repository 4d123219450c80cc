// parity-core/src/domain/data/value.rs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell of a batch. Independent of the storage engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by the profiler and outlier detection.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Value::Null => DType::Empty,
            Value::Boolean(_) => DType::Bool,
            Value::Integer(_) => DType::Int64,
            Value::Double(_) => DType::Float64,
            Value::Text(_) => DType::Object,
            Value::Date(_) => DType::Date,
            Value::Timestamp(_) => DType::Datetime,
        }
    }

    /// Rough in-memory footprint, for the profiler's memory estimate.
    pub fn estimated_bytes(&self) -> usize {
        match self {
            Value::Null => 8,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Double(_) | Value::Timestamp(_) => 8,
            Value::Date(_) => 4,
            Value::Text(s) => 24 + s.len(),
        }
    }
}

// Doubles compare by bit pattern so that rows can be hashed for duplicate detection.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Timestamp(t) => t.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(t) => write!(f, "{}", t),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Inferred column type, compared across source and target samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
    Date,
    #[serde(rename = "datetime64")]
    Datetime,
    Mixed,
    Empty,
}

impl DType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Int64 | DType::Float64)
    }

    /// Folds one more observed (non-null) value type into the column type.
    pub fn merge(self, other: DType) -> DType {
        match (self, other) {
            (DType::Empty, t) | (t, DType::Empty) => t,
            (a, b) if a == b => a,
            (DType::Int64, DType::Float64) | (DType::Float64, DType::Int64) => DType::Float64,
            _ => DType::Mixed,
        }
    }

    /// Declared SQL type used when a load has to create the target table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            DType::Int64 => "BIGINT",
            DType::Float64 => "DOUBLE",
            DType::Bool => "BOOLEAN",
            DType::Date => "DATE",
            DType::Datetime => "TIMESTAMP",
            DType::Object | DType::Mixed | DType::Empty => "VARCHAR",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Object => "object",
            DType::Date => "date",
            DType::Datetime => "datetime64",
            DType::Mixed => "mixed",
            DType::Empty => "empty",
        };
        f.write_str(s)
    }
}
