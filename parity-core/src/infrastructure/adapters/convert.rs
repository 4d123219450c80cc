// parity-core/src/infrastructure/adapters/convert.rs

// Mapping between DuckDB values and the engine-independent `Value`.

use chrono::{DateTime, NaiveDate};
use duckdb::arrow::datatypes::DataType;
use duckdb::types::{TimeUnit, Value as DbValue};

use crate::domain::data::{DType, Value};

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(i64::from(days)))
}

/// Types the domain does not model (blobs, lists, intervals, ...) and dates
/// outside chrono's range are carried as their debug text rather than dropped.
pub(crate) fn from_duckdb(value: DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Boolean(b) => Value::Boolean(b),
        DbValue::TinyInt(i) => Value::Integer(i64::from(i)),
        DbValue::SmallInt(i) => Value::Integer(i64::from(i)),
        DbValue::Int(i) => Value::Integer(i64::from(i)),
        DbValue::BigInt(i) => Value::Integer(i),
        DbValue::UTinyInt(i) => Value::Integer(i64::from(i)),
        DbValue::USmallInt(i) => Value::Integer(i64::from(i)),
        DbValue::UInt(i) => Value::Integer(i64::from(i)),
        DbValue::UBigInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Double(i as f64)),
        DbValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Double(i as f64)),
        DbValue::Float(f) => Value::Double(f64::from(f)),
        DbValue::Double(f) => Value::Double(f),
        DbValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Double)
            .unwrap_or_else(|_| Value::Text(d.to_string())),
        DbValue::Text(s) | DbValue::Enum(s) => Value::Text(s),
        DbValue::Date32(days) => date_from_days(days)
            .map(Value::Date)
            .unwrap_or_else(|| Value::Text(format!("{:?}", DbValue::Date32(days)))),
        DbValue::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|dt| Value::Timestamp(dt.naive_utc()))
            .unwrap_or_else(|| Value::Text(format!("{:?}", DbValue::Timestamp(unit, v)))),
        other => Value::Text(format!("{other:?}")),
    }
}

/// Result column type, as `from_duckdb` will represent its values.
pub(crate) fn dtype_of(data_type: &DataType) -> DType {
    match data_type {
        DataType::Boolean => DType::Bool,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => DType::Int64,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => DType::Float64,
        DataType::Date32 | DataType::Date64 => DType::Date,
        DataType::Timestamp(_, _) => DType::Datetime,
        _ => DType::Object,
    }
}

/// Parameter binding. Dates travel as ISO text; DuckDB casts them on insert.
pub(crate) fn to_duckdb(value: &Value) -> DbValue {
    match value {
        Value::Null => DbValue::Null,
        Value::Boolean(b) => DbValue::Boolean(*b),
        Value::Integer(i) => DbValue::BigInt(*i),
        Value::Double(f) => DbValue::Double(*f),
        Value::Text(s) => DbValue::Text(s.clone()),
        Value::Date(d) => DbValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Timestamp(t) => DbValue::Text(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_widen() {
        assert_eq!(from_duckdb(DbValue::Int(7)), Value::Integer(7));
        assert_eq!(from_duckdb(DbValue::UBigInt(u64::MAX)), Value::Double(u64::MAX as f64));
    }

    #[test]
    fn test_temporal_values() {
        assert_eq!(
            from_duckdb(DbValue::Date32(1)),
            Value::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap_or_default())
        );
        let Value::Timestamp(ts) = from_duckdb(DbValue::Timestamp(TimeUnit::Second, 86_400)) else {
            panic!("expected a timestamp");
        };
        assert_eq!(ts.to_string(), "1970-01-02 00:00:00");
    }

    #[test]
    fn test_unmodelled_types_become_text() {
        assert!(matches!(from_duckdb(DbValue::Blob(vec![1, 2])), Value::Text(_)));
    }

    #[test]
    fn test_out_of_range_temporals_are_kept_as_text() {
        let Value::Text(date) = from_duckdb(DbValue::Date32(i32::MAX)) else {
            panic!("expected text for an out-of-range date");
        };
        assert!(date.contains(&i32::MAX.to_string()));
        assert!(matches!(
            from_duckdb(DbValue::Timestamp(TimeUnit::Second, i64::MAX)),
            Value::Text(_)
        ));
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(dtype_of(&DataType::Int32), DType::Int64);
        assert_eq!(dtype_of(&DataType::Decimal128(18, 3)), DType::Float64);
        assert_eq!(dtype_of(&DataType::Utf8), DType::Object);
    }
}
