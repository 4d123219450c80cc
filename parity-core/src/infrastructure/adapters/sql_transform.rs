// parity-core/src/infrastructure/adapters/sql_transform.rs

use duckdb::Connection;
use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use std::sync::Mutex;

use super::duckdb::{insert_chunked, query_table};
use crate::domain::data::Table;
use crate::domain::error::DomainError;
use crate::ports::transform::{Transform, TransformError};

const BATCH_TABLE: &str = "batch";

/// Applies one SQL `SELECT` to every batch. The batch is visible to the
/// query as a table named `batch`, in a private in-memory database.
pub struct SqlTransform {
    sql: String,
    conn: Mutex<Connection>,
}

impl SqlTransform {
    pub fn new(sql: impl Into<String>) -> Result<Self, DomainError> {
        let sql = sql.into();
        let statements = Parser::parse_sql(&DuckDbDialect {}, &sql)
            .map_err(|e| DomainError::InvalidTransformSql(e.to_string()))?;
        match statements.as_slice() {
            [Statement::Query(_)] => {}
            [] => return Err(DomainError::InvalidTransformSql("empty statement".into())),
            [_] => {
                return Err(DomainError::InvalidTransformSql(
                    "only SELECT queries can transform a batch".into(),
                ));
            }
            _ => {
                return Err(DomainError::InvalidTransformSql(format!(
                    "expected one statement, found {}",
                    statements.len()
                )));
            }
        }
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::InvalidTransformSql(format!("cannot open scratch database: {e}")))?;
        Ok(Self {
            sql,
            conn: Mutex::new(conn),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl Transform for SqlTransform {
    fn apply(&self, batch: Table) -> Result<Table, TransformError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| TransformError::new("scratch connection mutex poisoned"))?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {BATCH_TABLE}"))
            .map_err(|e| TransformError::new(e.to_string()))?;
        if batch.width() == 0 {
            return Ok(batch);
        }
        insert_chunked(&conn, BATCH_TABLE, &batch, 1_000)
            .map_err(|(_, e)| TransformError::new(format!("cannot stage batch: {e}")))?;
        query_table(&conn, &self.sql, &[]).map_err(|e| TransformError::new(e.to_string()))
    }

    fn name(&self) -> &str {
        "sql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::{DType, Value};

    fn batch() -> Table {
        Table::new(
            vec!["id".into(), "amount".into()],
            vec![
                vec![1.into(), Value::Double(10.0)],
                vec![2.into(), Value::Double(-3.0)],
                vec![3.into(), Value::Null],
            ],
        )
    }

    #[test]
    fn test_rejects_non_select() {
        assert!(SqlTransform::new("DELETE FROM batch").is_err());
        assert!(SqlTransform::new("SELECT 1; SELECT 2").is_err());
        assert!(SqlTransform::new("SELEC nope").is_err());
    }

    #[test]
    fn test_select_over_batch() -> anyhow::Result<()> {
        let t = SqlTransform::new(
            "SELECT id, amount * 2 AS doubled FROM batch WHERE amount > 0 ORDER BY id",
        )?;
        let out = t.apply(batch())?;
        assert_eq!(out.columns, vec!["id", "doubled"]);
        assert_eq!(out.rows, vec![vec![Value::Integer(1), Value::Double(20.0)]]);

        // state from the previous batch does not leak
        let out = t.apply(batch().head(1))?;
        assert_eq!(out.len(), 1);
        Ok(())
    }

    #[test]
    fn test_all_null_batch_stages_with_declared_types() -> anyhow::Result<()> {
        let batch = Table::new(
            vec!["id".into(), "amount".into()],
            vec![vec![1.into(), Value::Null], vec![2.into(), Value::Null]],
        )
        .with_types(vec![DType::Int64, DType::Float64]);
        let t = SqlTransform::new("SELECT id, amount * 1.12 AS amount_with_tax FROM batch ORDER BY id")?;
        let out = t.apply(batch)?;
        assert_eq!(out.len(), 2);
        assert_eq!(out.types, vec![DType::Int64, DType::Float64]);
        assert!(out.rows.iter().all(|r| r[1].is_null()));
        Ok(())
    }
}
