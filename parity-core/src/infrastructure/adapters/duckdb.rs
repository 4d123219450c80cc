// parity-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use duckdb::types::Value as DbValue;
use duckdb::{Config, Connection, params_from_iter};
use sha2::{Digest, Sha256};
use sqlparser::ast::Ident;
use std::time::Duration;
use tracing::{debug, info, instrument};
use validator::Validate;

use super::convert::{dtype_of, from_duckdb, to_duckdb};
use super::pool::{DuckDbPool, PoolSettings, build_pool, run_blocking};
use crate::domain::data::{DType, Table, Value};
use crate::domain::error::DomainError;
use crate::domain::project::StoreConfig;
use crate::domain::retry::RetryPolicy;
use crate::error::ParityError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::store::{BatchRequest, ColumnSchema, DataStore, Filters, KeyRange};

/// Quotes every part of a possibly schema-qualified name: `main.orders` -> `"main"."orders"`.
pub(crate) fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| Ident::with_quote('"', part).to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn where_clause(filters: &Filters) -> (String, Vec<DbValue>) {
    if filters.is_empty() {
        return (String::new(), Vec::new());
    }
    let predicates: Vec<String> = filters
        .keys()
        .map(|col| format!("{} = ?", quote_ident(col)))
        .collect();
    let params = filters.values().map(to_duckdb).collect();
    (format!(" WHERE {}", predicates.join(" AND ")), params)
}

/// `(schema, table)` for information_schema lookups.
fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}

fn query_error(query: &str, e: duckdb::Error) -> DatabaseError {
    DatabaseError::Query {
        query: query.to_string(),
        message: e.to_string(),
    }
}

/// Runs `sql` and materializes every row.
pub(crate) fn query_table(conn: &Connection, sql: &str, params: &[DbValue]) -> Result<Table, DatabaseError> {
    let mut stmt = conn.prepare(sql).map_err(|e| query_error(sql, e))?;
    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(|e| query_error(sql, e))?;

    // column metadata is only available once the statement has run
    let (columns, types): (Vec<String>, Vec<DType>) = rows
        .as_ref()
        .map(|s| {
            let names = s.column_names();
            let types = (0..names.len()).map(|i| dtype_of(&s.column_type(i))).collect();
            (names, types)
        })
        .unwrap_or_default();
    let width = columns.len();

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(|e| query_error(sql, e))? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let v: DbValue = row.get(i).map_err(|e| query_error(sql, e))?;
            values.push(from_duckdb(v));
        }
        out.push(values);
    }
    Ok(Table::new(columns, out).with_types(types))
}

/// Creates `table` when missing (declared types of `data`, inferred when
/// unknown), then inserts
/// the rows with multi-row parameterised INSERTs of `chunk_size` rows.
/// A failure carries the index of the failing chunk.
pub(crate) fn insert_chunked(
    conn: &Connection,
    table: &str,
    data: &Table,
    chunk_size: usize,
) -> Result<u64, (usize, duckdb::Error)> {
    let quoted = quote_ident(table);
    let columns: Vec<String> = data.columns.iter().map(|c| quote_ident(c)).collect();
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {quoted} ({})",
        columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} {}", data.storage_dtype(i).sql_type()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    conn.execute_batch(&ddl).map_err(|e| (0, e))?;

    let placeholder_row = format!("({})", vec!["?"; data.width()].join(", "));
    let mut written = 0u64;
    for (chunk_idx, chunk) in data.rows.chunks(chunk_size.max(1)).enumerate() {
        let sql = format!(
            "INSERT INTO {quoted} ({}) VALUES {}",
            columns.join(", "),
            vec![placeholder_row.as_str(); chunk.len()].join(", ")
        );
        let params: Vec<DbValue> = chunk
            .iter()
            .flat_map(|row| {
                (0..data.width()).map(move |i| row.get(i).map(to_duckdb).unwrap_or(DbValue::Null))
            })
            .collect();
        written += conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(|e| (chunk_idx, e))? as u64;
    }
    Ok(written)
}

fn table_exists_on(conn: &Connection, table: &str) -> Result<bool, DatabaseError> {
    let (schema, name) = split_qualified(table);
    let count: i64 = match schema {
        Some(schema) => conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            [schema, name],
            |r| r.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [name],
            |r| r.get(0),
        )?,
    };
    Ok(count > 0)
}

/// DuckDB implementation of [`DataStore`], backed by a connection pool.
pub struct DuckDbStore {
    label: String,
    pool: DuckDbPool,
    retry: RetryPolicy,
}

impl DuckDbStore {
    pub async fn open(config: &StoreConfig, retry: RetryPolicy) -> Result<Self, InfrastructureError> {
        config.validate()?;
        let db_config = Config::default();

        let conn = if config.path == ":memory:" {
            Connection::open_in_memory_with_flags(db_config)
        } else {
            Connection::open_with_flags(&config.path, db_config)
        }
        .map_err(|e| DatabaseError::Connection(format!("{}: {e}", config.path)))?;

        let pool = build_pool(
            conn,
            PoolSettings {
                size: config.pool_size,
                max_lifetime: Duration::from_secs(config.recycle_secs),
                pre_ping: config.pre_ping,
            },
        )
        .await?;

        info!(path = %config.path, pool_size = config.pool_size, "🔌 DuckDB store connected");
        Ok(Self {
            label: config.path.clone(),
            pool,
            retry,
        })
    }

    /// Private in-memory database with default settings.
    pub async fn in_memory() -> Result<Self, InfrastructureError> {
        Self::open(&StoreConfig::default(), RetryPolicy::default()).await
    }

    pub fn path(&self) -> &str {
        &self.label
    }

    /// Runs a batch of statements (DDL, fixtures). Not part of the port.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), ParityError> {
        let sql = sql.to_string();
        run_blocking(&self.pool, move |c| {
            c.execute_batch(&sql).map_err(|e| query_error(&sql, e))
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for DuckDbStore {
    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn fetch_page(&self, request: &BatchRequest, offset: u64) -> Result<Table, ParityError> {
        let projection = match &request.columns {
            Some(cols) if !cols.is_empty() => cols
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            _ => "*".to_string(),
        };
        let (filter_sql, params) = where_clause(&request.filters);
        let order_sql = request
            .order_by
            .as_deref()
            .map(|c| format!(" ORDER BY {}", quote_ident(c)))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {projection} FROM {}{filter_sql}{order_sql} LIMIT {} OFFSET {offset}",
            quote_ident(&request.table),
            request.batch_size.max(1),
        );
        debug!(%sql, "Fetching page");
        Ok(run_blocking(&self.pool, move |c| query_table(c, &sql, &params)).await?)
    }

    async fn execute_query(&self, query: &str, params: &[Value]) -> Result<Table, ParityError> {
        let sql = query.to_string();
        let params: Vec<DbValue> = params.iter().map(to_duckdb).collect();
        Ok(run_blocking(&self.pool, move |c| query_table(c, &sql, &params)).await?)
    }

    async fn sample(&self, table: &str, limit: usize) -> Result<Table, ParityError> {
        let sql = format!("SELECT * FROM {} LIMIT {limit}", quote_ident(table));
        Ok(run_blocking(&self.pool, move |c| query_table(c, &sql, &[])).await?)
    }

    #[instrument(skip(self, data), fields(rows = data.len()))]
    async fn bulk_load(&self, table: &str, data: &Table, chunk_size: usize) -> Result<u64, ParityError> {
        if data.is_empty() {
            return Ok(0);
        }
        let target = table.to_string();
        let data = data.clone();
        let chunk_size = chunk_size.max(1);

        let written = run_blocking(&self.pool, move |c| {
            let load_err = |chunk: usize, e: duckdb::Error| DatabaseError::Load {
                table: target.clone(),
                chunk,
                message: e.to_string(),
            };
            let tx = c.transaction().map_err(|e| load_err(0, e))?;
            let written = insert_chunked(&tx, &target, &data, chunk_size)
                .map_err(|(chunk, e)| load_err(chunk, e))?;
            let chunks = data.rows.len().div_ceil(chunk_size);
            tx.commit().map_err(|e| load_err(chunks, e))?;
            Ok(written)
        })
        .await?;

        debug!(written, "Chunked load committed");
        Ok(written)
    }

    async fn get_schema(&self, table: &str) -> Result<Vec<ColumnSchema>, ParityError> {
        let (schema, name) = split_qualified(table);
        let mut sql = "SELECT column_name, data_type, is_nullable FROM information_schema.columns WHERE table_name = ?".to_string();
        let mut params = vec![DbValue::Text(name.to_string())];
        if let Some(schema) = schema {
            sql.push_str(" AND table_schema = ?");
            params.push(DbValue::Text(schema.to_string()));
        }
        sql.push_str(" ORDER BY ordinal_position");

        let t = run_blocking(&self.pool, move |c| query_table(c, &sql, &params)).await?;
        Ok(t.rows
            .into_iter()
            .map(|row| {
                let text = |i: usize| row.get(i).map(ToString::to_string).unwrap_or_default();
                ColumnSchema {
                    name: text(0),
                    data_type: text(1),
                    is_nullable: text(2) == "YES",
                }
            })
            .collect())
    }

    async fn get_row_count(&self, table: &str, filters: &Filters) -> Result<u64, ParityError> {
        let (filter_sql, params) = where_clause(filters);
        let sql = format!("SELECT COUNT(*) FROM {}{filter_sql}", quote_ident(table));
        let count = run_blocking(&self.pool, move |c| {
            c.query_row(&sql, params_from_iter(params.iter()), |r| r.get::<_, i64>(0))
                .map_err(|e| query_error(&sql, e))
        })
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, ParityError> {
        let table = table.to_string();
        Ok(run_blocking(&self.pool, move |c| table_exists_on(c, &table)).await?)
    }

    async fn table_checksum(&self, table: &str, columns: &[String]) -> Result<String, ParityError> {
        let sql = if columns.is_empty() {
            format!("SELECT * FROM {} ORDER BY ALL", quote_ident(table))
        } else {
            let cols = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            format!("SELECT {cols} FROM {} ORDER BY {cols}", quote_ident(table))
        };
        let t = run_blocking(&self.pool, move |c| query_table(c, &sql, &[])).await?;

        let mut hasher = Sha256::new();
        for row in &t.rows {
            let line = row.iter().map(ToString::to_string).collect::<Vec<_>>().join("|");
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    #[instrument(skip(self))]
    async fn create_snapshot(&self, table: &str, snapshot_name: &str) -> Result<(), ParityError> {
        let sql = format!(
            "CREATE TABLE {} AS SELECT * FROM {}",
            quote_ident(snapshot_name),
            quote_ident(table)
        );
        run_blocking(&self.pool, move |c| {
            c.execute_batch(&sql).map_err(|e| query_error(&sql, e))
        })
        .await?;
        info!("📸 Snapshot created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn rollback(&self, table: &str, snapshot_name: &str) -> Result<(), ParityError> {
        let table = table.to_string();
        let snapshot = snapshot_name.to_string();
        run_blocking(&self.pool, move |c| {
            if !table_exists_on(c, &snapshot)? {
                return Err(DatabaseError::SnapshotMissing(snapshot));
            }
            let (t, s) = (quote_ident(&table), quote_ident(&snapshot));
            // dropping `tx` without commit rolls back
            let tx = c.transaction()?;
            tx.execute(&format!("DELETE FROM {t}"), [])?;
            tx.execute(&format!("INSERT INTO {t} SELECT * FROM {s}"), [])?;
            tx.commit()?;
            Ok(())
        })
        .await?;
        info!("⏪ Target restored from snapshot");
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), ParityError> {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
        run_blocking(&self.pool, move |c| {
            c.execute_batch(&sql).map_err(|e| query_error(&sql, e))
        })
        .await?;
        Ok(())
    }

    async fn column_bounds(&self, table: &str, column: &str) -> Result<Option<(i64, i64)>, ParityError> {
        let col = quote_ident(column);
        let sql = format!("SELECT MIN({col}), MAX({col}) FROM {}", quote_ident(table));
        let t = run_blocking(&self.pool, move |c| query_table(c, &sql, &[])).await?;

        // rounding fractional keys into integer ranges would lose rows
        let dtype = t.storage_dtype(0);
        if !matches!(dtype, DType::Int64 | DType::Empty) {
            return Err(DomainError::InvalidPartitionColumn {
                column: column.to_string(),
                found: dtype.to_string(),
            }
            .into());
        }
        let bounds = t.rows.first().and_then(|row| {
            let lo = row.first().and_then(Value::as_i64)?;
            let hi = row.get(1).and_then(Value::as_i64)?;
            Some((lo, hi))
        });
        Ok(bounds)
    }

    async fn fetch_partition(&self, table: &str, column: &str, range: KeyRange) -> Result<Table, ParityError> {
        let col = quote_ident(column);
        let (predicate, params) = match range {
            KeyRange::Between(lower, upper) => (
                format!("{col} BETWEEN ? AND ?"),
                vec![DbValue::BigInt(lower), DbValue::BigInt(upper)],
            ),
            KeyRange::Null => (format!("{col} IS NULL"), Vec::new()),
        };
        let sql = format!(
            "SELECT * FROM {} WHERE {predicate} ORDER BY {col}",
            quote_ident(table)
        );
        Ok(run_blocking(&self.pool, move |c| query_table(c, &sql, &params)).await?)
    }

    fn engine_name(&self) -> &str {
        "duckdb"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use futures::StreamExt;

    async fn orders(n: i64) -> Result<DuckDbStore> {
        let store = DuckDbStore::in_memory().await?;
        store
            .execute_batch(&format!(
                "CREATE TABLE orders AS SELECT i AS id, 'c' || CAST(i % 3 AS VARCHAR) AS customer, i * 1.5 AS amount FROM range({n}) t(i)"
            ))
            .await?;
        Ok(store)
    }

    #[test]
    fn test_quote_ident_per_part() {
        assert_eq!(quote_ident("main.orders"), r#""main"."orders""#);
        assert_eq!(quote_ident("odd\"name"), r#""odd""name""#);
    }

    #[tokio::test]
    async fn test_stream_batches_covers_table() -> Result<()> {
        let store = orders(25).await?;
        let pages: Vec<_> = store
            .stream_batches(BatchRequest::new("orders", 10).ordered_by("id"))
            .collect()
            .await;
        let sizes: Vec<usize> = pages.iter().map(|p| p.as_ref().map(Table::len).unwrap_or(0)).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        let last = pages[2].as_ref().expect("page");
        assert_eq!(last.rows[0][0], Value::Integer(20));
        Ok(())
    }

    #[tokio::test]
    async fn test_filters_and_row_count() -> Result<()> {
        let store = orders(30).await?;
        let mut filters = Filters::new();
        filters.insert("customer".into(), "c1".into());
        assert_eq!(store.get_row_count("orders", &filters).await?, 10);
        assert_eq!(store.get_row_count("orders", &Filters::new()).await?, 30);

        let page = store
            .fetch_page(&BatchRequest::new("orders", 100).with_filters(filters), 0)
            .await?;
        assert_eq!(page.len(), 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_load_creates_and_appends() -> Result<()> {
        let store = DuckDbStore::in_memory().await?;
        let batch = Table::new(
            vec!["id".into(), "name".into()],
            (0..7).map(|i| vec![Value::Integer(i), Value::Text(format!("n{i}"))]).collect(),
        );
        assert_eq!(store.bulk_load("people", &batch, 3).await?, 7);
        assert_eq!(store.bulk_load("people", &batch, 100).await?, 7);
        assert_eq!(store.get_row_count("people", &Filters::new()).await?, 14);

        let schema = store.get_schema("people").await?;
        let names: Vec<_> = schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(schema[0].data_type, "BIGINT");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_chunk_rolls_back_whole_call() -> Result<()> {
        let store = DuckDbStore::in_memory().await?;
        store
            .execute_batch("CREATE TABLE strict_t (id BIGINT NOT NULL)")
            .await?;
        let batch = Table::new(
            vec!["id".into()],
            vec![vec![1.into()], vec![2.into()], vec![Value::Null]],
        );
        let err = store.bulk_load("strict_t", &batch, 2).await.unwrap_err();
        assert!(matches!(
            err,
            ParityError::Infrastructure(InfrastructureError::Database(DatabaseError::Load { chunk: 1, .. }))
        ));
        assert_eq!(store.get_row_count("strict_t", &Filters::new()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_mutate_rollback_restores_rows() -> Result<()> {
        let store = orders(12).await?;
        let before = store.table_checksum("orders", &[]).await?;

        store.create_snapshot("orders", "orders_snapshot_test").await?;
        store.execute_batch("DELETE FROM orders WHERE id < 5; UPDATE orders SET amount = 0").await?;
        assert_ne!(store.table_checksum("orders", &[]).await?, before);

        store.rollback("orders", "orders_snapshot_test").await?;
        assert_eq!(store.table_checksum("orders", &[]).await?, before);
        assert_eq!(store.get_row_count("orders", &Filters::new()).await?, 12);
        Ok(())
    }

    #[tokio::test]
    async fn test_rollback_requires_snapshot() -> Result<()> {
        let store = orders(3).await?;
        let err = store.rollback("orders", "nope").await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(store.get_row_count("orders", &Filters::new()).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_partition_primitives() -> Result<()> {
        let store = orders(10).await?;
        assert_eq!(store.column_bounds("orders", "id").await?, Some((0, 9)));
        let part = store.fetch_partition("orders", "id", KeyRange::Between(3, 5)).await?;
        assert_eq!(part.len(), 3);
        assert!(store.fetch_partition("orders", "id", KeyRange::Null).await?.is_empty());

        store.execute_batch("CREATE TABLE empty_t (id BIGINT)").await?;
        assert_eq!(store.column_bounds("empty_t", "id").await?, None);

        let err = store.column_bounds("orders", "amount").await.unwrap_err();
        assert!(matches!(
            err,
            ParityError::Domain(DomainError::InvalidPartitionColumn { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_pages_carry_declared_types() -> Result<()> {
        let store = DuckDbStore::in_memory().await?;
        store
            .execute_batch("CREATE TABLE sparse AS SELECT i AS id, CAST(NULL AS DOUBLE) AS amount FROM range(4) t(i)")
            .await?;
        let page = store
            .fetch_page(&BatchRequest::new("sparse", 2).ordered_by("id"), 0)
            .await?;
        assert_eq!(page.types, vec![DType::Int64, DType::Float64]);

        // the all-NULL column is created with its source type, not VARCHAR
        store.bulk_load("sparse_copy", &page, 10).await?;
        let schema = store.get_schema("sparse_copy").await?;
        assert_eq!(schema[1].data_type, "DOUBLE");
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_query_is_reported() -> Result<()> {
        let store = DuckDbStore::in_memory().await?;
        let err = store
            .execute_query("SELECT * FROM non_existent_table", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("non_existent_table"));
        assert!(!store.table_exists("non_existent_table").await?);
        Ok(())
    }
}
