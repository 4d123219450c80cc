// parity-core/src/ports/store.rs

// What the pipeline and the validation engine need from a relational store.
// The DuckDB adapter is the production implementation; tests plug in fakes.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::data::{Table, Value};
use crate::domain::retry::RetryPolicy;
use crate::error::ParityError;

/// Equality filters, ANDed together (`column = value`).
pub type Filters = BTreeMap<String, Value>;

/// Column description, independent of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// Parameters of a paginated read.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub table: String,
    pub batch_size: usize,
    /// `None` reads every column.
    pub columns: Option<Vec<String>>,
    pub filters: Filters,
    /// Stable pagination needs an ordering; without one the engine's scan order is used.
    pub order_by: Option<String>,
}

impl BatchRequest {
    pub fn new(table: impl Into<String>, batch_size: usize) -> Self {
        Self {
            table: table.into(),
            batch_size,
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn ordered_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }
}

/// One slice of a partitioned read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRange {
    /// `lower <= column <= upper`
    Between(i64, i64),
    /// Rows whose key is NULL, which no range can match.
    Null,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Backoff applied to every page read of [`DataStore::stream_batches`].
    fn retry_policy(&self) -> &RetryPolicy;

    /// One LIMIT/OFFSET page. Not retried by itself.
    async fn fetch_page(&self, request: &BatchRequest, offset: u64) -> Result<Table, ParityError>;

    async fn execute_query(&self, query: &str, params: &[Value]) -> Result<Table, ParityError>;

    /// First `limit` rows of `table` in scan order (`SELECT * ... LIMIT`).
    async fn sample(&self, table: &str, limit: usize) -> Result<Table, ParityError>;

    /// Appends `data` to `table` in chunks of `chunk_size` rows. Returns rows written.
    async fn bulk_load(&self, table: &str, data: &Table, chunk_size: usize) -> Result<u64, ParityError>;

    async fn get_schema(&self, table: &str) -> Result<Vec<ColumnSchema>, ParityError>;

    async fn get_row_count(&self, table: &str, filters: &Filters) -> Result<u64, ParityError>;

    async fn table_exists(&self, table: &str) -> Result<bool, ParityError>;

    /// SHA-256 over the rows of `columns`, ordered by those columns.
    async fn table_checksum(&self, table: &str, columns: &[String]) -> Result<String, ParityError>;

    async fn create_snapshot(&self, table: &str, snapshot_name: &str) -> Result<(), ParityError>;

    async fn rollback(&self, table: &str, snapshot_name: &str) -> Result<(), ParityError>;

    async fn drop_table(&self, table: &str) -> Result<(), ParityError>;

    /// `(min, max)` of an integer column, `None` when it has no non-NULL value.
    /// Fails on a non-integer column.
    async fn column_bounds(&self, table: &str, column: &str) -> Result<Option<(i64, i64)>, ParityError>;

    async fn fetch_partition(&self, table: &str, column: &str, range: KeyRange) -> Result<Table, ParityError>;

    fn engine_name(&self) -> &str;

    /// Lazy, finite stream of pages. Each page is retried on its own; the
    /// stream ends on the first empty page or after the first error.
    fn stream_batches(&self, request: BatchRequest) -> BoxStream<'_, Result<Table, ParityError>> {
        paginate(self, request)
    }
}

enum Cursor {
    At(u64),
    Done,
}

pub(crate) fn paginate<S: DataStore + ?Sized>(
    store: &S,
    request: BatchRequest,
) -> BoxStream<'_, Result<Table, ParityError>> {
    let step = request.batch_size.max(1) as u64;
    stream::unfold(
        (Cursor::At(0), request),
        move |(cursor, request)| async move {
            let Cursor::At(offset) = cursor else {
                return None;
            };
            let label = format!("read {} @ {}", request.table, offset);
            let page = store
                .retry_policy()
                .retry(&label, || store.fetch_page(&request, offset))
                .await;
            match page {
                Ok(t) if t.is_empty() => None,
                Ok(t) => Some((Ok(t), (Cursor::At(offset + step), request))),
                Err(e) => Some((Err(e), (Cursor::Done, request))),
            }
        },
    )
    .boxed()
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fake used by the application tests.

    use super::*;
    use crate::domain::data::DType;
    use crate::domain::error::DomainError;
    use crate::infrastructure::error::DatabaseError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    pub struct MemoryStore {
        pub tables: Mutex<HashMap<String, Table>>,
        /// Page reads that fail before one succeeds.
        pub flaky_reads: AtomicU32,
        pub page_reads: AtomicU32,
        /// Offsets of every page read, in call order.
        pub read_offsets: Mutex<Vec<u64>>,
        /// The first read at this offset fails.
        pub fail_once_at: Mutex<Option<u64>>,
        pub fail_snapshots: bool,
        pub fail_loads: bool,
        pub fail_samples_of: Option<String>,
        pub policy: RetryPolicy,
    }

    impl MemoryStore {
        pub fn with_table(name: &str, table: Table) -> Self {
            let store = Self {
                policy: RetryPolicy::immediate(3),
                ..Self::default()
            };
            store.put(name, table);
            store
        }

        pub fn put(&self, name: &str, table: Table) {
            if let Ok(mut tables) = self.tables.lock() {
                tables.insert(name.to_string(), table);
            }
        }

        pub fn get(&self, name: &str) -> Option<Table> {
            self.tables.lock().ok()?.get(name).cloned()
        }

        fn lookup(&self, name: &str) -> Result<Table, ParityError> {
            self.get(name).ok_or_else(|| {
                DatabaseError::Query {
                    query: name.to_string(),
                    message: format!("Table {name} does not exist"),
                }
                .into()
            })
        }
    }

    #[async_trait]
    impl DataStore for MemoryStore {
        fn retry_policy(&self) -> &RetryPolicy {
            &self.policy
        }

        async fn fetch_page(&self, request: &BatchRequest, offset: u64) -> Result<Table, ParityError> {
            self.page_reads.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut offsets) = self.read_offsets.lock() {
                offsets.push(offset);
            }
            let fail_here = self
                .fail_once_at
                .lock()
                .map(|mut at| at.take_if(|at| *at == offset).is_some())
                .unwrap_or(false);
            if fail_here {
                return Err(DatabaseError::Connection("connection reset".into()).into());
            }
            if self
                .flaky_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DatabaseError::Connection("connection reset".into()).into());
            }
            let t = self.lookup(&request.table)?;
            let rows = t
                .rows
                .into_iter()
                .skip(offset as usize)
                .take(request.batch_size)
                .collect();
            Ok(Table::new(t.columns, rows))
        }

        async fn execute_query(&self, query: &str, _params: &[Value]) -> Result<Table, ParityError> {
            Err(DatabaseError::Query {
                query: query.to_string(),
                message: "the memory store has no SQL engine".into(),
            }
            .into())
        }

        async fn sample(&self, table: &str, limit: usize) -> Result<Table, ParityError> {
            if self.fail_samples_of.as_deref() == Some(table) {
                return Err(DatabaseError::Connection("sample read refused".into()).into());
            }
            Ok(self.lookup(table)?.head(limit))
        }

        async fn bulk_load(&self, table: &str, data: &Table, _chunk: usize) -> Result<u64, ParityError> {
            if self.fail_loads {
                return Err(DatabaseError::Load {
                    table: table.to_string(),
                    chunk: 0,
                    message: "disk full".into(),
                }
                .into());
            }
            let mut tables = self
                .tables
                .lock()
                .map_err(|e| ParityError::InternalError(e.to_string()))?;
            tables
                .entry(table.to_string())
                .or_insert_with(|| Table::empty(data.columns.clone()))
                .extend(data.clone());
            Ok(data.len() as u64)
        }

        async fn get_schema(&self, table: &str) -> Result<Vec<ColumnSchema>, ParityError> {
            let t = self.lookup(table)?;
            Ok((0..t.width())
                .map(|i| ColumnSchema {
                    name: t.columns[i].clone(),
                    data_type: t.column_dtype(i).sql_type().to_string(),
                    is_nullable: true,
                })
                .collect())
        }

        async fn get_row_count(&self, table: &str, _filters: &Filters) -> Result<u64, ParityError> {
            Ok(self.lookup(table)?.len() as u64)
        }

        async fn table_exists(&self, table: &str) -> Result<bool, ParityError> {
            Ok(self.get(table).is_some())
        }

        async fn table_checksum(&self, table: &str, _columns: &[String]) -> Result<String, ParityError> {
            Ok(format!("{}", self.lookup(table)?.len()))
        }

        async fn create_snapshot(&self, table: &str, snapshot_name: &str) -> Result<(), ParityError> {
            if self.fail_snapshots {
                return Err(DatabaseError::Connection("read-only target".into()).into());
            }
            let t = self.get(table).unwrap_or_default();
            self.put(snapshot_name, t);
            Ok(())
        }

        async fn rollback(&self, table: &str, snapshot_name: &str) -> Result<(), ParityError> {
            let snap = self
                .get(snapshot_name)
                .ok_or_else(|| DatabaseError::SnapshotMissing(snapshot_name.to_string()))?;
            self.put(table, snap);
            Ok(())
        }

        async fn drop_table(&self, table: &str) -> Result<(), ParityError> {
            if let Ok(mut tables) = self.tables.lock() {
                tables.remove(table);
            }
            Ok(())
        }

        async fn column_bounds(&self, table: &str, column: &str) -> Result<Option<(i64, i64)>, ParityError> {
            let t = self.lookup(table)?;
            let Some(idx) = t.column_index(column) else {
                return Ok(None);
            };
            let dtype = t.column_dtype(idx);
            if !matches!(dtype, DType::Int64 | DType::Empty) {
                return Err(DomainError::InvalidPartitionColumn {
                    column: column.to_string(),
                    found: dtype.to_string(),
                }
                .into());
            }
            let ints: Vec<i64> = t.column_values(idx).filter_map(Value::as_i64).collect();
            Ok(ints.iter().min().copied().zip(ints.iter().max().copied()))
        }

        async fn fetch_partition(&self, table: &str, column: &str, range: KeyRange) -> Result<Table, ParityError> {
            let t = self.lookup(table)?;
            let idx = t.column_index(column).unwrap_or(0);
            let rows = t
                .rows
                .iter()
                .filter(|r| {
                    let key = r.get(idx).unwrap_or(&Value::Null);
                    match range {
                        KeyRange::Between(lower, upper) => {
                            key.as_i64().is_some_and(|v| (lower..=upper).contains(&v))
                        }
                        KeyRange::Null => key.is_null(),
                    }
                })
                .cloned()
                .collect();
            Ok(Table::new(t.columns.clone(), rows))
        }

        fn engine_name(&self) -> &str {
            "memory"
        }
    }
}
