// parity-core/src/infrastructure/adapters/pool.rs

// bb8 pool of DuckDB connections. Every connection is a clone of one root
// connection, so all of them see the same database, `:memory:` included.
// Blocking work runs on tokio's blocking pool with a checked-out connection.

use async_trait::async_trait;
use bb8::{Pool, RunError};
use duckdb::Connection;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::infrastructure::error::DatabaseError;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub(crate) struct PoolSettings {
    pub size: usize,
    /// Connections older than this are closed and replaced.
    pub max_lifetime: Duration,
    /// `SELECT 1` on checkout.
    pub pre_ping: bool,
}

pub(crate) type DuckDbPool = Pool<DuckDbConnectionManager>;

pub(crate) struct DuckDbConnectionManager {
    root: Mutex<Connection>,
}

impl DuckDbConnectionManager {
    pub fn new(root: Connection) -> Self {
        Self {
            root: Mutex::new(root),
        }
    }
}

fn ping(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
        .map(|_| ())
}

#[async_trait]
impl bb8::ManageConnection for DuckDbConnectionManager {
    type Connection = Connection;
    type Error = DatabaseError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self
            .root
            .lock()
            .map_err(|_| DatabaseError::Pool("root connection mutex poisoned".into()))?;
        Ok(root.try_clone()?)
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        Ok(ping(conn)?)
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

fn checkout_error(e: RunError<DatabaseError>) -> DatabaseError {
    match e {
        RunError::User(e) => e,
        RunError::TimedOut => {
            DatabaseError::Pool(format!("no connection available after {CONNECTION_TIMEOUT:?}"))
        }
    }
}

/// Fails when the root connection does not answer `SELECT 1`.
pub(crate) async fn build_pool(root: Connection, settings: PoolSettings) -> Result<DuckDbPool, DatabaseError> {
    ping(&root).map_err(|e| DatabaseError::Connection(format!("liveness check failed: {e}")))?;

    let max_size = u32::try_from(settings.size.max(1))
        .map_err(|_| DatabaseError::Pool(format!("pool size {} is too large", settings.size)))?;
    let max_lifetime = (!settings.max_lifetime.is_zero()).then_some(settings.max_lifetime);

    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(1))
        .connection_timeout(CONNECTION_TIMEOUT)
        .max_lifetime(max_lifetime)
        .test_on_check_out(settings.pre_ping)
        .build(DuckDbConnectionManager::new(root))
        .await?;

    debug!(max_size, "DuckDB connection pool ready");
    Ok(pool)
}

/// Checks a connection out and runs `f` with it on the blocking pool.
pub(crate) async fn run_blocking<T, F>(pool: &DuckDbPool, f: F) -> Result<T, DatabaseError>
where
    F: FnOnce(&mut Connection) -> Result<T, DatabaseError> + Send + 'static,
    T: Send + 'static,
{
    let mut conn = pool.get_owned().await.map_err(checkout_error)?;
    let (conn, result) = tokio::task::spawn_blocking(move || {
        let result = f(&mut *conn);
        (conn, result)
    })
    .await
    .map_err(|e| DatabaseError::Pool(format!("blocking task failed: {e}")))?;
    // back to the pool from the async side
    drop(conn);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn settings(size: usize) -> PoolSettings {
        PoolSettings {
            size,
            max_lifetime: Duration::from_secs(3600),
            pre_ping: true,
        }
    }

    #[tokio::test]
    async fn test_connections_share_one_database() -> anyhow::Result<()> {
        let pool = build_pool(Connection::open_in_memory()?, settings(3)).await?;
        run_blocking(&pool, |c| {
            Ok(c.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7)")?)
        })
        .await?;
        for _ in 0..3 {
            let x: i32 = run_blocking(&pool, |c| Ok(c.query_row("SELECT x FROM t", [], |r| r.get(0))?)).await?;
            assert_eq!(x, 7);
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_busy_connection_does_not_block_idle_ones() -> anyhow::Result<()> {
        let pool = build_pool(Connection::open_in_memory()?, settings(2)).await?;
        let barrier = Arc::new(Barrier::new(2));

        // both checkouts must be live at the same time to pass the barrier
        let gate = Arc::clone(&barrier);
        let first = tokio::spawn({
            let pool = pool.clone();
            async move { run_blocking(&pool, move |_| Ok(gate.wait().is_leader())).await }
        });
        let gate = Arc::clone(&barrier);
        let second = tokio::spawn({
            let pool = pool.clone();
            async move { run_blocking(&pool, move |_| Ok(gate.wait().is_leader())).await }
        });

        let leaders = [first.await??, second.await??];
        assert_eq!(leaders.iter().filter(|l| **l).count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_lifetime_means_no_recycling() -> anyhow::Result<()> {
        let pool = build_pool(
            Connection::open_in_memory()?,
            PoolSettings {
                size: 1,
                max_lifetime: Duration::ZERO,
                pre_ping: false,
            },
        )
        .await?;
        let v: i32 = run_blocking(&pool, |c| Ok(c.query_row("SELECT 41 + 1", [], |r| r.get(0))?)).await?;
        assert_eq!(v, 42);
        Ok(())
    }
}
