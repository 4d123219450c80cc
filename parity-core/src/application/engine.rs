// parity-core/src/application/engine.rs

use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::domain::data::{Table, Value};
use crate::error::ParityError;
use crate::ports::store::DataStore;

/// Ad-hoc query with timing. Used by the CLI `query` command.
#[instrument(skip(store, params), fields(engine = store.engine_name(), query.len = query.len()))]
pub async fn execute_query(
    store: &dyn DataStore,
    query: &str,
    params: &[Value],
) -> Result<Table, ParityError> {
    let start = Instant::now();
    debug!("⚡ Executing Query: {}", query);

    let result = store.execute_query(query, params).await;
    let duration = start.elapsed();

    match result {
        Ok(table) => {
            debug!(rows = table.len(), "✅ Query finished in {:.2?}", duration);
            Ok(table)
        }
        Err(e) => {
            error!("❌ Query failed after {:.2?}: {}", duration, e);
            Err(e)
        }
    }
}
