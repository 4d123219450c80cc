// parity-core/src/infrastructure/adapters/mod.rs

mod convert;
pub mod duckdb;
mod pool;
pub mod sql_transform;

pub use self::duckdb::DuckDbStore;
pub use self::sql_transform::SqlTransform;
