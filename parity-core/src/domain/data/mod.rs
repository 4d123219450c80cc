// parity-core/src/domain/data/mod.rs

pub mod table;
pub mod value;

pub use table::{Row, Table};
pub use value::{DType, Value};
