// parity-core/src/ports/mod.rs

pub mod store;
pub mod transform;
