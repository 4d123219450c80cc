// parity-core/src/domain/mod.rs

pub mod data;
pub mod error;
pub mod job;
pub mod project;
pub mod retry;
pub mod rule;
pub mod validation;

pub use error::DomainError;
