// parity-core/src/lib.rs

#![allow(missing_docs)]
// 1. Memory safety
#![deny(unsafe_code)]
// 2. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 3. Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (Interfaces / Traits)
// DataStore (relational access) and Transform (batch strategy).
pub mod ports;

// 2. Domain (business core)
// Tables & values, rules & scenarios, discrepancy detection, assertions,
// profiling, retry policy, job state machine. No I/O.
pub mod domain;

// 3. Infrastructure (Adapters)
// DuckDB store + pool, config files, rule catalog, scenario templates.
pub mod infrastructure;

// 4. Application (Use Cases)
// Transformation pipeline, validation engine, background jobs.
pub mod application;

// --- GLOBAL ERROR HANDLING ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
pub use error::ParityError;
