// parity-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("DuckDB Engine Error: {0}")]
    #[diagnostic(
        code(parity::infra::database::duckdb),
        help("An error occurred inside the SQL engine.")
    )]
    DuckDB(#[from] duckdb::Error),

    #[error("Connection failed: {0}")]
    #[diagnostic(
        code(parity::infra::database::connection),
        help("Check the database path and that no other process holds an exclusive lock on it.")
    )]
    Connection(String),

    #[error("Query failed: {message}\n    Query: {query}")]
    #[diagnostic(code(parity::infra::database::query))]
    Query { query: String, message: String },

    #[error("Bulk load into '{table}' failed at chunk {chunk}: {message}")]
    #[diagnostic(
        code(parity::infra::database::load),
        help("The whole bulk_load call was rolled back. Rows loaded by previous calls are kept.")
    )]
    Load {
        table: String,
        chunk: usize,
        message: String,
    },

    #[error("Snapshot '{0}' does not exist")]
    #[diagnostic(
        code(parity::infra::database::snapshot),
        help("Rollback needs a snapshot taken before the load. List tables with `parity query`.")
    )]
    SnapshotMissing(String),

    #[error("Connection pool error: {0}")]
    #[diagnostic(code(parity::infra::database::pool))]
    Pool(String),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- DATABASE (Abstracted) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(parity::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(parity::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    #[diagnostic(code(parity::infra::json))]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(parity::infra::config))]
    ConfigError(String),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(parity::infra::config_missing))]
    ConfigNotFound(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(parity::infra::config_invalid),
        help("A value in parity.yaml is out of range.")
    )]
    InvalidConfig(#[from] validator::ValidationErrors),

    // --- TEMPLATING ---
    #[error("Template Rendering Error: {0}")]
    #[diagnostic(
        code(parity::infra::template),
        help("Check the {{ ... }} placeholders of the scenario template.")
    )]
    TemplateError(#[from] minijinja::Error),
}

// Shortcut for `?` on raw duckdb calls
impl From<duckdb::Error> for InfrastructureError {
    fn from(err: duckdb::Error) -> Self {
        InfrastructureError::Database(DatabaseError::DuckDB(err))
    }
}

impl From<anyhow::Error> for InfrastructureError {
    fn from(err: anyhow::Error) -> Self {
        InfrastructureError::ConfigError(format!("{:#}", err))
    }
}
