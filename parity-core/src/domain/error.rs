// parity-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::job::JobStatus;
use crate::ports::transform::TransformError;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Transformation failed: {0}")]
    #[diagnostic(
        code(parity::domain::transform),
        help("The transformation raised while processing a batch. The run was aborted; earlier batches stay loaded.")
    )]
    Transformation(#[from] TransformError),

    #[error("Transformation resulted in empty dataset ({input_rows} input rows)")]
    #[diagnostic(code(parity::domain::transform_empty))]
    EmptyTransformOutput { input_rows: usize },

    #[error("Invalid transformation SQL: {0}")]
    #[diagnostic(
        code(parity::domain::transform_sql),
        help("A SQL transform must be exactly one SELECT statement reading from `batch`.")
    )]
    InvalidTransformSql(String),

    #[error("Invalid scenario: {0}")]
    #[diagnostic(code(parity::domain::scenario))]
    InvalidScenario(String),

    #[error("Rule '{0}' has no source table")]
    #[diagnostic(code(parity::domain::rule))]
    MissingSourceTable(String),

    #[error("Illegal job transition for {job_id}: {from} -> {to}")]
    #[diagnostic(code(parity::domain::job_transition))]
    IllegalTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job '{0}' not found")]
    #[diagnostic(code(parity::domain::job_not_found))]
    JobNotFound(String),

    #[error("Partition column '{column}' holds {found} values")]
    #[diagnostic(
        code(parity::domain::partition_column),
        help("Partitioned mode splits the source into integer key ranges. Pick an integer column (pipeline.partition_column) or run sequentially.")
    )]
    InvalidPartitionColumn { column: String, found: String },

    #[error("Execution cancelled")]
    #[diagnostic(code(parity::domain::cancelled))]
    Cancelled,
}
