// parity-core/src/error.rs

use std::fmt;

use crate::domain::error::DomainError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use thiserror::Error;

/// Step of a pipeline run at which a failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Extract,
    Transform,
    Validate,
    Load,
    Partition,
    Cancel,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Extract => "extract",
            RunStage::Transform => "transform",
            RunStage::Validate => "validate",
            RunStage::Load => "load",
            RunStage::Partition => "partition",
            RunStage::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum ParityError {
    // --- DOMAIN ERRORS (transform contract, scenarios, jobs) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- INFRASTRUCTURE ERRORS (Store, IO, Parsing) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- TERMINAL PIPELINE FAILURE ---
    #[error("Pipeline failed during {stage} after {records_processed} records: {source}")]
    RunFailed {
        stage: RunStage,
        records_processed: u64,
        #[source]
        source: Box<ParityError>,
    },

    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl ParityError {
    /// Wraps `self` as the terminal failure of a pipeline run.
    pub fn at_stage(self, stage: RunStage, records_processed: u64) -> Self {
        ParityError::RunFailed {
            stage,
            records_processed,
            source: Box::new(self),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            ParityError::Domain(DomainError::Cancelled) => true,
            ParityError::RunFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for ParityError {
    fn from(err: std::io::Error) -> Self {
        ParityError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<DatabaseError> for ParityError {
    fn from(err: DatabaseError) -> Self {
        ParityError::Infrastructure(InfrastructureError::Database(err))
    }
}

impl From<duckdb::Error> for ParityError {
    fn from(err: duckdb::Error) -> Self {
        ParityError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_failed_message_carries_stage_and_count() {
        let err = ParityError::Domain(DomainError::EmptyTransformOutput { input_rows: 10 })
            .at_stage(RunStage::Validate, 250);
        let msg = err.to_string();
        assert!(msg.contains("validate"));
        assert!(msg.contains("250"));
        assert!(msg.contains("empty dataset"));
    }

    #[test]
    fn test_cancelled_is_detected_through_wrapping() {
        let err = ParityError::Domain(DomainError::Cancelled).at_stage(RunStage::Cancel, 0);
        assert!(err.is_cancelled());
        assert!(!ParityError::InternalError("x".into()).is_cancelled());
    }
}
