// parity-core/src/ports/transform.rs

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::data::Table;

#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(parity::ports::transform))]
pub struct TransformError {
    pub message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Caller-supplied batch strategy: one batch in, one batch out.
///
/// Implementations must be pure with respect to the batch. They run on the
/// async executor thread, so heavy work should stay proportional to the batch.
pub trait Transform: Send + Sync {
    fn apply(&self, batch: Table) -> Result<Table, TransformError>;

    fn name(&self) -> &str {
        "transform"
    }
}

impl<F> Transform for F
where
    F: Fn(Table) -> Result<Table, TransformError> + Send + Sync,
{
    fn apply(&self, batch: Table) -> Result<Table, TransformError> {
        self(batch)
    }
}

/// Passes batches through unchanged.
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, batch: Table) -> Result<Table, TransformError> {
        Ok(batch)
    }

    fn name(&self) -> &str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::Value;

    #[test]
    fn test_closure_is_a_transform() {
        let double = |mut t: Table| -> Result<Table, TransformError> {
            for row in &mut t.rows {
                if let Some(Value::Integer(i)) = row.first_mut() {
                    *i *= 2;
                }
            }
            Ok(t)
        };
        let out = double
            .apply(Table::new(vec!["n".into()], vec![vec![21.into()]]))
            .map_err(|e| e.message);
        assert_eq!(out.map(|t| t.rows), Ok(vec![vec![Value::Integer(42)]]));
    }
}
