use crate::op::Operation;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FixError {
    #[error("A correction is already in progress")]
    AlreadyInProgress,
    #[error("Correction oracle failed: {0}")]
    OracleFailure(String),
    #[error(
        "Correction rejected: line count changed from {original_lines} to {corrected_lines}"
    )]
    CorrectionRejected {
        original_lines: usize,
        corrected_lines: usize,
    },
    #[error("Text to correct doesn't match the document")]
    TextMismatch,
    #[error("Operation out of bounds: {0:?}, doc size: {1:?}")]
    OpOutOfBound(Operation, u64),
    #[error("Cannot parse request: {0}")]
    ParseError(String),
    #[error("Fatal error: {0}")]
    Fatal(String),
}

pub type FixResult<T> = Result<T, FixError>;

impl From<serde_json::Error> for FixError {
    fn from(value: serde_json::Error) -> Self {
        FixError::ParseError(format!("{:#}", value))
    }
}

impl<T> From<std::sync::PoisonError<T>> for FixError {
    fn from(value: std::sync::PoisonError<T>) -> Self {
        FixError::Fatal(format!("Lock poisoned: {}", value))
    }
}
