//! Error types for levelcrate

use thiserror::Error;

/// Main error type for levelcrate operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Dimension mismatch for {field}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        field: &'static str,
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("Numerical divergence at step {step}: {count} non-finite band values")]
    NumericalDivergence { step: usize, count: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

impl Error {
    /// True for errors that abort a run before the first iteration.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration(_) | Error::DimensionMismatch { .. } | Error::InvalidData(_)
        )
    }
}

/// Result type alias for levelcrate operations
pub type Result<T> = std::result::Result<T, Error>;
