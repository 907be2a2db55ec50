//! Store error types.

use domain::ParseBreakStatusError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write affected a different number of rows than the caller required.
    #[error("row count mismatch: expected {expected}, affected {affected}")]
    RowCountMismatch { expected: u64, affected: u64 },

    /// A stored break status could not be parsed.
    #[error(transparent)]
    InvalidStatus(#[from] ParseBreakStatusError),

    /// The store is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
