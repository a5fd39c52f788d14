//! Statistics error types.

use thiserror::Error;

/// Errors that can occur while aggregating statistics.
#[derive(Debug, Error)]
pub enum StatisticsError {
    /// Reading from the ledger store failed.
    #[error("Failed to load statistics: {0}")]
    Store(#[from] ledger_store::StoreError),
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatisticsError>;
