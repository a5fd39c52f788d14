use std::time::Duration;

use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced row does not exist or belongs to another owner.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint was violated.
    #[error("A record with this {field} already exists")]
    Conflict { field: String },

    /// The row is still referenced and cannot be deleted.
    #[error("{entity} {id} is still referenced by invoice items")]
    InUse { entity: &'static str, id: String },

    /// A stock decrement would take the product below zero.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The transaction did not finish within its time budget and was rolled back.
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// The backend refused the operation (used by the in-memory store's failure switches).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be mapped back onto its Rust type.
    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for ledger store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
