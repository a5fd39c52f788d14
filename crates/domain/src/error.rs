//! Domain error types.

use common::ProductId;
use ledger_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path of the offending field, e.g. `total` or `items[1].quantity`.
    pub field: String,
    pub message: String,
}

/// Every field-level problem found while validating one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection holding one error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if any error was reported for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Converts into `Err(self)` if any error was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request failed validation and never reached the store.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The referenced entity does not exist for this owner.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint was violated.
    #[error("A record with this {field} already exists")]
    Conflict { field: String },

    /// The entity is still referenced and was not deleted.
    #[error("{entity} {id} is still referenced by invoice items")]
    InUse { entity: &'static str, id: String },

    /// A stock decrement was refused inside the transaction.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The transaction failed and was rolled back.
    #[error("Failed to {operation}: {source}")]
    Transaction {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// A store error outside of any classified operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(errors)
    }
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies a store error raised while running `operation`.
    ///
    /// Missing rows, unique violations, referenced rows and refused stock
    /// decrements keep their own variants; everything else is reported as a
    /// failed transaction.
    pub fn from_store(operation: impl Into<String>, source: StoreError) -> Self {
        match source {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::Conflict { field } => DomainError::Conflict { field },
            StoreError::InUse { entity, id } => DomainError::InUse { entity, id },
            StoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => DomainError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            source => DomainError::Transaction {
                operation: operation.into(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_display_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("total", "Total must equal subtotal plus tax");
        errors.add("items", "At least one item is required");

        assert_eq!(
            errors.to_string(),
            "total: Total must equal subtotal plus tax; items: At least one item is required"
        );
        assert!(errors.has_field("items"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn empty_validation_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn store_errors_are_classified() {
        let err = DomainError::from_store(
            "create purchase invoice",
            StoreError::not_found("Product", "p-1"),
        );
        assert!(matches!(err, DomainError::NotFound { entity: "Product", .. }));

        let err = DomainError::from_store(
            "create purchase invoice",
            StoreError::Unavailable("down".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Failed to create purchase invoice: Storage unavailable: down"
        );
    }
}
