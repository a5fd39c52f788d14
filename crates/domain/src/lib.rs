//! Domain layer for the invoice ledger.
//!
//! This crate provides:
//! - The line-item reconciler that diffs stored and requested invoice items
//! - The invoice aggregate that writes header, items, stock and payments in one transaction
//! - Request validation with field-level errors
//! - `InvoiceService` and `CatalogService`, generic over the ledger store

pub mod catalog;
pub mod error;
pub mod invoice;
pub mod payments;

pub use catalog::{
    CatalogService, CreateExpense, CreateProduct, CreateSupplier, UpdateExpense, UpdateProduct,
    UpdateSupplier,
};
pub use error::{DomainError, FieldError, ValidationErrors};
pub use invoice::{
    CreateInvoice, DEFAULT_TRANSACTION_TIMEOUT, DeletePolicy, InvoiceDraft, InvoiceRevision,
    InvoiceService, InvoiceServiceConfig, ItemInput, ReconcileError, Reconciliation, StockDelta,
    UpdateInvoice, reconcile,
};
