//! Purchase and sale invoices.

pub mod aggregate;
pub mod payload;
pub mod reconciler;
pub mod service;
pub mod validation;

pub use aggregate::{InvoiceDraft, InvoiceRevision};
pub use payload::{CreateInvoice, ItemInput, UpdateInvoice};
pub use reconciler::{ItemUpdate, ReconcileError, Reconciliation, StockDelta, reconcile};
pub use service::{
    DEFAULT_TRANSACTION_TIMEOUT, DeletePolicy, InvoiceService, InvoiceServiceConfig,
};
pub use validation::{validate_create, validate_update};
