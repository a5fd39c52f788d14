//! Transactional persistence for the invoice ledger.
//!
//! [`LedgerStore`] is the persistence provider injected into the services:
//! it serves owner-scoped reads and opens [`LedgerTransaction`]s for writes
//! that must land together (invoice header, line items, stock and payments).

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryLedgerStore, InMemoryTransaction};
pub use postgres::{PostgresLedgerStore, PostgresTransaction};
pub use query::{
    DEFAULT_PAGE_SIZE, InvoiceQuery, InvoiceSortField, ListQuery, MAX_PAGE_SIZE, Page, Paging,
    PaymentQuery, SortOrder,
};
pub use record::{
    Counterpart, Expense, ExpenseChanges, Invoice, InvoiceChanges, InvoiceSummary, ItemValues,
    LineItem, NewExpense, NewInvoice, NewPayment, NewProduct, NewSupplier, Payment, PaymentLink,
    Product, ProductChanges, Supplier, SupplierChanges,
};
pub use store::{LedgerStore, LedgerTransaction};
