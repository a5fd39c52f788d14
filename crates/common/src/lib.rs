//! Shared identifiers and value types used across the ledger crates.

mod ids;
mod kind;
mod money;

pub use ids::{ExpenseId, InvoiceId, ItemId, OwnerId, PaymentId, ProductId, SupplierId};
pub use kind::{InvoiceKind, PaymentType};
pub use money::Money;
