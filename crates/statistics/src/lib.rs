//! Read-side dashboard aggregation for the invoice ledger.
//!
//! [`StatisticsService`] sums invoice amounts per kind, groups expenses by
//! category and payments by type, and returns the latest payments. It only
//! reads; nothing here writes to the store.

pub mod dashboard;
pub mod error;

pub use dashboard::{
    ExpenseTotals, InvoiceTotals, PaymentTotals, RECENT_PAYMENTS, Statistics, StatisticsService,
};
pub use error::{Result, StatisticsError};
