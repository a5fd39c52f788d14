//! Dashboard statistics.

use std::collections::BTreeMap;
use std::time::Instant;

use common::{InvoiceKind, Money, OwnerId};
use ledger_store::{Expense, InvoiceSummary, LedgerStore, Payment};
use serde::Serialize;

use crate::Result;

/// Number of payments returned in [`PaymentTotals::recent`].
pub const RECENT_PAYMENTS: usize = 5;

/// Sums over all invoices of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub total_invoices: u64,
    pub total_amount: Money,
    pub total_paid: Money,
    pub total_remaining: Money,
}

impl InvoiceTotals {
    pub fn from_summaries(summaries: &[InvoiceSummary]) -> Self {
        summaries.iter().fold(Self::default(), |mut acc, s| {
            acc.total_invoices += 1;
            acc.total_amount += s.total;
            acc.total_paid += s.paid;
            acc.total_remaining += s.remaining;
            acc
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpenseTotals {
    pub total_expenses: u64,
    pub total_amount: Money,
    pub by_category: BTreeMap<String, Money>,
}

impl ExpenseTotals {
    pub fn from_expenses(expenses: &[Expense]) -> Self {
        let mut totals = Self::default();
        for expense in expenses {
            totals.total_expenses += 1;
            totals.total_amount += expense.amount;
            *totals
                .by_category
                .entry(expense.category.clone())
                .or_default() += expense.amount;
        }
        totals
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentTotals {
    pub total_payments: u64,
    /// Net amount: correction entries are negative.
    pub total_amount: Money,
    /// Keyed by payment type, e.g. `SUPPLIER_PAYMENT`.
    pub by_type: BTreeMap<String, Money>,
    /// Newest first.
    pub recent: Vec<Payment>,
}

impl PaymentTotals {
    /// Aggregates `payments`, which must be ordered newest first.
    pub fn from_payments(payments: &[Payment]) -> Self {
        let mut totals = Self::default();
        for payment in payments {
            totals.total_payments += 1;
            totals.total_amount += payment.amount;
            *totals
                .by_type
                .entry(payment.payment_type.as_str().to_string())
                .or_default() += payment.amount;
        }
        totals.recent = payments.iter().take(RECENT_PAYMENTS).cloned().collect();
        totals
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub suppliers_count: u64,
    pub purchase_invoices: InvoiceTotals,
    pub sale_invoices: InvoiceTotals,
    pub expenses: ExpenseTotals,
    pub payments: PaymentTotals,
}

/// Computes dashboard statistics for one owner.
#[derive(Clone)]
pub struct StatisticsService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> StatisticsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn statistics(&self, owner_id: OwnerId) -> Result<Statistics> {
        let start = Instant::now();

        let (suppliers_count, purchases, sales, expenses, payments) = tokio::try_join!(
            self.store.count_suppliers(owner_id),
            self.store.invoice_summaries(owner_id, InvoiceKind::Purchase),
            self.store.invoice_summaries(owner_id, InvoiceKind::Sale),
            self.store.all_expenses(owner_id),
            self.store.all_payments(owner_id),
        )?;

        let statistics = Statistics {
            suppliers_count,
            purchase_invoices: InvoiceTotals::from_summaries(&purchases),
            sale_invoices: InvoiceTotals::from_summaries(&sales),
            expenses: ExpenseTotals::from_expenses(&expenses),
            payments: PaymentTotals::from_payments(&payments),
        };

        metrics::histogram!("statistics_duration_seconds").record(start.elapsed().as_secs_f64());
        tracing::debug!(
            purchase_invoices = statistics.purchase_invoices.total_invoices,
            sale_invoices = statistics.sale_invoices.total_invoices,
            payments = statistics.payments.total_payments,
            "statistics computed"
        );
        Ok(statistics)
    }
}
