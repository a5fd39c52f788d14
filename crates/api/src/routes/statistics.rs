//! Dashboard statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::Money;
use ledger_store::LedgerStore;
use serde::Serialize;
use statistics::{ExpenseTotals, InvoiceTotals, PaymentTotals, Statistics};

use super::payments::PaymentResponse;
use crate::error::ApiError;
use crate::extract::Owner;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InvoiceTotalsResponse {
    pub total_invoices: u64,
    pub total_amount_cents: i64,
    pub total_paid_cents: i64,
    pub total_remaining_cents: i64,
}

impl From<InvoiceTotals> for InvoiceTotalsResponse {
    fn from(totals: InvoiceTotals) -> Self {
        Self {
            total_invoices: totals.total_invoices,
            total_amount_cents: totals.total_amount.cents(),
            total_paid_cents: totals.total_paid.cents(),
            total_remaining_cents: totals.total_remaining.cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpenseTotalsResponse {
    pub total_expenses: u64,
    pub total_amount_cents: i64,
    pub by_category_cents: BTreeMap<String, i64>,
}

impl From<ExpenseTotals> for ExpenseTotalsResponse {
    fn from(totals: ExpenseTotals) -> Self {
        Self {
            total_expenses: totals.total_expenses,
            total_amount_cents: totals.total_amount.cents(),
            by_category_cents: in_cents(totals.by_category),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentTotalsResponse {
    pub total_payments: u64,
    pub total_amount_cents: i64,
    pub by_type_cents: BTreeMap<String, i64>,
    pub recent: Vec<PaymentResponse>,
}

impl From<PaymentTotals> for PaymentTotalsResponse {
    fn from(totals: PaymentTotals) -> Self {
        Self {
            total_payments: totals.total_payments,
            total_amount_cents: totals.total_amount.cents(),
            by_type_cents: in_cents(totals.by_type),
            recent: totals.recent.into_iter().map(PaymentResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub suppliers_count: u64,
    pub purchase_invoices: InvoiceTotalsResponse,
    pub sale_invoices: InvoiceTotalsResponse,
    pub expenses: ExpenseTotalsResponse,
    pub payments: PaymentTotalsResponse,
}

impl From<Statistics> for StatisticsResponse {
    fn from(stats: Statistics) -> Self {
        Self {
            suppliers_count: stats.suppliers_count,
            purchase_invoices: stats.purchase_invoices.into(),
            sale_invoices: stats.sale_invoices.into(),
            expenses: stats.expenses.into(),
            payments: stats.payments.into(),
        }
    }
}

fn in_cents(amounts: BTreeMap<String, Money>) -> BTreeMap<String, i64> {
    amounts
        .into_iter()
        .map(|(key, amount)| (key, amount.cents()))
        .collect()
}

/// GET /statistics
#[tracing::instrument(skip(state))]
pub async fn get<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let stats = state.statistics.statistics(owner_id).await?;
    Ok(Json(stats.into()))
}
