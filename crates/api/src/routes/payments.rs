//! Payment ledger reads.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::{InvoiceId, PaymentId, PaymentType};
use ledger_store::{DEFAULT_PAGE_SIZE, LedgerStore, Payment, PaymentQuery};
use serde::{Deserialize, Serialize};

use super::PageResponse;
use crate::error::ApiError;
use crate::extract::Owner;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListParams {
    #[serde(rename = "type")]
    pub payment_type: Option<PaymentType>,
    pub invoice_id: Option<InvoiceId>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PaymentListParams {
    pub fn into_query(self) -> PaymentQuery {
        let mut query = PaymentQuery::new().page(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(payment_type) = self.payment_type {
            query = query.payment_type(payment_type);
        }
        if let Some(invoice_id) = self.invoice_id {
            query = query.invoice(invoice_id);
        }
        query
    }
}

/// A ledger entry. `amount_cents` is negative for corrections.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub amount_cents: i64,
    pub payment_type: PaymentType,
    pub date: DateTime<Utc>,
    pub purchase_invoice_id: Option<InvoiceId>,
    pub sale_invoice_id: Option<InvoiceId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            amount_cents: payment.amount.cents(),
            payment_type: payment.payment_type,
            date: payment.date,
            purchase_invoice_id: payment.link.and_then(|l| l.purchase_invoice_id()),
            sale_invoice_id: payment.link.and_then(|l| l.sale_invoice_id()),
            notes: payment.notes,
            created_at: payment.created_at,
        }
    }
}

/// GET /payments
#[tracing::instrument(skip(state))]
pub async fn list<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    params: Result<Query<PaymentListParams>, QueryRejection>,
) -> Result<Json<PageResponse<PaymentResponse>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .catalog
        .list_payments(owner_id, &params.into_query())
        .await?;
    Ok(Json(PageResponse::from_page(page, PaymentResponse::from)))
}

/// GET /payments/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<PaymentId>, PathRejection>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let Path(payment_id) = path?;
    let payment = state.catalog.get_payment(owner_id, payment_id).await?;
    Ok(Json(payment.into()))
}
