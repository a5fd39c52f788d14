//! Purchase and sale invoice endpoints.
//!
//! Both kinds share the same handlers; the router for each kind carries its
//! [`InvoiceKind`] as a request extension.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json, Router, routing};
use chrono::{DateTime, Utc};
use common::{InvoiceId, InvoiceKind, ItemId, Money, ProductId, SupplierId};
use domain::{CreateInvoice, ItemInput, UpdateInvoice, ValidationErrors};
use ledger_store::{
    DEFAULT_PAGE_SIZE, Invoice, InvoiceQuery, InvoiceSortField, LedgerStore, LineItem, SortOrder,
};
use serde::{Deserialize, Serialize};

use super::{PageResponse, amount, optional_amount};
use crate::error::ApiError;
use crate::extract::Owner;
use crate::state::AppState;

/// Routes for one invoice kind, mounted at `base`.
pub fn router<S: LedgerStore + 'static>(
    base: &str,
    kind: InvoiceKind,
) -> Router<Arc<AppState<S>>> {
    Router::new()
        .route(base, routing::get(list::<S>).post(create::<S>))
        .route(
            &format!("{base}/{{id}}"),
            routing::get(get::<S>).put(update::<S>).delete(delete::<S>),
        )
        .layer(Extension(kind))
}

// -- Request types --

/// A line item. Purchases carry `cost_cents`, sales `price_cents`; when
/// `total_cents` is omitted it is derived from quantity and unit amount.
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub id: Option<String>,
    pub product_id: String,
    #[serde(default)]
    pub quantity: i64,
    pub cost_cents: Option<i64>,
    pub price_cents: Option<i64>,
    pub total_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub date: Option<DateTime<Utc>>,
    pub supplier_id: Option<String>,
    pub customer_name: Option<String>,
    /// Defaults to the sum of the item totals.
    pub subtotal_cents: Option<i64>,
    #[serde(default)]
    pub tax_cents: i64,
    /// Defaults to subtotal plus tax.
    pub total_cents: Option<i64>,
    #[serde(default)]
    pub paid_cents: i64,
    pub remaining_cents: Option<i64>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub date: Option<DateTime<Utc>>,
    pub supplier_id: Option<String>,
    pub customer_name: Option<String>,
    pub subtotal_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub total_cents: Option<i64>,
    pub paid_cents: Option<i64>,
    pub remaining_cents: Option<i64>,
    pub notes: Option<String>,
    pub items: Option<Vec<ItemRequest>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListParams {
    pub search: Option<String>,
    pub supplier_id: Option<SupplierId>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outstanding: bool,
    pub sort_by: Option<InvoiceSortField>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub kind: InvoiceKind,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<SupplierId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub notes: Option<String>,
    pub items: Vec<ItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: ItemId,
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    pub total_cents: i64,
}

impl ItemResponse {
    fn new(kind: InvoiceKind, item: LineItem) -> Self {
        let unit = item.unit_amount.cents();
        let (cost_cents, price_cents) = match kind {
            InvoiceKind::Purchase => (Some(unit), None),
            InvoiceKind::Sale => (None, Some(unit)),
        };
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            cost_cents,
            price_cents,
            total_cents: item.total.cents(),
        }
    }
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        let kind = invoice.kind;
        Self {
            id: invoice.id,
            kind,
            date: invoice.date,
            supplier_id: invoice.counterpart.supplier_id(),
            supplier_name: invoice.supplier_name,
            customer_name: invoice.counterpart.customer_name().map(String::from),
            subtotal_cents: invoice.subtotal.cents(),
            tax_cents: invoice.tax.cents(),
            total_cents: invoice.total.cents(),
            paid_cents: invoice.paid.cents(),
            remaining_cents: invoice.remaining.cents(),
            notes: invoice.notes,
            items: invoice
                .items
                .into_iter()
                .map(|item| ItemResponse::new(kind, item))
                .collect(),
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

// -- Request conversion --

fn parse_supplier(raw: Option<&str>, errors: &mut ValidationErrors) -> Option<SupplierId> {
    match raw.map(|s| SupplierId::parse(s.trim())) {
        Some(Ok(id)) => Some(id),
        Some(Err(_)) => {
            errors.add("supplier_id", "Invalid supplier id");
            None
        }
        None => None,
    }
}

fn item_inputs(
    kind: InvoiceKind,
    items: Vec<ItemRequest>,
    errors: &mut ValidationErrors,
) -> Vec<ItemInput> {
    let mut inputs = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let id = item
            .id
            .as_deref()
            .map(ItemId::parse)
            .transpose()
            .unwrap_or_else(|_| {
                errors.add(format!("items[{i}].id"), "Invalid item id");
                None
            });
        let Ok(product_id) = ProductId::parse(&item.product_id) else {
            errors.add(format!("items[{i}].product_id"), "Invalid product id");
            continue;
        };

        let (unit_field, unit_cents) = match kind {
            InvoiceKind::Purchase => ("cost", item.cost_cents),
            InvoiceKind::Sale => ("price", item.price_cents),
        };
        let unit_amount = amount(
            format!("items[{i}].{unit_field}"),
            unit_cents.unwrap_or(0),
            errors,
        );
        // Out-of-range quantities become 0 so validation reports them.
        let quantity = u32::try_from(item.quantity).unwrap_or(0);

        let total_field = format!("items[{i}].total");
        let total = match item.total_cents {
            Some(cents) => amount(total_field, cents, errors),
            None => unit_amount.checked_multiply(quantity).unwrap_or_else(|| {
                errors.add(total_field, "Item total is out of range");
                Money::zero()
            }),
        };

        inputs.push(ItemInput {
            id,
            product_id,
            quantity,
            unit_amount,
            total,
        });
    }
    inputs
}

impl CreateInvoiceRequest {
    pub fn into_input(self, kind: InvoiceKind) -> Result<CreateInvoice, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let supplier_id = parse_supplier(self.supplier_id.as_deref(), &mut errors);
        let items = item_inputs(kind, self.items, &mut errors);
        let tax = amount("tax", self.tax_cents, &mut errors);
        let paid = amount("paid", self.paid_cents, &mut errors);
        let remaining = optional_amount("remaining", self.remaining_cents, &mut errors);
        let subtotal = match self.subtotal_cents {
            Some(cents) => amount("subtotal", cents, &mut errors),
            None => Money::checked_sum(items.iter().map(|item| item.total)).unwrap_or_else(|| {
                errors.add("subtotal", "Sum of item totals is out of range");
                Money::zero()
            }),
        };
        let total = match self.total_cents {
            Some(cents) => amount("total", cents, &mut errors),
            None => subtotal.checked_add(tax).unwrap_or_else(|| {
                errors.add("total", "Subtotal plus tax is out of range");
                Money::zero()
            }),
        };
        errors.into_result()?;

        Ok(CreateInvoice {
            date: self.date,
            supplier_id,
            customer_name: self.customer_name,
            subtotal,
            tax,
            total,
            paid,
            remaining,
            notes: self.notes,
            items,
        })
    }
}

impl UpdateInvoiceRequest {
    pub fn into_input(self, kind: InvoiceKind) -> Result<UpdateInvoice, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let supplier_id = parse_supplier(self.supplier_id.as_deref(), &mut errors);
        let items = self
            .items
            .map(|items| item_inputs(kind, items, &mut errors));
        let subtotal = optional_amount("subtotal", self.subtotal_cents, &mut errors);
        let tax = optional_amount("tax", self.tax_cents, &mut errors);
        let total = optional_amount("total", self.total_cents, &mut errors);
        let paid = optional_amount("paid", self.paid_cents, &mut errors);
        let remaining = optional_amount("remaining", self.remaining_cents, &mut errors);
        errors.into_result()?;

        Ok(UpdateInvoice {
            date: self.date,
            supplier_id,
            customer_name: self.customer_name,
            subtotal,
            tax,
            total,
            paid,
            remaining,
            notes: self.notes,
            items,
        })
    }
}

impl InvoiceListParams {
    pub fn into_query(self) -> InvoiceQuery {
        let mut query = InvoiceQuery::new()
            .sort(
                self.sort_by.unwrap_or_default(),
                self.sort_order.unwrap_or_default(),
            )
            .page(
                self.page.unwrap_or(1),
                self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            );
        if let Some(search) = self.search {
            query = query.search(search);
        }
        if let Some(supplier_id) = self.supplier_id {
            query = query.supplier(supplier_id);
        }
        if let Some(from) = self.date_from {
            query = query.date_from(from);
        }
        if let Some(to) = self.date_to {
            query = query.date_to(to);
        }
        if self.outstanding {
            query = query.outstanding_only();
        }
        query
    }
}

// -- Handlers --

/// POST /{kind}-invoices
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: LedgerStore + 'static>(
    Extension(kind): Extension<InvoiceKind>,
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    payload: Result<Json<CreateInvoiceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let Json(req) = payload?;
    let input = req.into_input(kind)?;
    let invoice = state
        .invoices
        .create_invoice(owner_id, kind, input)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice.into())))
}

/// GET /{kind}-invoices/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: LedgerStore + 'static>(
    Extension(kind): Extension<InvoiceKind>,
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<InvoiceId>, PathRejection>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let Path(invoice_id) = path?;
    let invoice = state
        .invoices
        .get_invoice(owner_id, kind, invoice_id)
        .await?;
    Ok(Json(invoice.into()))
}

/// GET /{kind}-invoices
#[tracing::instrument(skip(state))]
pub async fn list<S: LedgerStore + 'static>(
    Extension(kind): Extension<InvoiceKind>,
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    params: Result<Query<InvoiceListParams>, QueryRejection>,
) -> Result<Json<PageResponse<InvoiceResponse>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .invoices
        .list_invoices(owner_id, kind, &params.into_query())
        .await?;
    Ok(Json(PageResponse::from_page(page, InvoiceResponse::from)))
}

/// PUT /{kind}-invoices/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: LedgerStore + 'static>(
    Extension(kind): Extension<InvoiceKind>,
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<InvoiceId>, PathRejection>,
    payload: Result<Json<UpdateInvoiceRequest>, JsonRejection>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let Path(invoice_id) = path?;
    let Json(req) = payload?;
    let input = req.into_input(kind)?;
    let invoice = state
        .invoices
        .update_invoice(owner_id, kind, invoice_id, input)
        .await?;
    Ok(Json(invoice.into()))
}

/// DELETE /{kind}-invoices/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: LedgerStore + 'static>(
    Extension(kind): Extension<InvoiceKind>,
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<InvoiceId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(invoice_id) = path?;
    state
        .invoices
        .delete_invoice(owner_id, kind, invoice_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
