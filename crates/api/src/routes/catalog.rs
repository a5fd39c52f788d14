//! Product, supplier and expense endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ExpenseId, ProductId, SupplierId};
use domain::{
    CreateExpense, CreateProduct, CreateSupplier, UpdateExpense, UpdateProduct, UpdateSupplier,
    ValidationErrors,
};
use ledger_store::{Expense, LedgerStore, Product, Supplier};
use serde::{Deserialize, Serialize};

use super::{ListParams, PageResponse, amount, optional_amount};
use crate::error::ApiError;
use crate::extract::Owner;
use crate::state::AppState;

// -- Products --

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub code: Option<String>,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub sale_price_cents: i64,
    #[serde(default)]
    pub stock: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub cost_cents: Option<i64>,
    pub price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub stock: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub code: Option<String>,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub sale_price_cents: i64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            code: product.code,
            cost_cents: product.cost.cents(),
            price_cents: product.price.cents(),
            sale_price_cents: product.sale_price.cents(),
            stock: product.stock,
            created_at: product.created_at,
        }
    }
}

/// POST /products
#[tracing::instrument(skip(state, payload))]
pub async fn create_product<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let Json(req) = payload?;
    let mut errors = ValidationErrors::new();
    let input = CreateProduct {
        name: req.name,
        code: req.code,
        cost: amount("cost", req.cost_cents, &mut errors),
        price: amount("price", req.price_cents, &mut errors),
        sale_price: amount("sale_price", req.sale_price_cents, &mut errors),
        stock: req.stock,
    };
    errors.into_result()?;
    let product = state.catalog.create_product(owner_id, input).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get_product<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<ProductId>, PathRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Path(product_id) = path?;
    let product = state.catalog.get_product(owner_id, product_id).await?;
    Ok(Json(product.into()))
}

/// GET /products
#[tracing::instrument(skip(state))]
pub async fn list_products<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<PageResponse<ProductResponse>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .catalog
        .list_products(owner_id, &params.into_query())
        .await?;
    Ok(Json(PageResponse::from_page(page, ProductResponse::from)))
}

/// PUT /products/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update_product<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<ProductId>, PathRejection>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Path(product_id) = path?;
    let Json(req) = payload?;
    let mut errors = ValidationErrors::new();
    let input = UpdateProduct {
        name: req.name,
        code: req.code,
        cost: optional_amount("cost", req.cost_cents, &mut errors),
        price: optional_amount("price", req.price_cents, &mut errors),
        sale_price: optional_amount("sale_price", req.sale_price_cents, &mut errors),
        stock: req.stock,
    };
    errors.into_result()?;
    let product = state
        .catalog
        .update_product(owner_id, product_id, input)
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete_product<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<ProductId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(product_id) = path?;
    state.catalog.delete_product(owner_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Suppliers --

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSupplierRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SupplierResponse {
    pub id: SupplierId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Supplier> for SupplierResponse {
    fn from(supplier: Supplier) -> Self {
        Self {
            id: supplier.id,
            name: supplier.name,
            phone: supplier.phone,
            email: supplier.email,
            address: supplier.address,
            city: supplier.city,
            company_name: supplier.company_name,
            notes: supplier.notes,
            created_at: supplier.created_at,
        }
    }
}

/// POST /suppliers
#[tracing::instrument(skip(state, payload))]
pub async fn create_supplier<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    payload: Result<Json<CreateSupplierRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SupplierResponse>), ApiError> {
    let Json(req) = payload?;
    let supplier = state
        .catalog
        .create_supplier(
            owner_id,
            CreateSupplier {
                name: req.name,
                phone: req.phone,
                email: req.email,
                address: req.address,
                city: req.city,
                company_name: req.company_name,
                notes: req.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(supplier.into())))
}

/// GET /suppliers/{id}
#[tracing::instrument(skip(state))]
pub async fn get_supplier<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<SupplierId>, PathRejection>,
) -> Result<Json<SupplierResponse>, ApiError> {
    let Path(supplier_id) = path?;
    let supplier = state.catalog.get_supplier(owner_id, supplier_id).await?;
    Ok(Json(supplier.into()))
}

/// GET /suppliers
#[tracing::instrument(skip(state))]
pub async fn list_suppliers<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<PageResponse<SupplierResponse>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .catalog
        .list_suppliers(owner_id, &params.into_query())
        .await?;
    Ok(Json(PageResponse::from_page(page, SupplierResponse::from)))
}

/// PUT /suppliers/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update_supplier<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<SupplierId>, PathRejection>,
    payload: Result<Json<UpdateSupplierRequest>, JsonRejection>,
) -> Result<Json<SupplierResponse>, ApiError> {
    let Path(supplier_id) = path?;
    let Json(req) = payload?;
    let supplier = state
        .catalog
        .update_supplier(
            owner_id,
            supplier_id,
            UpdateSupplier {
                name: req.name,
                phone: req.phone,
                email: req.email,
                address: req.address,
                city: req.city,
                company_name: req.company_name,
                notes: req.notes,
            },
        )
        .await?;
    Ok(Json(supplier.into()))
}

#[derive(Debug, Serialize)]
pub struct DeleteSupplierResponse {
    /// Purchase invoices removed along with the supplier.
    pub invoices_deleted: u64,
}

/// DELETE /suppliers/{id}
#[tracing::instrument(skip(state))]
pub async fn delete_supplier<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<SupplierId>, PathRejection>,
) -> Result<Json<DeleteSupplierResponse>, ApiError> {
    let Path(supplier_id) = path?;
    let invoices_deleted = state.catalog.delete_supplier(owner_id, supplier_id).await?;
    Ok(Json(DeleteSupplierResponse { invoices_deleted }))
}

// -- Expenses --

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub name: String,
    pub category: String,
    pub amount_cents: i64,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub amount_cents: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    pub id: ExpenseId,
    pub name: String,
    pub category: String,
    pub amount_cents: i64,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Expense> for ExpenseResponse {
    fn from(expense: Expense) -> Self {
        Self {
            id: expense.id,
            name: expense.name,
            category: expense.category,
            amount_cents: expense.amount.cents(),
            date: expense.date,
            notes: expense.notes,
            created_at: expense.created_at,
        }
    }
}

/// POST /expenses
#[tracing::instrument(skip(state, payload))]
pub async fn create_expense<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    payload: Result<Json<CreateExpenseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExpenseResponse>), ApiError> {
    let Json(req) = payload?;
    let mut errors = ValidationErrors::new();
    let input = CreateExpense {
        name: req.name,
        category: req.category,
        amount: amount("amount", req.amount_cents, &mut errors),
        date: req.date,
        notes: req.notes,
    };
    errors.into_result()?;
    let expense = state.catalog.create_expense(owner_id, input).await?;
    Ok((StatusCode::CREATED, Json(expense.into())))
}

/// GET /expenses/{id}
#[tracing::instrument(skip(state))]
pub async fn get_expense<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<ExpenseId>, PathRejection>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    let Path(expense_id) = path?;
    let expense = state.catalog.get_expense(owner_id, expense_id).await?;
    Ok(Json(expense.into()))
}

/// PUT /expenses/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update_expense<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<ExpenseId>, PathRejection>,
    payload: Result<Json<UpdateExpenseRequest>, JsonRejection>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    let Path(expense_id) = path?;
    let Json(req) = payload?;
    let mut errors = ValidationErrors::new();
    let input = UpdateExpense {
        name: req.name,
        category: req.category,
        amount: optional_amount("amount", req.amount_cents, &mut errors),
        date: req.date,
        notes: req.notes,
    };
    errors.into_result()?;
    let expense = state
        .catalog
        .update_expense(owner_id, expense_id, input)
        .await?;
    Ok(Json(expense.into()))
}

/// DELETE /expenses/{id}
#[tracing::instrument(skip(state))]
pub async fn delete_expense<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    path: Result<Path<ExpenseId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(expense_id) = path?;
    state.catalog.delete_expense(owner_id, expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /expenses
#[tracing::instrument(skip(state))]
pub async fn list_expenses<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<PageResponse<ExpenseResponse>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .catalog
        .list_expenses(owner_id, &params.into_query())
        .await?;
    Ok(Json(PageResponse::from_page(page, ExpenseResponse::from)))
}
