//! HTTP API server for the invoice ledger.
//!
//! Exposes purchase and sale invoices, the catalog they refer to, the payment
//! ledger and dashboard statistics as owner-scoped REST endpoints, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::InvoiceKind;
use ledger_store::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: LedgerStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .merge(routes::invoices::router::<S>(
            "/purchase-invoices",
            InvoiceKind::Purchase,
        ))
        .merge(routes::invoices::router::<S>(
            "/sale-invoices",
            InvoiceKind::Sale,
        ))
        .route(
            "/products",
            get(routes::catalog::list_products::<S>).post(routes::catalog::create_product::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::catalog::get_product::<S>)
                .put(routes::catalog::update_product::<S>)
                .delete(routes::catalog::delete_product::<S>),
        )
        .route(
            "/suppliers",
            get(routes::catalog::list_suppliers::<S>).post(routes::catalog::create_supplier::<S>),
        )
        .route(
            "/suppliers/{id}",
            get(routes::catalog::get_supplier::<S>)
                .put(routes::catalog::update_supplier::<S>)
                .delete(routes::catalog::delete_supplier::<S>),
        )
        .route(
            "/expenses",
            get(routes::catalog::list_expenses::<S>).post(routes::catalog::create_expense::<S>),
        )
        .route(
            "/expenses/{id}",
            get(routes::catalog::get_expense::<S>)
                .put(routes::catalog::update_expense::<S>)
                .delete(routes::catalog::delete_expense::<S>),
        )
        .route("/payments", get(routes::payments::list::<S>))
        .route("/payments/{id}", get(routes::payments::get::<S>))
        .route("/statistics", get(routes::statistics::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Registers help text for the metrics the ledger records.
pub fn describe_metrics() {
    metrics::describe_counter!("invoices_created_total", "Invoices created, by kind");
    metrics::describe_counter!("invoices_updated_total", "Invoices updated, by kind");
    metrics::describe_counter!("invoices_deleted_total", "Invoices deleted, by kind");
    metrics::describe_counter!(
        "invoice_transaction_failures_total",
        "Invoice transactions rolled back, by kind and operation"
    );
    metrics::describe_counter!(
        "payments_recorded_total",
        "Payment ledger entries written, by payment type"
    );
    metrics::describe_histogram!(
        "invoice_transaction_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent in invoice transactions, by kind and operation"
    );
    metrics::describe_histogram!(
        "statistics_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent computing dashboard statistics"
    );
}
