//! Invoice service: the create/update/delete/read operations for both
//! invoice kinds.

use std::future::Future;
use std::time::{Duration, Instant};

use common::{InvoiceId, InvoiceKind, OwnerId, ProductId};
use ledger_store::{
    Invoice, InvoiceQuery, LedgerStore, LedgerTransaction, Page, StoreError,
};

use super::aggregate::{self, InvoiceDraft, InvoiceRevision};
use super::payload::{CreateInvoice, UpdateInvoice};
use super::reconciler::{self, StockDelta};
use crate::error::{DomainError, ValidationErrors};

/// Default upper bound on how long a write transaction may stay open.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// What deleting an invoice does to the stock its items moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Stock and payments are left as they are.
    #[default]
    RetainEffects,
    /// The stock movement of every item is undone in the same transaction.
    ReverseStock,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletePolicy::RetainEffects => "retain",
            DeletePolicy::ReverseStock => "reverse-stock",
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(DeletePolicy::RetainEffects),
            "reverse-stock" | "reverse_stock" => Ok(DeletePolicy::ReverseStock),
            other => Err(format!("unknown delete policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceServiceConfig {
    pub transaction_timeout: Duration,
    pub delete_policy: DeletePolicy,
}

impl Default for InvoiceServiceConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            delete_policy: DeletePolicy::default(),
        }
    }
}

fn invoice_entity(kind: InvoiceKind) -> &'static str {
    match kind {
        InvoiceKind::Purchase => "Purchase invoice",
        InvoiceKind::Sale => "Sale invoice",
    }
}

/// Service for purchase and sale invoices.
///
/// Every write runs as one transaction on the injected store: the invoice
/// header, its items, the stock movements and the payment entry are committed
/// together or not at all.
#[derive(Clone)]
pub struct InvoiceService<S: LedgerStore> {
    store: S,
    config: InvoiceServiceConfig,
}

impl<S: LedgerStore> InvoiceService<S> {
    /// Creates a service with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, InvoiceServiceConfig::default())
    }

    pub fn with_config(store: S, config: InvoiceServiceConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &InvoiceServiceConfig {
        &self.config
    }

    /// Creates an invoice with its items, moves stock and records the initial payment.
    #[tracing::instrument(skip_all, fields(owner_id = %owner_id, kind = %kind))]
    pub async fn create_invoice(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        input: CreateInvoice,
    ) -> Result<Invoice, DomainError> {
        let draft = InvoiceDraft::new(owner_id, kind, input).map_err(|errors| {
            tracing::warn!(%errors, "invoice rejected");
            DomainError::from(errors)
        })?;

        if kind == InvoiceKind::Sale {
            let products: Vec<ProductId> = draft.items().iter().map(|i| i.product_id).collect();
            self.check_stock(owner_id, &draft.stock_deltas(), &products)
                .await?;
        }

        let start = Instant::now();
        let result = self
            .within_timeout(async {
                let mut tx = self.store.begin().await?;
                let invoice_id = draft.persist(&mut tx).await?;
                tx.commit().await?;
                Ok::<_, DomainError>(invoice_id)
            })
            .await;
        record_duration(kind, "create", start);

        let invoice_id = result.map_err(|e| self.transaction_failed(kind, "create", e))?;

        metrics::counter!("invoices_created_total", "kind" => kind.as_str()).increment(1);
        if draft.payment_amount().is_some() {
            record_payment(kind);
        }
        tracing::info!(
            invoice_id = %invoice_id,
            items = draft.items().len(),
            total = %draft.header().total,
            "invoice created"
        );

        self.get_invoice(owner_id, kind, invoice_id).await
    }

    /// Applies a partial update: header fields that were sent, the item
    /// replacement with its stock movements, and the payment delta.
    #[tracing::instrument(skip_all, fields(owner_id = %owner_id, kind = %kind, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        invoice_id: InvoiceId,
        input: UpdateInvoice,
    ) -> Result<Invoice, DomainError> {
        let existing = self.get_invoice(owner_id, kind, invoice_id).await?;
        let revision = InvoiceRevision::plan(&existing, &input).map_err(|errors| {
            tracing::warn!(%errors, "invoice update rejected");
            DomainError::from(errors)
        })?;

        if kind == InvoiceKind::Sale
            && let Some(ref items) = input.items
        {
            let products: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
            self.check_stock(owner_id, revision.stock_deltas(), &products)
                .await?;
        }

        let start = Instant::now();
        let result = self
            .within_timeout(async {
                let mut tx = self.store.begin().await?;
                // Plan again against the locked row in case it changed since the read.
                let current = tx
                    .find_invoice(owner_id, kind, invoice_id)
                    .await?
                    .ok_or_else(|| StoreError::not_found("Invoice", invoice_id))?;
                let revision = InvoiceRevision::plan(&current, &input)?;
                revision.persist(&mut tx).await?;
                tx.commit().await?;
                Ok::<_, DomainError>(revision.payment_delta())
            })
            .await;
        record_duration(kind, "update", start);

        let payment_delta = result.map_err(|e| self.transaction_failed(kind, "update", e))?;

        metrics::counter!("invoices_updated_total", "kind" => kind.as_str()).increment(1);
        if !payment_delta.is_zero() {
            record_payment(kind);
        }
        tracing::info!(payment_delta = %payment_delta, "invoice updated");

        self.get_invoice(owner_id, kind, invoice_id).await
    }

    /// Deletes an invoice and its items. Payments stay on the ledger with
    /// their link cleared; stock follows the configured [`DeletePolicy`].
    #[tracing::instrument(skip_all, fields(owner_id = %owner_id, kind = %kind, invoice_id = %invoice_id))]
    pub async fn delete_invoice(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        invoice_id: InvoiceId,
    ) -> Result<(), DomainError> {
        let policy = self.config.delete_policy;

        let start = Instant::now();
        let result = self
            .within_timeout(async {
                let mut tx = self.store.begin().await?;
                let invoice = tx
                    .find_invoice(owner_id, kind, invoice_id)
                    .await?
                    .ok_or_else(|| StoreError::not_found("Invoice", invoice_id))?;
                if policy == DeletePolicy::ReverseStock {
                    let deltas = reconciler::reversal_deltas(kind, &invoice.items);
                    aggregate::apply_stock(&mut tx, owner_id, &deltas).await?;
                }
                tx.delete_invoice(owner_id, kind, invoice_id).await?;
                tx.commit().await?;
                Ok::<_, DomainError>(())
            })
            .await;
        record_duration(kind, "delete", start);

        result.map_err(|e| self.transaction_failed(kind, "delete", e))?;

        metrics::counter!("invoices_deleted_total", "kind" => kind.as_str()).increment(1);
        tracing::info!(policy = %policy, "invoice deleted");
        Ok(())
    }

    /// Loads an invoice with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_invoice(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, DomainError> {
        self.store
            .get_invoice(owner_id, kind, invoice_id)
            .await?
            .ok_or_else(|| DomainError::not_found(invoice_entity(kind), invoice_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        query: &InvoiceQuery,
    ) -> Result<Page<Invoice>, DomainError> {
        Ok(self.store.list_invoices(owner_id, kind, query).await?)
    }

    /// Rejects sale items whose net stock consumption exceeds what is on hand.
    ///
    /// `item_products` lists the product of each requested item so the error
    /// can point at the first item that draws on an exhausted product. Missing
    /// products are left for the transaction to report.
    async fn check_stock(
        &self,
        owner_id: OwnerId,
        deltas: &[StockDelta],
        item_products: &[ProductId],
    ) -> Result<(), DomainError> {
        let consumed: Vec<(ProductId, i64)> = reconciler::net_by_product(deltas)
            .into_iter()
            .filter(|(_, net)| *net < 0)
            .collect();
        if consumed.is_empty() {
            return Ok(());
        }

        let ids: Vec<ProductId> = consumed.iter().map(|(id, _)| *id).collect();
        let products = self.store.get_products(owner_id, &ids).await?;

        let mut errors = ValidationErrors::new();
        for (product_id, net) in consumed {
            let Some(product) = products.iter().find(|p| p.id == product_id) else {
                continue;
            };
            if -net > product.stock {
                let index = item_products
                    .iter()
                    .position(|id| *id == product_id)
                    .unwrap_or_default();
                errors.add(
                    format!("items[{index}].quantity"),
                    "Quantity cannot exceed available stock",
                );
            }
        }

        errors.into_result().map_err(|errors| {
            tracing::warn!(%errors, "insufficient stock");
            DomainError::from(errors)
        })
    }

    async fn within_timeout<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        let limit = self.config.transaction_timeout;
        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(limit).into()),
        }
    }

    /// Classifies a failed write and records it.
    fn transaction_failed(
        &self,
        kind: InvoiceKind,
        operation: &'static str,
        err: DomainError,
    ) -> DomainError {
        let err = match err {
            DomainError::Store(source) => {
                DomainError::from_store(format!("{operation} {}", kind.label()), source)
            }
            other => other,
        };
        let err = match err {
            DomainError::NotFound { entity: "Invoice", id } => DomainError::NotFound {
                entity: invoice_entity(kind),
                id,
            },
            other => other,
        };

        metrics::counter!(
            "invoice_transaction_failures_total",
            "kind" => kind.as_str(),
            "operation" => operation
        )
        .increment(1);

        match err {
            DomainError::Transaction { .. } | DomainError::Store(_) => {
                tracing::error!(error = %err, "invoice transaction failed");
            }
            _ => tracing::warn!(error = %err, "invoice transaction rejected"),
        }
        err
    }
}

fn record_duration(kind: InvoiceKind, operation: &'static str, start: Instant) {
    metrics::histogram!(
        "invoice_transaction_duration_seconds",
        "kind" => kind.as_str(),
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64());
}

fn record_payment(kind: InvoiceKind) {
    metrics::counter!("payments_recorded_total", "type" => kind.payment_type().as_str())
        .increment(1);
}
