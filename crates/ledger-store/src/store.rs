use async_trait::async_trait;
use common::{
    ExpenseId, InvoiceId, InvoiceKind, ItemId, OwnerId, PaymentId, ProductId, SupplierId,
};

use crate::{
    Expense, ExpenseChanges, Invoice, InvoiceChanges, InvoiceQuery, InvoiceSummary, ItemValues,
    ListQuery, NewExpense, NewInvoice, NewPayment, NewProduct, NewSupplier, Page, Payment,
    PaymentQuery, Product, ProductChanges, Result, Supplier, SupplierChanges,
};

/// A unit of work against the ledger.
///
/// Every write made through a transaction becomes visible only after
/// [`commit`](LedgerTransaction::commit). Dropping a transaction without
/// committing discards all of its writes.
///
/// All lookups and mutations are scoped to the owner passed in; a row that
/// belongs to another owner behaves exactly like a missing row.
#[async_trait]
pub trait LedgerTransaction: Send + Sized {
    /// Loads an invoice with its items, locking it for the rest of the transaction.
    async fn find_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<Option<Invoice>>;

    /// Inserts an invoice header. Fails with `NotFound` when the supplier does not exist.
    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> Result<InvoiceId>;

    /// Overwrites the header columns that are set in `changes` and bumps `updated_at`.
    async fn update_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
        changes: &InvoiceChanges,
    ) -> Result<()>;

    /// Deletes an invoice and its items, clearing the link on any payments.
    async fn delete_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<()>;

    /// Appends a line item. Fails with `NotFound` when the product does not exist.
    async fn insert_item(
        &mut self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        values: &ItemValues,
    ) -> Result<ItemId>;

    async fn update_item(
        &mut self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        item_id: ItemId,
        values: &ItemValues,
    ) -> Result<()>;

    async fn delete_item(&mut self, invoice_id: InvoiceId, item_id: ItemId) -> Result<()>;

    /// Adds `delta` to a product's stock and returns the new level.
    ///
    /// The adjustment is a guarded compare-and-set: if the result would be
    /// negative the stock is left unchanged and `InsufficientStock` is returned.
    async fn adjust_stock(
        &mut self,
        owner_id: OwnerId,
        product_id: ProductId,
        delta: i64,
    ) -> Result<i64>;

    /// Appends an entry to the payment ledger.
    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Persistence provider for the invoice ledger.
///
/// Implementations must be thread-safe (Send + Sync). Reads go straight to the
/// backing store; writes that must be atomic go through [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Transaction: LedgerTransaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    async fn get_invoice(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<Option<Invoice>>;

    async fn list_invoices(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        query: &InvoiceQuery,
    ) -> Result<Page<Invoice>>;

    async fn create_product(&self, product: &NewProduct) -> Result<Product>;

    async fn get_product(&self, owner_id: OwnerId, id: ProductId) -> Result<Option<Product>>;

    /// Fetches the listed products that exist for this owner; missing ids are skipped.
    async fn get_products(&self, owner_id: OwnerId, ids: &[ProductId]) -> Result<Vec<Product>>;

    async fn list_products(&self, owner_id: OwnerId, query: &ListQuery) -> Result<Page<Product>>;

    /// Overwrites the columns set in `changes`. Fails with `Conflict` when the
    /// new code is taken.
    async fn update_product(
        &self,
        owner_id: OwnerId,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product>;

    /// Deletes a product. Fails with `InUse` while any invoice item refers to it.
    async fn delete_product(&self, owner_id: OwnerId, id: ProductId) -> Result<()>;

    async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier>;

    async fn get_supplier(&self, owner_id: OwnerId, id: SupplierId) -> Result<Option<Supplier>>;

    async fn list_suppliers(&self, owner_id: OwnerId, query: &ListQuery)
    -> Result<Page<Supplier>>;

    async fn count_suppliers(&self, owner_id: OwnerId) -> Result<u64>;

    /// Overwrites the columns set in `changes`. Fails with `Conflict` when the
    /// new name is taken.
    async fn update_supplier(
        &self,
        owner_id: OwnerId,
        id: SupplierId,
        changes: &SupplierChanges,
    ) -> Result<Supplier>;

    /// Deletes a supplier and all of its purchase invoices in one transaction.
    ///
    /// Stock is left as it is; payments recorded against the removed invoices
    /// stay on the ledger with their link cleared. Returns the number of
    /// invoices removed.
    async fn delete_supplier(&self, owner_id: OwnerId, id: SupplierId) -> Result<u64>;

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense>;

    async fn get_expense(&self, owner_id: OwnerId, id: ExpenseId) -> Result<Option<Expense>>;

    async fn list_expenses(&self, owner_id: OwnerId, query: &ListQuery) -> Result<Page<Expense>>;

    async fn update_expense(
        &self,
        owner_id: OwnerId,
        id: ExpenseId,
        changes: &ExpenseChanges,
    ) -> Result<Expense>;

    async fn delete_expense(&self, owner_id: OwnerId, id: ExpenseId) -> Result<()>;

    /// Every expense of the owner, newest first.
    async fn all_expenses(&self, owner_id: OwnerId) -> Result<Vec<Expense>>;

    async fn get_payment(&self, owner_id: OwnerId, id: PaymentId) -> Result<Option<Payment>>;

    async fn list_payments(&self, owner_id: OwnerId, query: &PaymentQuery)
    -> Result<Page<Payment>>;

    /// Every payment of the owner, newest first.
    async fn all_payments(&self, owner_id: OwnerId) -> Result<Vec<Payment>>;

    async fn invoice_summaries(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
    ) -> Result<Vec<InvoiceSummary>>;

    /// Releases the backing resources. Further calls may fail.
    async fn close(&self);
}
