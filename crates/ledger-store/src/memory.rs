use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    ExpenseId, InvoiceId, InvoiceKind, ItemId, Money, OwnerId, PaymentId, ProductId, SupplierId,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    Counterpart, Expense, ExpenseChanges, Invoice, InvoiceChanges, InvoiceQuery,
    InvoiceSortField, InvoiceSummary, ItemValues, LineItem, ListQuery, NewExpense, NewInvoice,
    NewPayment, NewProduct, NewSupplier, Page, Payment, PaymentQuery, Product, ProductChanges,
    Result, SortOrder, StoreError, Supplier, SupplierChanges,
    store::{LedgerStore, LedgerTransaction},
};

#[derive(Debug, Clone)]
struct InvoiceRow {
    id: InvoiceId,
    owner_id: OwnerId,
    kind: InvoiceKind,
    date: DateTime<Utc>,
    counterpart: Counterpart,
    subtotal: Money,
    tax: Money,
    total: Money,
    paid: Money,
    remaining: Money,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ItemRow {
    id: ItemId,
    invoice_id: InvoiceId,
    values: ItemValues,
}

/// Every table, kept in insertion order.
#[derive(Debug, Clone, Default)]
struct LedgerState {
    products: Vec<Product>,
    suppliers: Vec<Supplier>,
    invoices: Vec<InvoiceRow>,
    items: Vec<ItemRow>,
    payments: Vec<Payment>,
    expenses: Vec<Expense>,
}

impl LedgerState {
    fn product(&self, owner_id: OwnerId, id: ProductId) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.id == id && p.owner_id == owner_id)
    }

    fn supplier(&self, owner_id: OwnerId, id: SupplierId) -> Option<&Supplier> {
        self.suppliers
            .iter()
            .find(|s| s.id == id && s.owner_id == owner_id)
    }

    fn invoice_index(&self, owner_id: OwnerId, kind: InvoiceKind, id: InvoiceId) -> Option<usize> {
        self.invoices
            .iter()
            .position(|i| i.id == id && i.owner_id == owner_id && i.kind == kind)
    }

    /// Removes an invoice and its items, clearing the link on its payments.
    fn remove_invoice(&mut self, idx: usize) {
        let id = self.invoices.remove(idx).id;
        self.items.retain(|item| item.invoice_id != id);
        for payment in &mut self.payments {
            if payment.link.is_some_and(|link| link.invoice_id() == id) {
                payment.link = None;
            }
        }
    }

    fn require_product(&self, owner_id: OwnerId, id: ProductId) -> Result<()> {
        match self.product(owner_id, id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("Product", id)),
        }
    }

    fn require_counterpart(&self, owner_id: OwnerId, counterpart: &Counterpart) -> Result<()> {
        if let Counterpart::Supplier(id) = counterpart
            && self.supplier(owner_id, *id).is_none()
        {
            return Err(StoreError::not_found("Supplier", id));
        }
        Ok(())
    }

    fn assemble(&self, row: &InvoiceRow) -> Invoice {
        let items = self
            .items
            .iter()
            .filter(|item| item.invoice_id == row.id)
            .map(|item| LineItem {
                id: item.id,
                invoice_id: item.invoice_id,
                product_id: item.values.product_id,
                product_name: self
                    .product(row.owner_id, item.values.product_id)
                    .map(|p| p.name.clone()),
                quantity: item.values.quantity,
                unit_amount: item.values.unit_amount,
                total: item.values.total,
            })
            .collect();

        let supplier_name = row
            .counterpart
            .supplier_id()
            .and_then(|id| self.supplier(row.owner_id, id))
            .map(|s| s.name.clone());

        Invoice {
            id: row.id,
            owner_id: row.owner_id,
            kind: row.kind,
            date: row.date,
            counterpart: row.counterpart.clone(),
            supplier_name,
            subtotal: row.subtotal,
            tax: row.tax,
            total: row.total,
            paid: row.paid,
            remaining: row.remaining,
            notes: row.notes.clone(),
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn matches_search(&self, row: &InvoiceRow, needle: &str) -> bool {
        let counterpart_name = match &row.counterpart {
            Counterpart::Supplier(id) => self.supplier(row.owner_id, *id).map(|s| s.name.as_str()),
            Counterpart::Customer(name) => Some(name.as_str()),
        };
        [row.notes.as_deref(), counterpart_name]
            .into_iter()
            .flatten()
            .any(|text| contains_ignore_case(text, needle))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Returns the rows newest-inserted first, so that a stable sort keeps the
/// latest insert ahead of older rows with an equal key.
fn newest_first<T: Clone>(rows: &[T], keep: impl Fn(&T) -> bool) -> Vec<T> {
    rows.iter().rev().filter(|row| keep(row)).cloned().collect()
}

/// In-memory ledger store for tests and database-less runs.
///
/// A transaction holds the write lock for its whole lifetime and works on a
/// private copy of the state, which replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    fail_on_payment_insert: Arc<AtomicBool>,
    write_delay_ms: Arc<AtomicU64>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent payment insert fail (for testing rollback).
    pub fn set_fail_on_payment_insert(&self, fail: bool) {
        self.fail_on_payment_insert.store(fail, Ordering::SeqCst);
    }

    /// Delays every transactional write (for testing transaction timeouts).
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Returns the number of invoices of every kind and owner.
    pub async fn invoice_count(&self) -> usize {
        self.state.read().await.invoices.len()
    }

    /// Returns the number of line items across all invoices.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// Returns the number of payment ledger entries.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    /// Clears all data.
    pub async fn clear(&self) {
        *self.state.write().await = LedgerState::default();
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.state.clone().write_owned().await;
        let working = (*guard).clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            fail_on_payment_insert: self.fail_on_payment_insert.load(Ordering::SeqCst),
            write_delay: Duration::from_millis(self.write_delay_ms.load(Ordering::SeqCst)),
        })
    }

    async fn get_invoice(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<Option<Invoice>> {
        let state = self.state.read().await;
        Ok(state
            .invoice_index(owner_id, kind, id)
            .map(|idx| state.assemble(&state.invoices[idx])))
    }

    async fn list_invoices(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        query: &InvoiceQuery,
    ) -> Result<Page<Invoice>> {
        let state = self.state.read().await;
        let mut rows = newest_first(&state.invoices, |row| {
            if row.owner_id != owner_id || row.kind != kind {
                return false;
            }
            if let Some(ref search) = query.search
                && !state.matches_search(row, search)
            {
                return false;
            }
            if let Some(supplier_id) = query.supplier_id
                && row.counterpart.supplier_id() != Some(supplier_id)
            {
                return false;
            }
            if let Some(from) = query.date_from
                && row.date < from
            {
                return false;
            }
            if let Some(to) = query.date_to
                && row.date > to
            {
                return false;
            }
            if query.outstanding_only && !row.remaining.is_positive() {
                return false;
            }
            true
        });

        rows.sort_by(|a, b| {
            let ordering = match query.sort_by {
                InvoiceSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                InvoiceSortField::Date => a.date.cmp(&b.date),
                InvoiceSortField::Total => a.total.cmp(&b.total),
                InvoiceSortField::Remaining => a.remaining.cmp(&b.remaining),
            };
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let page = Page::from_sorted(rows, query.paging);
        Ok(page.map(|row| state.assemble(&row)))
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        if let Some(ref code) = product.code
            && state
                .products
                .iter()
                .any(|p| p.owner_id == product.owner_id && p.code.as_ref() == Some(code))
        {
            return Err(StoreError::Conflict {
                field: "code".to_string(),
            });
        }

        let record = Product {
            id: ProductId::new(),
            owner_id: product.owner_id,
            name: product.name.clone(),
            code: product.code.clone(),
            cost: product.cost,
            price: product.price,
            sale_price: product.sale_price,
            stock: product.stock,
            created_at: Utc::now(),
        };
        state.products.push(record.clone());
        Ok(record)
    }

    async fn get_product(&self, owner_id: OwnerId, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.product(owner_id, id).cloned())
    }

    async fn get_products(&self, owner_id: OwnerId, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .filter(|p| p.owner_id == owner_id && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn list_products(&self, owner_id: OwnerId, query: &ListQuery) -> Result<Page<Product>> {
        let state = self.state.read().await;
        let rows = newest_first(&state.products, |p| {
            p.owner_id == owner_id
                && query.search.as_ref().is_none_or(|needle| {
                    contains_ignore_case(&p.name, needle)
                        || p.code
                            .as_deref()
                            .is_some_and(|code| contains_ignore_case(code, needle))
                })
        });
        Ok(Page::from_sorted(rows, query.paging))
    }

    async fn update_product(
        &self,
        owner_id: OwnerId,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product> {
        let mut state = self.state.write().await;
        let idx = state
            .products
            .iter()
            .position(|p| p.id == id && p.owner_id == owner_id)
            .ok_or_else(|| StoreError::not_found("Product", id))?;

        let mut product = state.products[idx].clone();
        changes.apply(&mut product);
        if let Some(ref code) = product.code
            && state
                .products
                .iter()
                .any(|p| p.id != id && p.owner_id == owner_id && p.code.as_ref() == Some(code))
        {
            return Err(StoreError::Conflict {
                field: "code".to_string(),
            });
        }

        state.products[idx] = product.clone();
        Ok(product)
    }

    async fn delete_product(&self, owner_id: OwnerId, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        let idx = state
            .products
            .iter()
            .position(|p| p.id == id && p.owner_id == owner_id)
            .ok_or_else(|| StoreError::not_found("Product", id))?;
        if state.items.iter().any(|item| item.values.product_id == id) {
            return Err(StoreError::InUse {
                entity: "Product",
                id: id.to_string(),
            });
        }
        state.products.remove(idx);
        Ok(())
    }

    async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier> {
        let mut state = self.state.write().await;
        if state
            .suppliers
            .iter()
            .any(|s| s.owner_id == supplier.owner_id && s.name == supplier.name)
        {
            return Err(StoreError::Conflict {
                field: "name".to_string(),
            });
        }

        let record = Supplier {
            id: SupplierId::new(),
            owner_id: supplier.owner_id,
            name: supplier.name.clone(),
            phone: supplier.phone.clone(),
            email: supplier.email.clone(),
            address: supplier.address.clone(),
            city: supplier.city.clone(),
            company_name: supplier.company_name.clone(),
            notes: supplier.notes.clone(),
            created_at: Utc::now(),
        };
        state.suppliers.push(record.clone());
        Ok(record)
    }

    async fn get_supplier(&self, owner_id: OwnerId, id: SupplierId) -> Result<Option<Supplier>> {
        Ok(self.state.read().await.supplier(owner_id, id).cloned())
    }

    async fn list_suppliers(
        &self,
        owner_id: OwnerId,
        query: &ListQuery,
    ) -> Result<Page<Supplier>> {
        let state = self.state.read().await;
        let rows = newest_first(&state.suppliers, |s| {
            s.owner_id == owner_id
                && query.search.as_ref().is_none_or(|needle| {
                    contains_ignore_case(&s.name, needle)
                        || s.company_name
                            .as_deref()
                            .is_some_and(|company| contains_ignore_case(company, needle))
                })
        });
        Ok(Page::from_sorted(rows, query.paging))
    }

    async fn count_suppliers(&self, owner_id: OwnerId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .suppliers
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .count() as u64)
    }

    async fn update_supplier(
        &self,
        owner_id: OwnerId,
        id: SupplierId,
        changes: &SupplierChanges,
    ) -> Result<Supplier> {
        let mut state = self.state.write().await;
        let idx = state
            .suppliers
            .iter()
            .position(|s| s.id == id && s.owner_id == owner_id)
            .ok_or_else(|| StoreError::not_found("Supplier", id))?;

        let mut supplier = state.suppliers[idx].clone();
        changes.apply(&mut supplier);
        if state
            .suppliers
            .iter()
            .any(|s| s.id != id && s.owner_id == owner_id && s.name == supplier.name)
        {
            return Err(StoreError::Conflict {
                field: "name".to_string(),
            });
        }

        state.suppliers[idx] = supplier.clone();
        Ok(supplier)
    }

    async fn delete_supplier(&self, owner_id: OwnerId, id: SupplierId) -> Result<u64> {
        let mut state = self.state.write().await;
        let idx = state
            .suppliers
            .iter()
            .position(|s| s.id == id && s.owner_id == owner_id)
            .ok_or_else(|| StoreError::not_found("Supplier", id))?;

        let invoice_ids: Vec<InvoiceId> = state
            .invoices
            .iter()
            .filter(|row| {
                row.owner_id == owner_id
                    && row.kind == InvoiceKind::Purchase
                    && row.counterpart.supplier_id() == Some(id)
            })
            .map(|row| row.id)
            .collect();
        for invoice_id in &invoice_ids {
            if let Some(invoice_idx) =
                state.invoice_index(owner_id, InvoiceKind::Purchase, *invoice_id)
            {
                state.remove_invoice(invoice_idx);
            }
        }
        state.suppliers.remove(idx);
        Ok(invoice_ids.len() as u64)
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let record = Expense {
            id: ExpenseId::new(),
            owner_id: expense.owner_id,
            name: expense.name.clone(),
            category: expense.category.clone(),
            amount: expense.amount,
            date: expense.date,
            notes: expense.notes.clone(),
            created_at: Utc::now(),
        };
        self.state.write().await.expenses.push(record.clone());
        Ok(record)
    }

    async fn list_expenses(&self, owner_id: OwnerId, query: &ListQuery) -> Result<Page<Expense>> {
        let state = self.state.read().await;
        let mut rows = newest_first(&state.expenses, |e| {
            e.owner_id == owner_id
                && query.search.as_ref().is_none_or(|needle| {
                    contains_ignore_case(&e.name, needle)
                        || contains_ignore_case(&e.category, needle)
                })
        });
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(Page::from_sorted(rows, query.paging))
    }

    async fn get_expense(&self, owner_id: OwnerId, id: ExpenseId) -> Result<Option<Expense>> {
        let state = self.state.read().await;
        Ok(state
            .expenses
            .iter()
            .find(|e| e.id == id && e.owner_id == owner_id)
            .cloned())
    }

    async fn update_expense(
        &self,
        owner_id: OwnerId,
        id: ExpenseId,
        changes: &ExpenseChanges,
    ) -> Result<Expense> {
        let mut state = self.state.write().await;
        let expense = state
            .expenses
            .iter_mut()
            .find(|e| e.id == id && e.owner_id == owner_id)
            .ok_or_else(|| StoreError::not_found("Expense", id))?;
        changes.apply(expense);
        Ok(expense.clone())
    }

    async fn delete_expense(&self, owner_id: OwnerId, id: ExpenseId) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.expenses.len();
        state
            .expenses
            .retain(|e| !(e.id == id && e.owner_id == owner_id));
        if state.expenses.len() == before {
            return Err(StoreError::not_found("Expense", id));
        }
        Ok(())
    }

    async fn all_expenses(&self, owner_id: OwnerId) -> Result<Vec<Expense>> {
        let state = self.state.read().await;
        let mut rows = newest_first(&state.expenses, |e| e.owner_id == owner_id);
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn get_payment(&self, owner_id: OwnerId, id: PaymentId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .find(|p| p.id == id && p.owner_id == owner_id)
            .cloned())
    }

    async fn list_payments(
        &self,
        owner_id: OwnerId,
        query: &PaymentQuery,
    ) -> Result<Page<Payment>> {
        let state = self.state.read().await;
        let mut rows = newest_first(&state.payments, |p| {
            p.owner_id == owner_id
                && query.payment_type.is_none_or(|ty| p.payment_type == ty)
                && query
                    .invoice_id
                    .is_none_or(|id| p.link.is_some_and(|link| link.invoice_id() == id))
        });
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(Page::from_sorted(rows, query.paging))
    }

    async fn all_payments(&self, owner_id: OwnerId) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut rows = newest_first(&state.payments, |p| p.owner_id == owner_id);
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn invoice_summaries(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
    ) -> Result<Vec<InvoiceSummary>> {
        let state = self.state.read().await;
        Ok(state
            .invoices
            .iter()
            .filter(|row| row.owner_id == owner_id && row.kind == kind)
            .map(|row| InvoiceSummary {
                total: row.total,
                paid: row.paid,
                remaining: row.remaining,
            })
            .collect())
    }

    async fn close(&self) {}
}

/// Transaction over the in-memory store. Dropping it rolls back.
pub struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<LedgerState>,
    working: LedgerState,
    fail_on_payment_insert: bool,
    write_delay: Duration,
}

impl InMemoryTransaction {
    async fn simulate_latency(&self) {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn find_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<Option<Invoice>> {
        Ok(self
            .working
            .invoice_index(owner_id, kind, id)
            .map(|idx| self.working.assemble(&self.working.invoices[idx])))
    }

    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> Result<InvoiceId> {
        self.simulate_latency().await;
        self.working
            .require_counterpart(invoice.owner_id, &invoice.counterpart)?;

        let now = Utc::now();
        let id = InvoiceId::new();
        self.working.invoices.push(InvoiceRow {
            id,
            owner_id: invoice.owner_id,
            kind: invoice.kind,
            date: invoice.date,
            counterpart: invoice.counterpart.clone(),
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            total: invoice.total,
            paid: invoice.paid,
            remaining: invoice.remaining,
            notes: invoice.notes.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
        changes: &InvoiceChanges,
    ) -> Result<()> {
        self.simulate_latency().await;
        if let Some(ref counterpart) = changes.counterpart {
            self.working.require_counterpart(owner_id, counterpart)?;
        }

        let idx = self
            .working
            .invoice_index(owner_id, kind, id)
            .ok_or_else(|| StoreError::not_found("Invoice", id))?;
        let row = &mut self.working.invoices[idx];

        if let Some(date) = changes.date {
            row.date = date;
        }
        if let Some(ref counterpart) = changes.counterpart {
            row.counterpart = counterpart.clone();
        }
        if let Some(subtotal) = changes.subtotal {
            row.subtotal = subtotal;
        }
        if let Some(tax) = changes.tax {
            row.tax = tax;
        }
        if let Some(total) = changes.total {
            row.total = total;
        }
        if let Some(paid) = changes.paid {
            row.paid = paid;
        }
        if let Some(remaining) = changes.remaining {
            row.remaining = remaining;
        }
        if let Some(ref notes) = changes.notes {
            row.notes = Some(notes.clone());
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<()> {
        self.simulate_latency().await;
        let idx = self
            .working
            .invoice_index(owner_id, kind, id)
            .ok_or_else(|| StoreError::not_found("Invoice", id))?;
        self.working.remove_invoice(idx);
        Ok(())
    }

    async fn insert_item(
        &mut self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        values: &ItemValues,
    ) -> Result<ItemId> {
        self.simulate_latency().await;
        self.working.require_product(owner_id, values.product_id)?;

        let id = ItemId::new();
        self.working.items.push(ItemRow {
            id,
            invoice_id,
            values: values.clone(),
        });
        Ok(id)
    }

    async fn update_item(
        &mut self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        item_id: ItemId,
        values: &ItemValues,
    ) -> Result<()> {
        self.simulate_latency().await;
        self.working.require_product(owner_id, values.product_id)?;

        let item = self
            .working
            .items
            .iter_mut()
            .find(|item| item.id == item_id && item.invoice_id == invoice_id)
            .ok_or_else(|| StoreError::not_found("Invoice item", item_id))?;
        item.values = values.clone();
        Ok(())
    }

    async fn delete_item(&mut self, invoice_id: InvoiceId, item_id: ItemId) -> Result<()> {
        self.simulate_latency().await;
        let before = self.working.items.len();
        self.working
            .items
            .retain(|item| !(item.id == item_id && item.invoice_id == invoice_id));
        if self.working.items.len() == before {
            return Err(StoreError::not_found("Invoice item", item_id));
        }
        Ok(())
    }

    async fn adjust_stock(
        &mut self,
        owner_id: OwnerId,
        product_id: ProductId,
        delta: i64,
    ) -> Result<i64> {
        self.simulate_latency().await;
        let product = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == product_id && p.owner_id == owner_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;

        let next = product.stock + delta;
        if next < 0 {
            return Err(StoreError::InsufficientStock {
                product_id,
                available: product.stock,
                requested: -delta,
            });
        }
        product.stock = next;
        Ok(next)
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment> {
        self.simulate_latency().await;
        if self.fail_on_payment_insert {
            return Err(StoreError::Unavailable(
                "payment ledger rejected the write".to_string(),
            ));
        }
        if let Some(link) = payment.link {
            if self
                .working
                .invoice_index(payment.owner_id, link.kind(), link.invoice_id())
                .is_none()
            {
                return Err(StoreError::not_found("Invoice", link.invoice_id()));
            }
        }

        let record = Payment {
            id: PaymentId::new(),
            owner_id: payment.owner_id,
            amount: payment.amount,
            payment_type: payment.payment_type,
            date: payment.date,
            link: payment.link,
            notes: payment.notes.clone(),
            created_at: Utc::now(),
        };
        self.working.payments.push(record.clone());
        Ok(record)
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PaymentLink;
    use common::PaymentType;

    async fn seed_product(store: &InMemoryLedgerStore, owner_id: OwnerId, stock: i64) -> Product {
        store
            .create_product(&NewProduct {
                owner_id,
                name: "Widget".to_string(),
                code: None,
                cost: Money::from_cents(500),
                price: Money::from_cents(800),
                sale_price: Money::from_cents(900),
                stock,
            })
            .await
            .unwrap()
    }

    fn sale_header(owner_id: OwnerId) -> NewInvoice {
        NewInvoice {
            owner_id,
            kind: InvoiceKind::Sale,
            date: Utc::now(),
            counterpart: Counterpart::Customer("Jane Doe".to_string()),
            subtotal: Money::from_cents(1000),
            tax: Money::zero(),
            total: Money::from_cents(1000),
            paid: Money::zero(),
            remaining: Money::from_cents(1000),
            notes: None,
        }
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let product = seed_product(&store, owner, 10).await;

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_invoice(&sale_header(owner)).await.unwrap();
        tx.insert_item(
            owner,
            id,
            &ItemValues {
                product_id: product.id,
                quantity: 2,
                unit_amount: Money::from_cents(500),
                total: Money::from_cents(1000),
            },
        )
        .await
        .unwrap();
        assert_eq!(tx.adjust_stock(owner, product.id, -2).await.unwrap(), 8);
        tx.commit().await.unwrap();

        let invoice = store
            .get_invoice(owner, InvoiceKind::Sale, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].product_name.as_deref(), Some("Widget"));
        let product = store.get_product(owner, product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 8);
    }

    #[tokio::test]
    async fn dropping_transaction_discards_writes() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let product = seed_product(&store, owner, 10).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_invoice(&sale_header(owner)).await.unwrap();
            tx.adjust_stock(owner, product.id, 5).await.unwrap();
        }

        assert_eq!(store.invoice_count().await, 0);
        let product = store.get_product(owner, product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 10);
    }

    #[tokio::test]
    async fn adjust_stock_refuses_to_go_negative() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let product = seed_product(&store, owner, 3).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.adjust_stock(owner, product.id, -4).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));
        assert_eq!(tx.adjust_stock(owner, product.id, -3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stock_is_owner_scoped() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let product = seed_product(&store, owner, 3).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.adjust_stock(OwnerId::new(), product.id, 1).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_invoice_unlinks_payments() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_invoice(&sale_header(owner)).await.unwrap();
        tx.insert_payment(&NewPayment {
            owner_id: owner,
            amount: Money::from_cents(300),
            payment_type: PaymentType::CustomerPayment,
            date: Utc::now(),
            link: Some(PaymentLink::SaleInvoice(id)),
            notes: None,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.delete_invoice(owner, InvoiceKind::Sale, id)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let payments = store.all_payments(owner).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert!(payments[0].link.is_none());
    }

    #[tokio::test]
    async fn payment_failure_switch() {
        let store = InMemoryLedgerStore::new();
        store.set_fail_on_payment_insert(true);

        let mut tx = store.begin().await.unwrap();
        let result = tx
            .insert_payment(&NewPayment {
                owner_id: OwnerId::new(),
                amount: Money::from_cents(100),
                payment_type: PaymentType::SupplierPayment,
                date: Utc::now(),
                link: None,
                notes: None,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn duplicate_supplier_name_conflicts() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let supplier = NewSupplier {
            owner_id: owner,
            name: "Acme".to_string(),
            ..Default::default()
        };

        store.create_supplier(&supplier).await.unwrap();
        let result = store.create_supplier(&supplier).await;
        assert!(matches!(result, Err(StoreError::Conflict { ref field }) if field == "name"));

        let other_owner = NewSupplier {
            owner_id: OwnerId::new(),
            ..supplier
        };
        assert!(store.create_supplier(&other_owner).await.is_ok());
    }

    #[tokio::test]
    async fn list_invoices_filters_and_sorts() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();

        let mut tx = store.begin().await.unwrap();
        for (customer, total, paid) in [("Alice", 1000, 1000), ("Bob", 3000, 0), ("Carol", 2000, 500)]
        {
            tx.insert_invoice(&NewInvoice {
                counterpart: Counterpart::Customer(customer.to_string()),
                subtotal: Money::from_cents(total),
                total: Money::from_cents(total),
                paid: Money::from_cents(paid),
                remaining: Money::from_cents(total - paid),
                ..sale_header(owner)
            })
            .await
            .unwrap();
        }
        tx.insert_invoice(&sale_header(OwnerId::new())).await.unwrap();
        tx.commit().await.unwrap();

        let query = InvoiceQuery::new()
            .outstanding_only()
            .sort(InvoiceSortField::Total, SortOrder::Asc);
        let page = store
            .list_invoices(owner, InvoiceKind::Sale, &query)
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        let totals: Vec<i64> = page.items.iter().map(|i| i.total.cents()).collect();
        assert_eq!(totals, vec![2000, 3000]);

        let page = store
            .list_invoices(owner, InvoiceKind::Sale, &InvoiceQuery::new().search("bo"))
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(
            page.items[0].counterpart,
            Counterpart::Customer("Bob".to_string())
        );

        let page = store
            .list_invoices(owner, InvoiceKind::Purchase, &InvoiceQuery::new())
            .await
            .unwrap();
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn insert_item_requires_existing_product() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_invoice(&sale_header(owner)).await.unwrap();
        let result = tx
            .insert_item(
                owner,
                id,
                &ItemValues {
                    product_id: ProductId::new(),
                    quantity: 1,
                    unit_amount: Money::from_cents(100),
                    total: Money::from_cents(100),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "Product", .. })));
    }

    fn purchase_header(owner_id: OwnerId, supplier_id: SupplierId) -> NewInvoice {
        NewInvoice {
            kind: InvoiceKind::Purchase,
            counterpart: Counterpart::Supplier(supplier_id),
            ..sale_header(owner_id)
        }
    }

    fn item(product_id: ProductId) -> ItemValues {
        ItemValues {
            product_id,
            quantity: 2,
            unit_amount: Money::from_cents(500),
            total: Money::from_cents(1000),
        }
    }

    #[tokio::test]
    async fn delete_supplier_removes_its_purchase_invoices() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let product = seed_product(&store, owner, 10).await;
        let supplier = store
            .create_supplier(&NewSupplier {
                owner_id: owner,
                name: "Acme".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let purchase = tx
            .insert_invoice(&purchase_header(owner, supplier.id))
            .await
            .unwrap();
        tx.insert_item(owner, purchase, &item(product.id))
            .await
            .unwrap();
        tx.insert_payment(&NewPayment {
            owner_id: owner,
            amount: Money::from_cents(400),
            payment_type: PaymentType::SupplierPayment,
            date: Utc::now(),
            link: Some(PaymentLink::PurchaseInvoice(purchase)),
            notes: None,
        })
        .await
        .unwrap();
        tx.insert_invoice(&sale_header(owner)).await.unwrap();
        tx.commit().await.unwrap();

        let removed = store.delete_supplier(owner, supplier.id).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_supplier(owner, supplier.id).await.unwrap().is_none());
        assert_eq!(store.invoice_count().await, 1);
        assert_eq!(store.item_count().await, 0);

        let payments = store.all_payments(owner).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert!(payments[0].link.is_none());
        assert_eq!(
            store.get_product(owner, product.id).await.unwrap().unwrap().stock,
            10
        );

        let again = store.delete_supplier(owner, supplier.id).await;
        assert!(matches!(again, Err(StoreError::NotFound { entity: "Supplier", .. })));
    }

    #[tokio::test]
    async fn referenced_product_cannot_be_deleted() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let product = seed_product(&store, owner, 10).await;

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_invoice(&sale_header(owner)).await.unwrap();
        tx.insert_item(owner, id, &item(product.id)).await.unwrap();
        tx.commit().await.unwrap();

        let result = store.delete_product(owner, product.id).await;
        assert!(matches!(result, Err(StoreError::InUse { entity: "Product", .. })));

        let unused = seed_product(&store, owner, 0).await;
        store.delete_product(owner, unused.id).await.unwrap();
        assert!(store.get_product(owner, unused.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_product_keeps_codes_unique() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let first = seed_product(&store, owner, 1).await;
        let second = seed_product(&store, owner, 1).await;

        let set_code = |code: &str| ProductChanges {
            code: Some(Some(code.to_string())),
            ..Default::default()
        };
        store
            .update_product(owner, first.id, &set_code("WID-1"))
            .await
            .unwrap();
        let result = store.update_product(owner, second.id, &set_code("WID-1")).await;
        assert!(matches!(result, Err(StoreError::Conflict { ref field }) if field == "code"));

        // Re-saving a product with its own code is not a conflict.
        let renamed = store
            .update_product(
                owner,
                first.id,
                &ProductChanges {
                    name: Some("Widget XL".to_string()),
                    ..set_code("WID-1")
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Widget XL");
        assert_eq!(renamed.stock, 1);
    }

    #[tokio::test]
    async fn expenses_update_and_delete_are_owner_scoped() {
        let store = InMemoryLedgerStore::new();
        let owner = OwnerId::new();
        let expense = store
            .create_expense(&NewExpense {
                owner_id: owner,
                name: "Rent".to_string(),
                category: "Office".to_string(),
                amount: Money::from_cents(50_000),
                date: Utc::now(),
                notes: None,
            })
            .await
            .unwrap();

        let changes = ExpenseChanges {
            amount: Some(Money::from_cents(55_000)),
            ..Default::default()
        };
        let result = store.update_expense(OwnerId::new(), expense.id, &changes).await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "Expense", .. })));

        let updated = store.update_expense(owner, expense.id, &changes).await.unwrap();
        assert_eq!(updated.amount, Money::from_cents(55_000));
        assert_eq!(
            store.get_expense(owner, expense.id).await.unwrap(),
            Some(updated)
        );

        assert!(store.delete_expense(OwnerId::new(), expense.id).await.is_err());
        store.delete_expense(owner, expense.id).await.unwrap();
        assert!(store.get_expense(owner, expense.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_write_delay_saturates() {
        let store = InMemoryLedgerStore::new();
        store.set_write_delay(Duration::MAX);
        assert_eq!(store.write_delay_ms.load(Ordering::SeqCst), u64::MAX);

        store.set_write_delay(Duration::from_millis(25));
        let tx = store.begin().await.unwrap();
        assert_eq!(tx.write_delay, Duration::from_millis(25));
    }
}
