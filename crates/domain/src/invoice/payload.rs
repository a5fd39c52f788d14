//! Request payloads accepted by the invoice service.

use chrono::{DateTime, Utc};
use common::{ItemId, Money, ProductId, SupplierId};
use ledger_store::ItemValues;

/// A line item as sent by the caller.
///
/// `id` is present only for items that already exist on the invoice; an item
/// without one is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInput {
    pub id: Option<ItemId>,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit cost for purchases, unit price for sales.
    pub unit_amount: Money,
    pub total: Money,
}

impl ItemInput {
    /// Creates a new (not yet persisted) item whose total is `quantity * unit_amount`.
    pub fn new(product_id: ProductId, quantity: u32, unit_amount: Money) -> Self {
        Self {
            id: None,
            product_id,
            quantity,
            unit_amount,
            total: unit_amount.multiply(quantity),
        }
    }

    /// Refers to an existing item by id.
    pub fn existing(
        id: ItemId,
        product_id: ProductId,
        quantity: u32,
        unit_amount: Money,
    ) -> Self {
        Self {
            id: Some(id),
            ..Self::new(product_id, quantity, unit_amount)
        }
    }

    pub fn values(&self) -> ItemValues {
        ItemValues {
            product_id: self.product_id,
            quantity: self.quantity,
            unit_amount: self.unit_amount,
            total: self.total,
        }
    }
}

/// Payload for creating a purchase or sale invoice.
#[derive(Debug, Clone, Default)]
pub struct CreateInvoice {
    /// Defaults to the current time.
    pub date: Option<DateTime<Utc>>,
    /// Required for purchase invoices.
    pub supplier_id: Option<SupplierId>,
    /// Required for sale invoices.
    pub customer_name: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub paid: Money,
    /// When sent it must equal `total - paid`; the stored value is always recomputed.
    pub remaining: Option<Money>,
    pub notes: Option<String>,
    pub items: Vec<ItemInput>,
}

impl CreateInvoice {
    /// Builds a consistent payload from items alone: subtotal is the sum of the
    /// item totals and `total = subtotal + tax`.
    pub fn from_items(items: Vec<ItemInput>, tax: Money, paid: Money) -> Self {
        let subtotal: Money = items.iter().map(|i| i.total).sum();
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
            paid,
            items,
            ..Default::default()
        }
    }

    pub fn supplier(mut self, supplier_id: SupplierId) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    pub fn customer(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Partial update of an invoice. `None` fields are left untouched; when
/// `items` is sent it replaces the whole item set.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub date: Option<DateTime<Utc>>,
    pub supplier_id: Option<SupplierId>,
    pub customer_name: Option<String>,
    pub subtotal: Option<Money>,
    pub tax: Option<Money>,
    pub total: Option<Money>,
    pub paid: Option<Money>,
    pub remaining: Option<Money>,
    pub notes: Option<String>,
    pub items: Option<Vec<ItemInput>>,
}

impl UpdateInvoice {
    /// Replaces the item set and re-derives subtotal and total from it.
    pub fn with_items(mut self, items: Vec<ItemInput>, tax: Money) -> Self {
        let subtotal: Money = items.iter().map(|i| i.total).sum();
        self.subtotal = Some(subtotal);
        self.tax = Some(tax);
        self.total = Some(subtotal + tax);
        self.items = Some(items);
        self
    }

    pub fn paid(mut self, paid: Money) -> Self {
        self.paid = Some(paid);
        self
    }
}
