//! Rows persisted by the ledger store and the inputs used to write them.

use chrono::{DateTime, Utc};
use common::{
    ExpenseId, InvoiceId, InvoiceKind, ItemId, Money, OwnerId, PaymentId, PaymentType, ProductId,
    SupplierId,
};
use serde::{Deserialize, Serialize};

/// A product with its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub owner_id: OwnerId,
    pub name: String,
    pub code: Option<String>,
    /// Unit acquisition price.
    pub cost: Money,
    pub price: Money,
    pub sale_price: Money,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub owner_id: OwnerId,
    pub name: String,
    pub code: Option<String>,
    pub cost: Money,
    pub price: Money,
    pub sale_price: Money,
    pub stock: i64,
}

/// Product columns to overwrite. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the code.
    pub code: Option<Option<String>>,
    pub cost: Option<Money>,
    pub price: Option<Money>,
    pub sale_price: Option<Money>,
    pub stock: Option<i64>,
}

impl ProductChanges {
    pub fn apply(&self, product: &mut Product) {
        if let Some(ref name) = self.name {
            product.name = name.clone();
        }
        if let Some(ref code) = self.code {
            product.code = code.clone();
        }
        if let Some(cost) = self.cost {
            product.cost = cost;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(sale_price) = self.sale_price {
            product.sale_price = sale_price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub owner_id: OwnerId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSupplier {
    pub owner_id: OwnerId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
}

/// Supplier columns to overwrite. For the optional columns `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierChanges {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub company_name: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl SupplierChanges {
    pub fn apply(&self, supplier: &mut Supplier) {
        if let Some(ref name) = self.name {
            supplier.name = name.clone();
        }
        let columns = [
            (&self.phone, &mut supplier.phone),
            (&self.email, &mut supplier.email),
            (&self.address, &mut supplier.address),
            (&self.city, &mut supplier.city),
            (&self.company_name, &mut supplier.company_name),
            (&self.notes, &mut supplier.notes),
        ];
        for (change, column) in columns {
            if let Some(value) = change {
                *column = value.clone();
            }
        }
    }
}

/// The other party on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counterpart {
    Supplier(SupplierId),
    Customer(String),
}

impl Counterpart {
    pub fn supplier_id(&self) -> Option<SupplierId> {
        match self {
            Counterpart::Supplier(id) => Some(*id),
            Counterpart::Customer(_) => None,
        }
    }

    pub fn customer_name(&self) -> Option<&str> {
        match self {
            Counterpart::Supplier(_) => None,
            Counterpart::Customer(name) => Some(name),
        }
    }
}

/// A persisted invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: ItemId,
    pub invoice_id: InvoiceId,
    pub product_id: ProductId,
    /// Name of the referenced product at read time, if it still exists.
    pub product_name: Option<String>,
    pub quantity: u32,
    /// Unit cost for purchases, unit price for sales.
    pub unit_amount: Money,
    pub total: Money,
}

/// Column values of a line item, used for both inserts and in-place updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemValues {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_amount: Money,
    pub total: Money,
}

/// An invoice header together with its ordered line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub owner_id: OwnerId,
    pub kind: InvoiceKind,
    pub date: DateTime<Utc>,
    pub counterpart: Counterpart,
    /// Supplier name for purchase invoices, resolved at read time.
    pub supplier_name: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub paid: Money,
    pub remaining: Money,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub owner_id: OwnerId,
    pub kind: InvoiceKind,
    pub date: DateTime<Utc>,
    pub counterpart: Counterpart,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub paid: Money,
    pub remaining: Money,
    pub notes: Option<String>,
}

/// Header fields to overwrite on update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceChanges {
    pub date: Option<DateTime<Utc>>,
    pub counterpart: Option<Counterpart>,
    pub subtotal: Option<Money>,
    pub tax: Option<Money>,
    pub total: Option<Money>,
    pub paid: Option<Money>,
    pub remaining: Option<Money>,
    pub notes: Option<String>,
}

impl InvoiceChanges {
    pub fn is_empty(&self) -> bool {
        *self == InvoiceChanges::default()
    }
}

/// Minimal projection of an invoice used by read-side aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceSummary {
    pub total: Money,
    pub paid: Money,
    pub remaining: Money,
}

/// The invoice a payment was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentLink {
    PurchaseInvoice(InvoiceId),
    SaleInvoice(InvoiceId),
}

impl PaymentLink {
    pub fn for_invoice(kind: InvoiceKind, invoice_id: InvoiceId) -> Self {
        match kind {
            InvoiceKind::Purchase => PaymentLink::PurchaseInvoice(invoice_id),
            InvoiceKind::Sale => PaymentLink::SaleInvoice(invoice_id),
        }
    }

    pub fn kind(&self) -> InvoiceKind {
        match self {
            PaymentLink::PurchaseInvoice(_) => InvoiceKind::Purchase,
            PaymentLink::SaleInvoice(_) => InvoiceKind::Sale,
        }
    }

    pub fn invoice_id(&self) -> InvoiceId {
        match self {
            PaymentLink::PurchaseInvoice(id) | PaymentLink::SaleInvoice(id) => *id,
        }
    }

    pub fn purchase_invoice_id(&self) -> Option<InvoiceId> {
        match self {
            PaymentLink::PurchaseInvoice(id) => Some(*id),
            PaymentLink::SaleInvoice(_) => None,
        }
    }

    pub fn sale_invoice_id(&self) -> Option<InvoiceId> {
        match self {
            PaymentLink::PurchaseInvoice(_) => None,
            PaymentLink::SaleInvoice(id) => Some(*id),
        }
    }
}

/// An append-only payment ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub owner_id: OwnerId,
    /// Signed: corrections that lower `paid` are recorded as negative amounts.
    pub amount: Money,
    pub payment_type: PaymentType,
    pub date: DateTime<Utc>,
    pub link: Option<PaymentLink>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub owner_id: OwnerId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub date: DateTime<Utc>,
    pub link: Option<PaymentLink>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub owner_id: OwnerId,
    pub name: String,
    pub category: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub owner_id: OwnerId,
    pub name: String,
    pub category: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Money>,
    pub date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
}

impl ExpenseChanges {
    pub fn apply(&self, expense: &mut Expense) {
        if let Some(ref name) = self.name {
            expense.name = name.clone();
        }
        if let Some(ref category) = self.category {
            expense.category = category.clone();
        }
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(date) = self.date {
            expense.date = date;
        }
        if let Some(ref notes) = self.notes {
            expense.notes = notes.clone();
        }
    }
}
