//! The invoice aggregate: an invoice header plus its owned line items.
//!
//! [`InvoiceDraft`] and [`InvoiceRevision`] are built from validated input
//! outside of any transaction. Their `persist` methods then replay the writes
//! in a fixed order (header, items, stock, payment) against an open
//! [`LedgerTransaction`]; the caller decides whether to commit.

use chrono::Utc;
use common::{InvoiceId, InvoiceKind, Money, OwnerId};
use ledger_store::{
    Counterpart, Invoice, InvoiceChanges, ItemValues, LedgerTransaction, NewInvoice, StoreError,
};

use super::payload::{CreateInvoice, UpdateInvoice};
use super::reconciler::{self, Reconciliation, StockDelta};
use super::validation;
use crate::error::ValidationErrors;
use crate::payments;

/// Applies stock deltas one by one, in order.
pub async fn apply_stock<T: LedgerTransaction>(
    tx: &mut T,
    owner_id: OwnerId,
    deltas: &[StockDelta],
) -> Result<(), StoreError> {
    for delta in deltas {
        tx.adjust_stock(owner_id, delta.product_id, delta.quantity)
            .await?;
    }
    Ok(())
}

/// A validated invoice that has not been written yet.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    header: NewInvoice,
    items: Vec<ItemValues>,
}

impl InvoiceDraft {
    /// Validates `input` and fixes the server-derived fields: the counterpart
    /// required by `kind`, the date and `remaining = total - paid`.
    pub fn new(
        owner_id: OwnerId,
        kind: InvoiceKind,
        input: CreateInvoice,
    ) -> Result<Self, ValidationErrors> {
        validation::validate_create(kind, &input)?;

        let counterpart = match (kind, input.supplier_id, input.customer_name) {
            (InvoiceKind::Purchase, Some(supplier_id), _) => Counterpart::Supplier(supplier_id),
            (InvoiceKind::Sale, _, Some(name)) => Counterpart::Customer(name.trim().to_string()),
            (InvoiceKind::Purchase, None, _) => {
                return Err(ValidationErrors::single("supplier_id", "Supplier is required"));
            }
            (InvoiceKind::Sale, _, None) => {
                return Err(ValidationErrors::single(
                    "customer_name",
                    "Customer name is required",
                ));
            }
        };

        let items = input.items.iter().map(|item| item.values()).collect();
        let header = NewInvoice {
            owner_id,
            kind,
            date: input.date.unwrap_or_else(Utc::now),
            counterpart,
            subtotal: input.subtotal,
            tax: input.tax,
            total: input.total,
            paid: input.paid,
            remaining: input.total - input.paid,
            notes: input.notes,
        };

        Ok(Self { header, items })
    }

    pub fn kind(&self) -> InvoiceKind {
        self.header.kind
    }

    pub fn header(&self) -> &NewInvoice {
        &self.header
    }

    pub fn items(&self) -> &[ItemValues] {
        &self.items
    }

    /// Stock movements implied by inserting every item.
    pub fn stock_deltas(&self) -> Vec<StockDelta> {
        reconciler::creation_deltas(self.header.kind, &self.items)
    }

    /// Amount recorded on the payment ledger, if any money changed hands.
    pub fn payment_amount(&self) -> Option<Money> {
        self.header.paid.is_positive().then_some(self.header.paid)
    }

    /// Writes the invoice, its items, the stock movements and the initial payment.
    pub async fn persist<T: LedgerTransaction>(&self, tx: &mut T) -> Result<InvoiceId, StoreError> {
        let owner_id = self.header.owner_id;
        let invoice_id = tx.insert_invoice(&self.header).await?;

        for item in &self.items {
            tx.insert_item(owner_id, invoice_id, item).await?;
        }

        apply_stock(tx, owner_id, &self.stock_deltas()).await?;

        if let Some(amount) = self.payment_amount()
            && let Some(entry) =
                payments::ledger_entry(owner_id, self.header.kind, invoice_id, amount)
        {
            tx.insert_payment(&entry).await?;
        }

        Ok(invoice_id)
    }
}

/// A validated change set for one stored invoice.
#[derive(Debug, Clone)]
pub struct InvoiceRevision {
    owner_id: OwnerId,
    kind: InvoiceKind,
    invoice_id: InvoiceId,
    changes: InvoiceChanges,
    reconciliation: Option<Reconciliation>,
    payment_delta: Money,
}

impl InvoiceRevision {
    /// Validates `input` against the stored invoice and computes the header
    /// changes, the item diff and the payment delta.
    ///
    /// `remaining` is recomputed as `total - paid` from the merged values
    /// whenever any of the three is sent; a stated `remaining` must match it.
    /// The merged invoice must still satisfy the amount invariants.
    pub fn plan(existing: &Invoice, input: &UpdateInvoice) -> Result<Self, ValidationErrors> {
        let kind = existing.kind;
        validation::validate_update(kind, input)?;

        let subtotal = input.subtotal.unwrap_or(existing.subtotal);
        let tax = input.tax.unwrap_or(existing.tax);
        let total = input.total.unwrap_or(existing.total);
        let paid = input.paid.unwrap_or(existing.paid);

        let mut errors = ValidationErrors::new();
        validation::check_total(total, subtotal, tax, &mut errors);
        let remaining = match total.checked_sub(paid) {
            Some(remaining) if !remaining.is_negative() => remaining,
            _ => {
                errors.add("paid", "Paid amount cannot exceed total");
                Money::zero()
            }
        };
        if let Some(stated) = input.remaining {
            validation::check_remaining(stated, total, paid, &mut errors);
        }
        if let Some(ref items) = input.items {
            validation::check_subtotal(subtotal, items, &mut errors);
        }
        errors.into_result()?;

        let counterpart = match kind {
            InvoiceKind::Purchase => input.supplier_id.map(Counterpart::Supplier),
            InvoiceKind::Sale => input
                .customer_name
                .as_ref()
                .map(|name| Counterpart::Customer(name.trim().to_string())),
        };
        let touches_amounts =
            input.total.is_some() || input.paid.is_some() || input.remaining.is_some();

        let changes = InvoiceChanges {
            date: input.date,
            counterpart,
            subtotal: input.subtotal,
            tax: input.tax,
            total: input.total,
            paid: input.paid,
            remaining: touches_amounts.then_some(remaining),
            notes: input.notes.clone(),
        };

        let reconciliation = input
            .items
            .as_deref()
            .map(|items| reconciler::reconcile(kind, &existing.items, items))
            .transpose()?;

        Ok(Self {
            owner_id: existing.owner_id,
            kind,
            invoice_id: existing.id,
            changes,
            reconciliation,
            payment_delta: paid.checked_sub(existing.paid).ok_or_else(|| {
                ValidationErrors::single("paid", "Paid amount is out of range")
            })?,
        })
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn changes(&self) -> &InvoiceChanges {
        &self.changes
    }

    pub fn reconciliation(&self) -> Option<&Reconciliation> {
        self.reconciliation.as_ref()
    }

    /// Signed difference between the new and the stored `paid`.
    pub fn payment_delta(&self) -> Money {
        self.payment_delta
    }

    pub fn stock_deltas(&self) -> &[StockDelta] {
        self.reconciliation
            .as_ref()
            .map(|r| r.stock_deltas.as_slice())
            .unwrap_or_default()
    }

    /// Writes the header changes, the item diff, the stock movements and the
    /// payment delta.
    pub async fn persist<T: LedgerTransaction>(&self, tx: &mut T) -> Result<(), StoreError> {
        let owner_id = self.owner_id;
        let invoice_id = self.invoice_id;

        tx.update_invoice(owner_id, self.kind, invoice_id, &self.changes)
            .await?;

        if let Some(ref diff) = self.reconciliation {
            for item in &diff.to_delete {
                tx.delete_item(invoice_id, item.id).await?;
            }
            for update in &diff.to_update {
                tx.update_item(owner_id, invoice_id, update.item_id, &update.values)
                    .await?;
            }
            for values in &diff.to_create {
                tx.insert_item(owner_id, invoice_id, values).await?;
            }
        }

        apply_stock(tx, owner_id, self.stock_deltas()).await?;

        if let Some(entry) =
            payments::ledger_entry(owner_id, self.kind, invoice_id, self.payment_delta)
        {
            tx.insert_payment(&entry).await?;
        }

        Ok(())
    }
}
