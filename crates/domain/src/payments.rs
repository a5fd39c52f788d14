//! Payment ledger entries produced by invoice writes.

use chrono::Utc;
use common::{InvoiceId, InvoiceKind, Money, OwnerId};
use ledger_store::{NewPayment, PaymentLink};

/// Builds the ledger entry for `amount` changing hands on an invoice.
///
/// The amount is signed: a negative value records a correction that lowered
/// the invoice's paid amount. Returns `None` when nothing moved.
pub fn ledger_entry(
    owner_id: OwnerId,
    kind: InvoiceKind,
    invoice_id: InvoiceId,
    amount: Money,
) -> Option<NewPayment> {
    if amount.is_zero() {
        return None;
    }

    Some(NewPayment {
        owner_id,
        amount,
        payment_type: kind.payment_type(),
        date: Utc::now(),
        link: Some(PaymentLink::for_invoice(kind, invoice_id)),
        notes: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PaymentType;

    #[test]
    fn zero_amount_records_nothing() {
        assert!(
            ledger_entry(
                OwnerId::new(),
                InvoiceKind::Sale,
                InvoiceId::new(),
                Money::zero()
            )
            .is_none()
        );
    }

    #[test]
    fn entry_is_typed_and_linked_by_kind() {
        let invoice_id = InvoiceId::new();
        let entry = ledger_entry(
            OwnerId::new(),
            InvoiceKind::Purchase,
            invoice_id,
            Money::from_cents(-500),
        )
        .unwrap();

        assert_eq!(entry.payment_type, PaymentType::SupplierPayment);
        assert_eq!(entry.amount, Money::from_cents(-500));
        assert_eq!(entry.link, Some(PaymentLink::PurchaseInvoice(invoice_id)));
    }
}
