//! Field-level checks run before any invoice transaction opens.

use common::{InvoiceKind, Money};

use super::payload::{CreateInvoice, ItemInput, UpdateInvoice};
use crate::error::ValidationErrors;

/// Largest accepted difference, in cents, between a stated amount and the
/// amount derived from its parts.
pub const TOLERANCE_CENTS: u64 = 1;

/// Minimum length of a sale invoice's customer name.
pub const MIN_CUSTOMER_NAME_LEN: usize = 3;

pub(crate) fn within_tolerance(stated: Money, derived: Money) -> bool {
    stated.abs_diff(derived) <= TOLERANCE_CENTS
}

fn unit_field(kind: InvoiceKind) -> &'static str {
    match kind {
        InvoiceKind::Purchase => "cost",
        InvoiceKind::Sale => "price",
    }
}

fn validate_items(kind: InvoiceKind, items: &[ItemInput], errors: &mut ValidationErrors) {
    if items.is_empty() {
        errors.add("items", "At least one item is required");
        return;
    }

    let unit = unit_field(kind);
    for (i, item) in items.iter().enumerate() {
        if item.quantity == 0 {
            errors.add(
                format!("items[{i}].quantity"),
                "Quantity must be a positive integer",
            );
        }
        if !item.unit_amount.is_positive() {
            let message = match kind {
                InvoiceKind::Purchase => "Cost must be positive",
                InvoiceKind::Sale => "Price must be positive",
            };
            errors.add(format!("items[{i}].{unit}"), message);
        }
        if !item.total.is_positive() {
            errors.add(format!("items[{i}].total"), "Total must be positive");
            continue;
        }
        match item.unit_amount.checked_multiply(item.quantity) {
            None => errors.add(format!("items[{i}].total"), "Item total is out of range"),
            Some(expected) if !within_tolerance(item.total, expected) => errors.add(
                format!("items[{i}].total"),
                format!("Item total must equal quantity times {unit}"),
            ),
            Some(_) => {}
        }
    }
}

fn validate_customer_name(name: &str, errors: &mut ValidationErrors) {
    if name.trim().chars().count() < MIN_CUSTOMER_NAME_LEN {
        errors.add(
            "customer_name",
            format!("Customer name must be at least {MIN_CUSTOMER_NAME_LEN} characters"),
        );
    }
}

/// Rejects the counterpart field that does not belong to `kind`.
fn reject_foreign_counterpart(
    kind: InvoiceKind,
    has_supplier: bool,
    has_customer: bool,
    errors: &mut ValidationErrors,
) {
    match kind {
        InvoiceKind::Purchase if has_customer => errors.add(
            "customer_name",
            "Purchase invoices do not take a customer name",
        ),
        InvoiceKind::Sale if has_supplier => {
            errors.add("supplier_id", "Sale invoices do not take a supplier")
        }
        _ => {}
    }
}

/// Sum of the item totals, or `None` if it does not fit in an amount.
pub(crate) fn item_sum(items: &[ItemInput]) -> Option<Money> {
    Money::checked_sum(items.iter().map(|item| item.total))
}

/// Checks `subtotal` against the item totals.
pub(crate) fn check_subtotal(subtotal: Money, items: &[ItemInput], errors: &mut ValidationErrors) {
    match item_sum(items) {
        None => errors.add("subtotal", "Sum of item totals is out of range"),
        Some(sum) if !within_tolerance(subtotal, sum) => {
            errors.add("subtotal", "Subtotal must equal sum of item totals")
        }
        Some(_) => {}
    }
}

/// Checks `total` against `subtotal + tax`.
pub(crate) fn check_total(total: Money, subtotal: Money, tax: Money, errors: &mut ValidationErrors) {
    match subtotal.checked_add(tax) {
        None => errors.add("total", "Subtotal plus tax is out of range"),
        Some(expected) if !within_tolerance(total, expected) => {
            errors.add("total", "Total must equal subtotal plus tax")
        }
        Some(_) => {}
    }
}

/// Checks a stated `remaining` against `total - paid`.
pub(crate) fn check_remaining(
    stated: Money,
    total: Money,
    paid: Money,
    errors: &mut ValidationErrors,
) {
    if stated.is_negative() {
        errors.add("remaining", "Remaining amount cannot be negative");
        return;
    }
    let matches = total
        .checked_sub(paid)
        .is_some_and(|derived| within_tolerance(stated, derived));
    if !matches {
        errors.add(
            "remaining",
            "Remaining amount must equal total minus paid amount",
        );
    }
}

/// Checks a create payload: every item, the header amounts, their arithmetic
/// and the counterpart required by `kind`.
pub fn validate_create(kind: InvoiceKind, input: &CreateInvoice) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    match kind {
        InvoiceKind::Purchase => {
            if input.supplier_id.is_none() {
                errors.add("supplier_id", "Supplier is required");
            }
        }
        InvoiceKind::Sale => match input.customer_name.as_deref() {
            Some(name) => validate_customer_name(name, &mut errors),
            None => errors.add("customer_name", "Customer name is required"),
        },
    }
    reject_foreign_counterpart(
        kind,
        input.supplier_id.is_some(),
        input.customer_name.is_some(),
        &mut errors,
    );

    validate_items(kind, &input.items, &mut errors);

    if !input.subtotal.is_positive() {
        errors.add("subtotal", "Subtotal must be positive");
    }
    if input.tax.is_negative() {
        errors.add("tax", "Tax cannot be negative");
    }
    if !input.total.is_positive() {
        errors.add("total", "Total must be positive");
    }
    if input.paid.is_negative() {
        errors.add("paid", "Paid amount cannot be negative");
    }

    check_total(input.total, input.subtotal, input.tax, &mut errors);

    match input.remaining {
        Some(stated) => check_remaining(stated, input.total, input.paid, &mut errors),
        None => {
            let overpaid = input
                .total
                .checked_sub(input.paid)
                .is_none_or(|remaining| remaining.is_negative());
            if overpaid {
                errors.add("paid", "Paid amount cannot exceed total");
            }
        }
    }

    if !input.items.is_empty() {
        check_subtotal(input.subtotal, &input.items, &mut errors);
    }

    errors.into_result()
}

/// Checks a partial update on its own. Cross-field rules apply only when
/// every field they relate was sent; the rules over the merged invoice are
/// applied when the revision is planned.
pub fn validate_update(kind: InvoiceKind, input: &UpdateInvoice) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if kind == InvoiceKind::Sale
        && let Some(ref name) = input.customer_name
    {
        validate_customer_name(name, &mut errors);
    }
    reject_foreign_counterpart(
        kind,
        input.supplier_id.is_some(),
        input.customer_name.is_some(),
        &mut errors,
    );

    if let Some(ref items) = input.items {
        validate_items(kind, items, &mut errors);
    }

    if input.subtotal.is_some_and(|m| !m.is_positive()) {
        errors.add("subtotal", "Subtotal must be positive");
    }
    if input.tax.is_some_and(|m| m.is_negative()) {
        errors.add("tax", "Tax cannot be negative");
    }
    if input.total.is_some_and(|m| !m.is_positive()) {
        errors.add("total", "Total must be positive");
    }
    if input.paid.is_some_and(|m| m.is_negative()) {
        errors.add("paid", "Paid amount cannot be negative");
    }
    if input.remaining.is_some_and(|m| m.is_negative()) {
        errors.add("remaining", "Remaining amount cannot be negative");
    }

    if let (Some(total), Some(subtotal), Some(tax)) = (input.total, input.subtotal, input.tax) {
        check_total(total, subtotal, tax, &mut errors);
    }

    if let (Some(total), Some(paid), Some(remaining)) = (input.total, input.paid, input.remaining)
        && !remaining.is_negative()
    {
        check_remaining(remaining, total, paid, &mut errors);
    }

    if let (Some(subtotal), Some(items)) = (input.subtotal, input.items.as_deref())
        && !items.is_empty()
    {
        check_subtotal(subtotal, items, &mut errors);
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ProductId, SupplierId};

    fn cents(value: i64) -> Money {
        Money::from_cents(value)
    }

    fn purchase() -> CreateInvoice {
        CreateInvoice::from_items(
            vec![ItemInput::new(ProductId::new(), 5, cents(200))],
            cents(100),
            cents(0),
        )
        .supplier(SupplierId::new())
    }

    #[test]
    fn consistent_purchase_passes() {
        assert!(validate_create(InvoiceKind::Purchase, &purchase()).is_ok());
    }

    #[test]
    fn purchase_requires_supplier() {
        let mut input = purchase();
        input.supplier_id = None;

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("supplier_id"));
    }

    #[test]
    fn sale_requires_customer_name_of_three_chars() {
        let input = CreateInvoice::from_items(
            vec![ItemInput::new(ProductId::new(), 1, cents(500))],
            cents(0),
            cents(0),
        )
        .customer("Al");

        let errors = validate_create(InvoiceKind::Sale, &input).unwrap_err();
        assert!(errors.has_field("customer_name"));

        let input = input.customer("Alice");
        assert!(validate_create(InvoiceKind::Sale, &input).is_ok());
    }

    #[test]
    fn rejects_empty_items() {
        let input = CreateInvoice {
            subtotal: cents(100),
            total: cents(100),
            supplier_id: Some(SupplierId::new()),
            ..Default::default()
        };
        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert_eq!(errors.errors()[0].message, "At least one item is required");
    }

    #[test]
    fn item_total_mismatch_beyond_tolerance_is_rejected() {
        let mut input = purchase();
        // 5 x 2.00 = 10.00; 10.02 is off by two cents.
        input.items[0].total = cents(1002);
        input.subtotal = cents(1002);
        input.total = cents(1102);

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("items[0].total"));
        assert_eq!(
            errors.errors()[0].message,
            "Item total must equal quantity times cost"
        );
    }

    #[test]
    fn item_total_within_tolerance_is_accepted() {
        let mut input = purchase();
        input.items[0].total = cents(1001);
        input.subtotal = cents(1001);
        input.total = cents(1101);

        assert!(validate_create(InvoiceKind::Purchase, &input).is_ok());
    }

    #[test]
    fn total_must_equal_subtotal_plus_tax() {
        let mut input = purchase();
        input.total = cents(5000);

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("total"));
    }

    #[test]
    fn subtotal_must_match_items() {
        let mut input = purchase();
        input.subtotal = cents(900);
        input.total = cents(1000);

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("subtotal"));
    }

    #[test]
    fn stated_remaining_must_match() {
        let mut input = purchase();
        input.paid = cents(300);
        input.remaining = Some(cents(900));

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("remaining"));

        input.remaining = Some(cents(800));
        assert!(validate_create(InvoiceKind::Purchase, &input).is_ok());
    }

    #[test]
    fn overpayment_is_rejected() {
        let mut input = purchase();
        input.paid = cents(2000);

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("paid"));
    }

    #[test]
    fn update_checks_only_sent_fields() {
        let update = UpdateInvoice {
            total: Some(cents(1000)),
            ..Default::default()
        };
        assert!(validate_update(InvoiceKind::Purchase, &update).is_ok());

        let update = UpdateInvoice {
            total: Some(cents(1000)),
            subtotal: Some(cents(800)),
            tax: Some(cents(100)),
            ..Default::default()
        };
        let errors = validate_update(InvoiceKind::Purchase, &update).unwrap_err();
        assert!(errors.has_field("total"));
    }

    #[test]
    fn update_validates_items_when_sent() {
        let mut item = ItemInput::new(ProductId::new(), 2, cents(300));
        item.quantity = 0;
        let update = UpdateInvoice {
            items: Some(vec![item]),
            ..Default::default()
        };

        let errors = validate_update(InvoiceKind::Sale, &update).unwrap_err();
        assert!(errors.has_field("items[0].quantity"));
    }

    #[test]
    fn item_total_overflow_is_a_field_error() {
        let unit = cents(i64::MAX / 2 + 10);
        let mut item = ItemInput::new(ProductId::new(), 1, unit);
        item.quantity = 2;
        item.total = unit;
        let input = CreateInvoice {
            subtotal: unit,
            total: unit,
            items: vec![item],
            ..Default::default()
        }
        .supplier(SupplierId::new());

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("items[0].total"));
        assert!(
            errors
                .errors()
                .iter()
                .any(|e| e.message == "Item total is out of range")
        );
    }

    #[test]
    fn wrapped_item_total_is_not_accepted() {
        // 4 x (2^62 + 1) wraps to 4 in two's complement.
        let unit = cents((1 << 62) + 1);
        let mut item = ItemInput::new(ProductId::new(), 1, unit);
        item.quantity = 4;
        item.total = cents(4);
        let input = CreateInvoice {
            subtotal: cents(4),
            total: cents(4),
            items: vec![item],
            ..Default::default()
        }
        .supplier(SupplierId::new());

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("items[0].total"));
    }

    #[test]
    fn header_overflow_is_a_field_error() {
        let mut input = purchase();
        input.subtotal = cents(i64::MAX);
        input.tax = cents(5);
        input.total = cents(i64::MAX);

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("total"));
        assert!(errors.has_field("subtotal"));
    }

    #[test]
    fn overflowing_item_sum_is_a_field_error() {
        let unit = cents(i64::MAX - 1);
        let input = CreateInvoice {
            subtotal: unit,
            total: unit,
            items: vec![
                ItemInput::new(ProductId::new(), 1, unit),
                ItemInput::new(ProductId::new(), 1, unit),
            ],
            ..Default::default()
        }
        .supplier(SupplierId::new());

        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(
            errors
                .errors()
                .iter()
                .any(|e| e.field == "subtotal" && e.message == "Sum of item totals is out of range")
        );
    }

    #[test]
    fn counterpart_of_the_other_kind_is_rejected() {
        let input = purchase().customer("Alice");
        let errors = validate_create(InvoiceKind::Purchase, &input).unwrap_err();
        assert!(errors.has_field("customer_name"));

        let update = UpdateInvoice {
            supplier_id: Some(SupplierId::new()),
            ..Default::default()
        };
        let errors = validate_update(InvoiceKind::Sale, &update).unwrap_err();
        assert!(errors.has_field("supplier_id"));

        let update = UpdateInvoice {
            customer_name: Some("Alice".to_string()),
            ..Default::default()
        };
        let errors = validate_update(InvoiceKind::Purchase, &update).unwrap_err();
        assert!(errors.has_field("customer_name"));
    }
}
