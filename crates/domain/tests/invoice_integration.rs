//! Integration tests for the invoice service.
//!
//! These run the full create/update/delete paths against the in-memory ledger
//! store and check stock, payments and rollback behaviour.

use std::time::Duration;

use common::{InvoiceKind, Money, OwnerId, PaymentType, ProductId, SupplierId};
use domain::{
    CatalogService, CreateExpense, CreateInvoice, CreateProduct, CreateSupplier, DeletePolicy,
    DomainError, InvoiceService, InvoiceServiceConfig, ItemInput, UpdateExpense, UpdateInvoice,
    UpdateProduct, UpdateSupplier,
};
use ledger_store::{InMemoryLedgerStore, InvoiceQuery, LedgerStore, PaymentQuery, StoreError};

fn cents(value: i64) -> Money {
    Money::from_cents(value)
}

struct Fixture {
    store: InMemoryLedgerStore,
    invoices: InvoiceService<InMemoryLedgerStore>,
    catalog: CatalogService<InMemoryLedgerStore>,
    owner: OwnerId,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(InvoiceServiceConfig::default())
    }

    fn with_config(config: InvoiceServiceConfig) -> Self {
        let store = InMemoryLedgerStore::new();
        Self {
            invoices: InvoiceService::with_config(store.clone(), config),
            catalog: CatalogService::new(store.clone()),
            store,
            owner: OwnerId::new(),
        }
    }

    async fn product(&self, name: &str, stock: i64) -> ProductId {
        self.catalog
            .create_product(
                self.owner,
                CreateProduct {
                    name: name.to_string(),
                    code: None,
                    cost: cents(100),
                    price: cents(150),
                    sale_price: cents(200),
                    stock,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn supplier(&self) -> SupplierId {
        self.catalog
            .create_supplier(
                self.owner,
                CreateSupplier {
                    name: "Northwind".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn stock(&self, product_id: ProductId) -> i64 {
        self.store
            .get_product(self.owner, product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn payments(&self) -> Vec<ledger_store::Payment> {
        self.store.all_payments(self.owner).await.unwrap()
    }
}

mod create {
    use super::*;

    #[tokio::test]
    async fn purchase_increments_stock_and_records_payment() {
        let f = Fixture::new();
        let supplier = f.supplier().await;
        let product = f.product("Widget", 0).await;

        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 5, cents(200))],
            cents(100),
            cents(400),
        )
        .supplier(supplier);
        let invoice = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Purchase, input)
            .await
            .unwrap();

        assert_eq!(f.stock(product).await, 5);
        assert_eq!(invoice.subtotal, cents(1000));
        assert_eq!(invoice.total, cents(1100));
        assert_eq!(invoice.remaining, cents(700));
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.supplier_name.as_deref(), Some("Northwind"));

        let payments = f.payments().await;
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, cents(400));
        assert_eq!(payments[0].payment_type, PaymentType::SupplierPayment);
        assert_eq!(
            payments[0].link.map(|l| l.invoice_id()),
            Some(invoice.id)
        );
    }

    #[tokio::test]
    async fn sale_decrements_stock() {
        let f = Fixture::new();
        let product = f.product("Gadget", 10).await;

        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 3, cents(500))],
            cents(0),
            cents(0),
        )
        .customer("Alice Buyer");
        f.invoices
            .create_invoice(f.owner, InvoiceKind::Sale, input)
            .await
            .unwrap();

        assert_eq!(f.stock(product).await, 7);
        assert!(f.payments().await.is_empty());
    }

    #[tokio::test]
    async fn refetch_matches_payload() {
        let f = Fixture::new();
        let product = f.product("Gadget", 10).await;

        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 2, cents(750))],
            cents(150),
            cents(1650),
        )
        .customer("Bob")
        .notes("paid in full");
        let created = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Sale, input)
            .await
            .unwrap();

        let fetched = f
            .invoices
            .get_invoice(f.owner, InvoiceKind::Sale, created.id)
            .await
            .unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.total, fetched.subtotal + fetched.tax);
        assert_eq!(fetched.remaining, Money::zero());
        assert_eq!(fetched.items[0].total, cents(1500));
        assert_eq!(fetched.notes.as_deref(), Some("paid in full"));

        let linked = f
            .store
            .list_payments(f.owner, &PaymentQuery::new().invoice(created.id))
            .await
            .unwrap();
        assert_eq!(linked.total_count, 1);
        assert_eq!(linked.items[0].amount, cents(1650));
    }

    #[tokio::test]
    async fn missing_second_product_rolls_everything_back() {
        let f = Fixture::new();
        let supplier = f.supplier().await;
        let product = f.product("Widget", 0).await;

        let input = CreateInvoice::from_items(
            vec![
                ItemInput::new(product, 5, cents(100)),
                ItemInput::new(ProductId::new(), 1, cents(100)),
            ],
            cents(0),
            cents(600),
        )
        .supplier(supplier);
        let err = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Purchase, input)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { entity: "Product", .. }));
        assert_eq!(f.stock(product).await, 0);
        assert_eq!(f.store.invoice_count().await, 0);
        assert_eq!(f.store.item_count().await, 0);
        assert_eq!(f.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn failing_payment_insert_rolls_back_stock() {
        let f = Fixture::new();
        let supplier = f.supplier().await;
        let product = f.product("Widget", 0).await;
        f.store.set_fail_on_payment_insert(true);

        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 4, cents(100))],
            cents(0),
            cents(400),
        )
        .supplier(supplier);
        let err = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Purchase, input)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Transaction { .. }));
        assert!(
            err.to_string()
                .starts_with("Failed to create purchase invoice:")
        );
        assert_eq!(f.stock(product).await, 0);
        assert_eq!(f.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn mismatched_item_total_never_reaches_the_store() {
        let f = Fixture::new();
        let supplier = f.supplier().await;
        let product = f.product("Widget", 0).await;

        let mut item = ItemInput::new(product, 3, cents(100));
        item.total = cents(302);
        let input = CreateInvoice {
            supplier_id: Some(supplier),
            subtotal: cents(302),
            total: cents(302),
            items: vec![item],
            ..Default::default()
        };
        let err = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Purchase, input)
            .await
            .unwrap_err();

        match err {
            DomainError::Validation(errors) => assert!(errors.has_field("items[0].total")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(f.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn sale_beyond_stock_is_rejected_before_the_transaction() {
        let f = Fixture::new();
        let product = f.product("Gadget", 2).await;

        let input = CreateInvoice::from_items(
            vec![
                ItemInput::new(product, 1, cents(100)),
                ItemInput::new(product, 2, cents(100)),
            ],
            cents(0),
            cents(0),
        )
        .customer("Carol");
        let err = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Sale, input)
            .await
            .unwrap_err();

        match err {
            DomainError::Validation(errors) => {
                assert!(errors.has_field("items[0].quantity"));
                assert_eq!(
                    errors.errors()[0].message,
                    "Quantity cannot exceed available stock"
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(f.stock(product).await, 2);
    }

    #[tokio::test]
    async fn unknown_supplier_is_not_found() {
        let f = Fixture::new();
        let product = f.product("Widget", 0).await;

        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 1, cents(100))],
            cents(0),
            cents(0),
        )
        .supplier(SupplierId::new());
        let err = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Purchase, input)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { entity: "Supplier", .. }));
    }

    #[tokio::test]
    async fn slow_transaction_times_out_and_rolls_back() {
        let f = Fixture::with_config(InvoiceServiceConfig {
            transaction_timeout: Duration::from_millis(50),
            ..Default::default()
        });
        let product = f.product("Gadget", 10).await;
        f.store.set_write_delay(Duration::from_millis(40));

        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 1, cents(100))],
            cents(0),
            cents(100),
        )
        .customer("Dave");
        let err = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Sale, input)
            .await
            .unwrap_err();

        match err {
            DomainError::Transaction { operation, source } => {
                assert_eq!(operation, "create sale invoice");
                assert!(matches!(source, StoreError::Timeout(_)));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        f.store.set_write_delay(Duration::ZERO);
        assert_eq!(f.stock(product).await, 10);
        assert_eq!(f.store.invoice_count().await, 0);
    }
}

mod update {
    use super::*;

    async fn purchase(f: &Fixture, product: ProductId, quantity: u32, paid: i64) -> ledger_store::Invoice {
        let supplier = f.supplier().await;
        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, quantity, cents(100))],
            cents(0),
            cents(paid),
        )
        .supplier(supplier);
        f.invoices
            .create_invoice(f.owner, InvoiceKind::Purchase, input)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn payment_changes_are_recorded_as_deltas() {
        let f = Fixture::new();
        let product = f.product("Widget", 0).await;
        let invoice = purchase(&f, product, 5, 100).await;

        let updated = f
            .invoices
            .update_invoice(
                f.owner,
                InvoiceKind::Purchase,
                invoice.id,
                UpdateInvoice::default().paid(cents(150)),
            )
            .await
            .unwrap();
        assert_eq!(updated.paid, cents(150));
        assert_eq!(updated.remaining, cents(350));

        f.invoices
            .update_invoice(
                f.owner,
                InvoiceKind::Purchase,
                invoice.id,
                UpdateInvoice::default().paid(cents(100)),
            )
            .await
            .unwrap();

        let mut amounts: Vec<i64> = f.payments().await.iter().map(|p| p.amount.cents()).collect();
        amounts.sort();
        assert_eq!(amounts, vec![-50, 50, 100]);
    }

    #[tokio::test]
    async fn unchanged_paid_records_no_payment() {
        let f = Fixture::new();
        let product = f.product("Widget", 0).await;
        let invoice = purchase(&f, product, 5, 100).await;

        f.invoices
            .update_invoice(
                f.owner,
                InvoiceKind::Purchase,
                invoice.id,
                UpdateInvoice {
                    notes: Some("checked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(f.payments().await.len(), 1);
        assert_eq!(f.stock(product).await, 5);
    }

    #[tokio::test]
    async fn removing_a_purchase_item_takes_its_stock_back() {
        let f = Fixture::new();
        let widget = f.product("Widget", 0).await;
        let gadget = f.product("Gadget", 0).await;
        let invoice = purchase(&f, widget, 5, 0).await;

        // Replace the widget line with a gadget line.
        let update = UpdateInvoice::default()
            .with_items(vec![ItemInput::new(gadget, 2, cents(100))], cents(0));
        let updated = f
            .invoices
            .update_invoice(f.owner, InvoiceKind::Purchase, invoice.id, update)
            .await
            .unwrap();

        assert_eq!(f.stock(widget).await, 0);
        assert_eq!(f.stock(gadget).await, 2);
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].product_id, gadget);
        assert_eq!(updated.total, cents(200));
        assert_eq!(updated.remaining, cents(200));
    }

    #[tokio::test]
    async fn shrinking_a_sale_line_restores_stock() {
        let f = Fixture::new();
        let product = f.product("Gadget", 10).await;
        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 3, cents(500))],
            cents(0),
            cents(0),
        )
        .customer("Erin");
        let invoice = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Sale, input)
            .await
            .unwrap();
        assert_eq!(f.stock(product).await, 7);

        let line = &invoice.items[0];
        let update = UpdateInvoice::default().with_items(
            vec![ItemInput::existing(line.id, product, 1, cents(500))],
            cents(0),
        );
        let updated = f
            .invoices
            .update_invoice(f.owner, InvoiceKind::Sale, invoice.id, update)
            .await
            .unwrap();

        assert_eq!(f.stock(product).await, 9);
        assert_eq!(updated.items[0].id, line.id);
        assert_eq!(updated.items[0].quantity, 1);
        assert_eq!(updated.subtotal, cents(500));
    }

    #[tokio::test]
    async fn missing_invoice_is_not_found() {
        let f = Fixture::new();
        let err = f
            .invoices
            .update_invoice(
                f.owner,
                InvoiceKind::Sale,
                common::InvoiceId::new(),
                UpdateInvoice::default().paid(cents(10)),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::NotFound {
                entity: "Sale invoice",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn other_owners_cannot_update() {
        let f = Fixture::new();
        let product = f.product("Widget", 0).await;
        let invoice = purchase(&f, product, 1, 0).await;

        let err = f
            .invoices
            .update_invoice(
                OwnerId::new(),
                InvoiceKind::Purchase,
                invoice.id,
                UpdateInvoice::default().paid(cents(10)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(f.payments().await.len(), 0);
    }

    #[tokio::test]
    async fn failed_update_leaves_items_and_stock_untouched() {
        let f = Fixture::new();
        let product = f.product("Widget", 0).await;
        let invoice = purchase(&f, product, 5, 0).await;
        f.store.set_fail_on_payment_insert(true);

        let line = &invoice.items[0];
        let update = UpdateInvoice::default()
            .with_items(
                vec![ItemInput::existing(line.id, product, 8, cents(100))],
                cents(0),
            )
            .paid(cents(100));
        let err = f
            .invoices
            .update_invoice(f.owner, InvoiceKind::Purchase, invoice.id, update)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Failed to update purchase invoice:"));
        assert_eq!(f.stock(product).await, 5);
        let stored = f
            .invoices
            .get_invoice(f.owner, InvoiceKind::Purchase, invoice.id)
            .await
            .unwrap();
        assert_eq!(stored, invoice);
    }
}

mod delete {
    use super::*;

    async fn sale(f: &Fixture, product: ProductId, paid: i64) -> ledger_store::Invoice {
        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 4, cents(100))],
            cents(0),
            cents(paid),
        )
        .customer("Frank");
        f.invoices
            .create_invoice(f.owner, InvoiceKind::Sale, input)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn default_policy_keeps_stock_and_payments() {
        let f = Fixture::new();
        let product = f.product("Gadget", 10).await;
        let invoice = sale(&f, product, 400).await;

        f.invoices
            .delete_invoice(f.owner, InvoiceKind::Sale, invoice.id)
            .await
            .unwrap();

        assert_eq!(f.stock(product).await, 6);
        assert_eq!(f.store.invoice_count().await, 0);
        assert_eq!(f.store.item_count().await, 0);
        let payments = f.payments().await;
        assert_eq!(payments.len(), 1);
        assert!(payments[0].link.is_none());
    }

    #[tokio::test]
    async fn reverse_stock_policy_returns_sold_stock() {
        let f = Fixture::with_config(InvoiceServiceConfig {
            delete_policy: DeletePolicy::ReverseStock,
            ..Default::default()
        });
        let product = f.product("Gadget", 10).await;
        let invoice = sale(&f, product, 0).await;

        f.invoices
            .delete_invoice(f.owner, InvoiceKind::Sale, invoice.id)
            .await
            .unwrap();

        assert_eq!(f.stock(product).await, 10);
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let f = Fixture::new();
        let product = f.product("Gadget", 10).await;
        let invoice = sale(&f, product, 0).await;

        f.invoices
            .delete_invoice(f.owner, InvoiceKind::Sale, invoice.id)
            .await
            .unwrap();
        let err = f
            .invoices
            .delete_invoice(f.owner, InvoiceKind::Sale, invoice.id)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::NotFound {
                entity: "Sale invoice",
                ..
            }
        ));
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn list_is_scoped_to_owner_and_kind() {
        let f = Fixture::new();
        let product = f.product("Gadget", 100).await;
        for name in ["Alice", "Bob", "Alicia"] {
            let input = CreateInvoice::from_items(
                vec![ItemInput::new(product, 1, cents(100))],
                cents(0),
                cents(0),
            )
            .customer(name);
            f.invoices
                .create_invoice(f.owner, InvoiceKind::Sale, input)
                .await
                .unwrap();
        }

        let page = f
            .invoices
            .list_invoices(f.owner, InvoiceKind::Sale, &InvoiceQuery::new().search("ali"))
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);

        let purchases = f
            .invoices
            .list_invoices(f.owner, InvoiceKind::Purchase, &InvoiceQuery::new())
            .await
            .unwrap();
        assert_eq!(purchases.total_count, 0);

        let foreign = f
            .invoices
            .list_invoices(OwnerId::new(), InvoiceKind::Sale, &InvoiceQuery::new())
            .await
            .unwrap();
        assert!(foreign.items.is_empty());
    }
}

mod catalog {
    use super::*;

    #[tokio::test]
    async fn deleting_supplier_takes_its_purchases_but_not_the_stock() {
        let f = Fixture::new();
        let supplier = f.supplier().await;
        let product = f.product("Widget", 0).await;

        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 4, cents(200))],
            cents(0),
            cents(300),
        )
        .supplier(supplier);
        let purchase = f
            .invoices
            .create_invoice(f.owner, InvoiceKind::Purchase, input)
            .await
            .unwrap();
        assert_eq!(f.stock(product).await, 4);

        let removed = f.catalog.delete_supplier(f.owner, supplier).await.unwrap();
        assert_eq!(removed, 1);

        let gone = f
            .invoices
            .get_invoice(f.owner, InvoiceKind::Purchase, purchase.id)
            .await;
        assert!(matches!(gone, Err(DomainError::NotFound { .. })));
        assert_eq!(f.stock(product).await, 4);

        let payments = f.payments().await;
        assert_eq!(payments.len(), 1);
        assert!(payments[0].link.is_none());

        let again = f.catalog.delete_supplier(f.owner, supplier).await;
        assert!(matches!(
            again,
            Err(DomainError::NotFound {
                entity: "Supplier",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn product_on_an_invoice_is_in_use() {
        let f = Fixture::new();
        let product = f.product("Gadget", 5).await;
        let input = CreateInvoice::from_items(
            vec![ItemInput::new(product, 1, cents(500))],
            cents(0),
            cents(0),
        )
        .customer("Walk-in");
        f.invoices
            .create_invoice(f.owner, InvoiceKind::Sale, input)
            .await
            .unwrap();

        let err = f.catalog.delete_product(f.owner, product).await.unwrap_err();
        assert!(matches!(err, DomainError::InUse { entity: "Product", .. }));

        let spare = f.product("Spare part", 0).await;
        f.catalog.delete_product(f.owner, spare).await.unwrap();
        assert!(matches!(
            f.catalog.get_product(f.owner, spare).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn product_update_validates_and_applies_sent_fields() {
        let f = Fixture::new();
        let product = f.product("Gadget", 5).await;

        let err = f
            .catalog
            .update_product(
                f.owner,
                product,
                UpdateProduct {
                    stock: Some(-1),
                    cost: Some(cents(0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        match err {
            DomainError::Validation(errors) => {
                assert!(errors.has_field("stock"));
                assert!(errors.has_field("cost"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let updated = f
            .catalog
            .update_product(
                f.owner,
                product,
                UpdateProduct {
                    name: Some("  Gadget Pro ".to_string()),
                    code: Some("GDG-2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Gadget Pro");
        assert_eq!(updated.code.as_deref(), Some("GDG-2"));
        assert_eq!(updated.stock, 5);
        assert_eq!(updated.cost, cents(100));
    }

    #[tokio::test]
    async fn supplier_update_clears_blank_fields() {
        let f = Fixture::new();
        let supplier = f
            .catalog
            .create_supplier(
                f.owner,
                CreateSupplier {
                    name: "Initech".to_string(),
                    phone: Some("555-0199".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = f
            .catalog
            .update_supplier(
                f.owner,
                supplier.id,
                UpdateSupplier {
                    phone: Some("  ".to_string()),
                    city: Some("Austin".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Initech");
        assert_eq!(updated.phone, None);
        assert_eq!(updated.city.as_deref(), Some("Austin"));

        let bad = f
            .catalog
            .update_supplier(
                f.owner,
                supplier.id,
                UpdateSupplier {
                    email: Some("nobody".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(bad, Err(DomainError::Validation(ref e)) if e.has_field("email")));
    }

    #[tokio::test]
    async fn expense_update_only_sets_sent_fields() {
        let f = Fixture::new();
        let expense = f
            .catalog
            .create_expense(
                f.owner,
                CreateExpense {
                    name: "Rent".to_string(),
                    category: "Office".to_string(),
                    amount: cents(50_000),
                    notes: Some("March".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let rejected = f
            .catalog
            .update_expense(
                f.owner,
                expense.id,
                UpdateExpense {
                    amount: Some(cents(0)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(rejected, Err(DomainError::Validation(ref e)) if e.has_field("amount")));

        let updated = f
            .catalog
            .update_expense(
                f.owner,
                expense.id,
                UpdateExpense {
                    amount: Some(cents(52_500)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.amount, cents(52_500));
        assert_eq!(updated.name, "Rent");
        assert_eq!(updated.notes.as_deref(), Some("March"));
        assert_eq!(
            f.catalog.get_expense(f.owner, expense.id).await.unwrap(),
            updated
        );

        f.catalog.delete_expense(f.owner, expense.id).await.unwrap();
        assert!(matches!(
            f.catalog.get_expense(f.owner, expense.id).await,
            Err(DomainError::NotFound {
                entity: "Expense",
                ..
            })
        ));
    }
}

