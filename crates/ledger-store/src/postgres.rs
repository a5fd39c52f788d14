use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    ExpenseId, InvoiceId, InvoiceKind, ItemId, Money, OwnerId, PaymentId, PaymentType, ProductId,
    SupplierId,
};
use sqlx::{
    PgConnection, PgPool, Postgres, Row,
    postgres::{PgArguments, PgPoolOptions, PgRow},
    query::Query,
};
use uuid::Uuid;

use crate::{
    Counterpart, Expense, ExpenseChanges, Invoice, InvoiceChanges, InvoiceQuery, InvoiceSummary,
    ItemValues, LineItem, ListQuery, NewExpense, NewInvoice, NewPayment, NewProduct, NewSupplier,
    Page, Payment, PaymentLink, PaymentQuery, Product, ProductChanges, Result, StoreError,
    Supplier, SupplierChanges,
    store::{LedgerStore, LedgerTransaction},
};

const INVOICE_SELECT: &str = r#"
    SELECT i.id, i.owner_id, i.kind, i.date, i.supplier_id, s.name AS supplier_name,
           i.customer_name, i.subtotal, i.tax, i.total, i.paid, i.remaining, i.notes,
           i.created_at, i.updated_at
    FROM invoices i
    LEFT JOIN suppliers s ON s.id = i.supplier_id
"#;

const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, code, cost, price, sale_price, stock, created_at";

const SUPPLIER_COLUMNS: &str =
    "id, owner_id, name, phone, email, address, city, company_name, notes, created_at";

const PAYMENT_COLUMNS: &str = "id, owner_id, amount, payment_type, date, purchase_invoice_id, sale_invoice_id, notes, created_at";

const EXPENSE_COLUMNS: &str = "id, owner_id, name, category, amount, date, notes, created_at";

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::debug!(max_connections, "connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::debug!("ledger migrations applied");
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidData(message.into())
}

fn quantity_from_column(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid(format!("quantity out of range: {value}")))
}

/// Escapes LIKE metacharacters and wraps the needle for a substring match.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some("unique_supplier_name") => {
                return StoreError::Conflict {
                    field: "name".to_string(),
                };
            }
            Some("unique_product_code") => {
                return StoreError::Conflict {
                    field: "code".to_string(),
                };
            }
            Some(other) if db_err.is_unique_violation() => {
                return StoreError::Conflict {
                    field: other.to_string(),
                };
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn row_to_invoice_header(row: &PgRow) -> Result<Invoice> {
    let kind: InvoiceKind = row
        .try_get::<String, _>("kind")?
        .parse()
        .map_err(invalid)?;

    let counterpart = match kind {
        InvoiceKind::Purchase => {
            let supplier_id: Option<Uuid> = row.try_get("supplier_id")?;
            Counterpart::Supplier(SupplierId::from_uuid(
                supplier_id.ok_or_else(|| invalid("purchase invoice without supplier"))?,
            ))
        }
        InvoiceKind::Sale => {
            let customer_name: Option<String> = row.try_get("customer_name")?;
            Counterpart::Customer(
                customer_name.ok_or_else(|| invalid("sale invoice without customer"))?,
            )
        }
    };

    Ok(Invoice {
        id: InvoiceId::from_uuid(row.try_get("id")?),
        owner_id: OwnerId::from_uuid(row.try_get("owner_id")?),
        kind,
        date: row.try_get("date")?,
        counterpart,
        supplier_name: row.try_get("supplier_name")?,
        subtotal: Money::from_cents(row.try_get("subtotal")?),
        tax: Money::from_cents(row.try_get("tax")?),
        total: Money::from_cents(row.try_get("total")?),
        paid: Money::from_cents(row.try_get("paid")?),
        remaining: Money::from_cents(row.try_get("remaining")?),
        notes: row.try_get("notes")?,
        items: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<LineItem> {
    Ok(LineItem {
        id: ItemId::from_uuid(row.try_get("id")?),
        invoice_id: InvoiceId::from_uuid(row.try_get("invoice_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: quantity_from_column(row.try_get("quantity")?)?,
        unit_amount: Money::from_cents(row.try_get("unit_amount")?),
        total: Money::from_cents(row.try_get("total")?),
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        owner_id: OwnerId::from_uuid(row.try_get("owner_id")?),
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        cost: Money::from_cents(row.try_get("cost")?),
        price: Money::from_cents(row.try_get("price")?),
        sale_price: Money::from_cents(row.try_get("sale_price")?),
        stock: row.try_get("stock")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_supplier(row: &PgRow) -> Result<Supplier> {
    Ok(Supplier {
        id: SupplierId::from_uuid(row.try_get("id")?),
        owner_id: OwnerId::from_uuid(row.try_get("owner_id")?),
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        company_name: row.try_get("company_name")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_payment(row: &PgRow) -> Result<Payment> {
    let payment_type: PaymentType = row
        .try_get::<String, _>("payment_type")?
        .parse()
        .map_err(invalid)?;
    let purchase: Option<Uuid> = row.try_get("purchase_invoice_id")?;
    let sale: Option<Uuid> = row.try_get("sale_invoice_id")?;
    let link = match (purchase, sale) {
        (Some(id), _) => Some(PaymentLink::PurchaseInvoice(InvoiceId::from_uuid(id))),
        (None, Some(id)) => Some(PaymentLink::SaleInvoice(InvoiceId::from_uuid(id))),
        (None, None) => None,
    };

    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get("id")?),
        owner_id: OwnerId::from_uuid(row.try_get("owner_id")?),
        amount: Money::from_cents(row.try_get("amount")?),
        payment_type,
        date: row.try_get("date")?,
        link,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_expense(row: &PgRow) -> Result<Expense> {
    Ok(Expense {
        id: ExpenseId::from_uuid(row.try_get("id")?),
        owner_id: OwnerId::from_uuid(row.try_get("owner_id")?),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        amount: Money::from_cents(row.try_get("amount")?),
        date: row.try_get("date")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Loads the items of the given invoices, grouped by invoice in insertion order.
async fn fetch_items(
    conn: &mut PgConnection,
    invoice_ids: &[Uuid],
) -> Result<HashMap<InvoiceId, Vec<LineItem>>> {
    let rows = sqlx::query(
        r#"
        SELECT it.id, it.invoice_id, it.product_id, p.name AS product_name,
               it.quantity, it.unit_amount, it.total
        FROM invoice_items it
        LEFT JOIN products p ON p.id = it.product_id
        WHERE it.invoice_id = ANY($1)
        ORDER BY it.seq ASC
        "#,
    )
    .bind(invoice_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<InvoiceId, Vec<LineItem>> = HashMap::new();
    for row in &rows {
        let item = row_to_item(row)?;
        grouped.entry(item.invoice_id).or_default().push(item);
    }
    Ok(grouped)
}

async fn fetch_invoice(
    conn: &mut PgConnection,
    owner_id: OwnerId,
    kind: InvoiceKind,
    id: InvoiceId,
    lock: bool,
) -> Result<Option<Invoice>> {
    let sql = format!(
        "{INVOICE_SELECT} WHERE i.id = $1 AND i.owner_id = $2 AND i.kind = $3{}",
        if lock { " FOR UPDATE OF i" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut invoice = row_to_invoice_header(&row)?;
    let mut items = fetch_items(conn, &[id.as_uuid()]).await?;
    invoice.items = items.remove(&id).unwrap_or_default();
    Ok(Some(invoice))
}

async fn require_supplier(
    conn: &mut PgConnection,
    owner_id: OwnerId,
    supplier_id: SupplierId,
) -> Result<()> {
    let exists: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM suppliers WHERE id = $1 AND owner_id = $2")
            .bind(supplier_id.as_uuid())
            .bind(owner_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
    exists
        .map(|_| ())
        .ok_or_else(|| StoreError::not_found("Supplier", supplier_id))
}

async fn require_product(
    conn: &mut PgConnection,
    owner_id: OwnerId,
    product_id: ProductId,
) -> Result<()> {
    let exists: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM products WHERE id = $1 AND owner_id = $2")
            .bind(product_id.as_uuid())
            .bind(owner_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
    exists
        .map(|_| ())
        .ok_or_else(|| StoreError::not_found("Product", product_id))
}

/// Binds the parameters referenced by the WHERE clause built in `list_invoices`,
/// in the same order.
fn bind_invoice_filters<'q>(
    mut sql_query: Query<'q, Postgres, PgArguments>,
    owner_id: OwnerId,
    kind: InvoiceKind,
    query: &InvoiceQuery,
    pattern: Option<String>,
) -> Query<'q, Postgres, PgArguments> {
    sql_query = sql_query.bind(owner_id.as_uuid()).bind(kind.as_str());
    if let Some(pattern) = pattern {
        sql_query = sql_query.bind(pattern);
    }
    if let Some(supplier_id) = query.supplier_id {
        sql_query = sql_query.bind(supplier_id.as_uuid());
    }
    if let Some(from) = query.date_from {
        sql_query = sql_query.bind(from);
    }
    if let Some(to) = query.date_to {
        sql_query = sql_query.bind(to);
    }
    sql_query
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn get_invoice(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        fetch_invoice(&mut conn, owner_id, kind, id, false).await
    }

    async fn list_invoices(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        query: &InvoiceQuery,
    ) -> Result<Page<Invoice>> {
        let mut conditions = vec![
            "i.owner_id = $1".to_string(),
            "i.kind = $2".to_string(),
        ];
        let mut param_count = 2;

        let pattern = query.search.as_deref().map(like_pattern);
        if pattern.is_some() {
            param_count += 1;
            conditions.push(format!(
                "(i.notes ILIKE ${param_count} OR s.name ILIKE ${param_count} OR i.customer_name ILIKE ${param_count})"
            ));
        }
        if query.supplier_id.is_some() {
            param_count += 1;
            conditions.push(format!("i.supplier_id = ${param_count}"));
        }
        if query.date_from.is_some() {
            param_count += 1;
            conditions.push(format!("i.date >= ${param_count}"));
        }
        if query.date_to.is_some() {
            param_count += 1;
            conditions.push(format!("i.date <= ${param_count}"));
        }
        if query.outstanding_only {
            conditions.push("i.remaining > 0".to_string());
        }
        let where_clause = conditions.join(" AND ");

        let count_sql = format!(
            "SELECT COUNT(*) FROM invoices i LEFT JOIN suppliers s ON s.id = i.supplier_id WHERE {where_clause}"
        );
        let direction = query.sort_order.as_sql();
        let list_sql = format!(
            "{INVOICE_SELECT} WHERE {where_clause} ORDER BY i.{} {direction}, i.seq {direction} LIMIT {} OFFSET {}",
            query.sort_by.column(),
            query.paging.limit(),
            query.paging.offset(),
        );

        let mut conn = self.pool.acquire().await?;

        let total_count: i64 = bind_invoice_filters(
            sqlx::query(&count_sql),
            owner_id,
            kind,
            query,
            pattern.clone(),
        )
        .fetch_one(&mut *conn)
        .await?
        .try_get(0)?;

        let rows = bind_invoice_filters(sqlx::query(&list_sql), owner_id, kind, query, pattern)
            .fetch_all(&mut *conn)
            .await?;

        let mut invoices = rows
            .iter()
            .map(row_to_invoice_header)
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<Uuid> = invoices.iter().map(|i| i.id.as_uuid()).collect();
        let mut items = fetch_items(&mut conn, &ids).await?;
        for invoice in &mut invoices {
            invoice.items = items.remove(&invoice.id).unwrap_or_default();
        }

        Ok(Page::new(invoices, total_count as u64, query.paging))
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let sql = format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(product.owner_id.as_uuid())
            .bind(&product.name)
            .bind(&product.code)
            .bind(product.cost.cents())
            .bind(product.price.cents())
            .bind(product.sale_price.cents())
            .bind(product.stock)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        row_to_product(&row)
    }

    async fn get_product(&self, owner_id: OwnerId, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND owner_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn get_products(&self, owner_id: OwnerId, ids: &[ProductId]) -> Result<Vec<Product>> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id = $1 AND id = ANY($2)");
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(&sql)
            .bind(owner_id.as_uuid())
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn list_products(&self, owner_id: OwnerId, query: &ListQuery) -> Result<Page<Product>> {
        let filter = "owner_id = $1 AND ($2::text IS NULL OR name ILIKE $2 OR code ILIKE $2)";
        let pattern = query.search.as_deref().map(like_pattern);

        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products WHERE {filter}"))
                .bind(owner_id.as_uuid())
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {filter} ORDER BY created_at DESC, id LIMIT $3 OFFSET $4"
        ))
        .bind(owner_id.as_uuid())
        .bind(&pattern)
        .bind(query.paging.limit() as i64)
        .bind(query.paging.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_product).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total_count as u64, query.paging))
    }

    async fn update_product(
        &self,
        owner_id: OwnerId,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND owner_id = $2 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("Product", id))?;

        let mut product = row_to_product(&row)?;
        changes.apply(&mut product);

        sqlx::query(
            r#"
            UPDATE products
            SET name = $3, code = $4, cost = $5, price = $6, sale_price = $7, stock = $8
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(&product.name)
        .bind(&product.code)
        .bind(product.cost.cents())
        .bind(product.price.cents())
        .bind(product.sale_price.cents())
        .bind(product.stock)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, owner_id: OwnerId, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND owner_id = $2")
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    StoreError::InUse {
                        entity: "Product",
                        id: id.to_string(),
                    }
                }
                err => StoreError::Database(err),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }
        Ok(())
    }

    async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier> {
        let sql = format!(
            "INSERT INTO suppliers ({SUPPLIER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {SUPPLIER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(supplier.owner_id.as_uuid())
            .bind(&supplier.name)
            .bind(&supplier.phone)
            .bind(&supplier.email)
            .bind(&supplier.address)
            .bind(&supplier.city)
            .bind(&supplier.company_name)
            .bind(&supplier.notes)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        row_to_supplier(&row)
    }

    async fn get_supplier(&self, owner_id: OwnerId, id: SupplierId) -> Result<Option<Supplier>> {
        let sql =
            format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1 AND owner_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_supplier).transpose()
    }

    async fn list_suppliers(
        &self,
        owner_id: OwnerId,
        query: &ListQuery,
    ) -> Result<Page<Supplier>> {
        let filter = "owner_id = $1 AND ($2::text IS NULL OR name ILIKE $2 OR company_name ILIKE $2)";
        let pattern = query.search.as_deref().map(like_pattern);

        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM suppliers WHERE {filter}"))
                .bind(owner_id.as_uuid())
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE {filter} ORDER BY created_at DESC, id LIMIT $3 OFFSET $4"
        ))
        .bind(owner_id.as_uuid())
        .bind(&pattern)
        .bind(query.paging.limit() as i64)
        .bind(query.paging.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_supplier).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total_count as u64, query.paging))
    }

    async fn count_suppliers(&self, owner_id: OwnerId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn update_supplier(
        &self,
        owner_id: OwnerId,
        id: SupplierId,
        changes: &SupplierChanges,
    ) -> Result<Supplier> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1 AND owner_id = $2 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("Supplier", id))?;

        let mut supplier = row_to_supplier(&row)?;
        changes.apply(&mut supplier);

        sqlx::query(
            r#"
            UPDATE suppliers
            SET name = $3, phone = $4, email = $5, address = $6, city = $7,
                company_name = $8, notes = $9
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(&supplier.city)
        .bind(&supplier.company_name)
        .bind(&supplier.notes)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;
        Ok(supplier)
    }

    async fn delete_supplier(&self, owner_id: OwnerId, id: SupplierId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM suppliers WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("Supplier", id));
        }

        // Items cascade; payment links are cleared by ON DELETE SET NULL.
        let invoices = sqlx::query(
            "DELETE FROM invoices WHERE owner_id = $1 AND kind = 'purchase' AND supplier_id = $2",
        )
        .bind(owner_id.as_uuid())
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM suppliers WHERE id = $1 AND owner_id = $2")
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(invoices.rows_affected())
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let sql = format!(
            "INSERT INTO expenses ({EXPENSE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {EXPENSE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(expense.owner_id.as_uuid())
            .bind(&expense.name)
            .bind(&expense.category)
            .bind(expense.amount.cents())
            .bind(expense.date)
            .bind(&expense.notes)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        row_to_expense(&row)
    }

    async fn list_expenses(&self, owner_id: OwnerId, query: &ListQuery) -> Result<Page<Expense>> {
        let filter = "owner_id = $1 AND ($2::text IS NULL OR name ILIKE $2 OR category ILIKE $2)";
        let pattern = query.search.as_deref().map(like_pattern);

        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM expenses WHERE {filter}"))
                .bind(owner_id.as_uuid())
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE {filter} ORDER BY date DESC, seq DESC LIMIT $3 OFFSET $4"
        ))
        .bind(owner_id.as_uuid())
        .bind(&pattern)
        .bind(query.paging.limit() as i64)
        .bind(query.paging.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_expense).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total_count as u64, query.paging))
    }

    async fn get_expense(&self, owner_id: OwnerId, id: ExpenseId) -> Result<Option<Expense>> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND owner_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_expense).transpose()
    }

    async fn update_expense(
        &self,
        owner_id: OwnerId,
        id: ExpenseId,
        changes: &ExpenseChanges,
    ) -> Result<Expense> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND owner_id = $2 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("Expense", id))?;

        let mut expense = row_to_expense(&row)?;
        changes.apply(&mut expense);

        sqlx::query(
            r#"
            UPDATE expenses
            SET name = $3, category = $4, amount = $5, date = $6, notes = $7
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(&expense.name)
        .bind(&expense.category)
        .bind(expense.amount.cents())
        .bind(expense.date)
        .bind(&expense.notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(expense)
    }

    async fn delete_expense(&self, owner_id: OwnerId, id: ExpenseId) -> Result<()> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND owner_id = $2")
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Expense", id));
        }
        Ok(())
    }

    async fn all_expenses(&self, owner_id: OwnerId) -> Result<Vec<Expense>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE owner_id = $1 ORDER BY date DESC, seq DESC"
        ))
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_expense).collect()
    }

    async fn get_payment(&self, owner_id: OwnerId, id: PaymentId) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND owner_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn list_payments(
        &self,
        owner_id: OwnerId,
        query: &PaymentQuery,
    ) -> Result<Page<Payment>> {
        let filter = r#"owner_id = $1
            AND ($2::text IS NULL OR payment_type = $2)
            AND ($3::uuid IS NULL OR purchase_invoice_id = $3 OR sale_invoice_id = $3)"#;
        let payment_type = query.payment_type.map(|ty| ty.as_str());
        let invoice_id = query.invoice_id.map(|id| id.as_uuid());

        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM payments WHERE {filter}"))
                .bind(owner_id.as_uuid())
                .bind(payment_type)
                .bind(invoice_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {filter} ORDER BY date DESC, seq DESC LIMIT $4 OFFSET $5"
        ))
        .bind(owner_id.as_uuid())
        .bind(payment_type)
        .bind(invoice_id)
        .bind(query.paging.limit() as i64)
        .bind(query.paging.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_payment).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total_count as u64, query.paging))
    }

    async fn all_payments(&self, owner_id: OwnerId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE owner_id = $1 ORDER BY date DESC, seq DESC"
        ))
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_payment).collect()
    }

    async fn invoice_summaries(
        &self,
        owner_id: OwnerId,
        kind: InvoiceKind,
    ) -> Result<Vec<InvoiceSummary>> {
        let rows = sqlx::query(
            "SELECT total, paid, remaining FROM invoices WHERE owner_id = $1 AND kind = $2",
        )
        .bind(owner_id.as_uuid())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(InvoiceSummary {
                    total: Money::from_cents(row.try_get("total")?),
                    paid: Money::from_cents(row.try_get("paid")?),
                    remaining: Money::from_cents(row.try_get("remaining")?),
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// An open PostgreSQL transaction. Dropping it without committing rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresTransaction {
    async fn find_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<Option<Invoice>> {
        fetch_invoice(&mut self.tx, owner_id, kind, id, true).await
    }

    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> Result<InvoiceId> {
        if let Counterpart::Supplier(supplier_id) = invoice.counterpart {
            require_supplier(&mut self.tx, invoice.owner_id, supplier_id).await?;
        }

        let id = InvoiceId::new();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO invoices (id, owner_id, kind, date, supplier_id, customer_name,
                                  subtotal, tax, total, paid, remaining, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            "#,
        )
        .bind(id.as_uuid())
        .bind(invoice.owner_id.as_uuid())
        .bind(invoice.kind.as_str())
        .bind(invoice.date)
        .bind(invoice.counterpart.supplier_id().map(|s| s.as_uuid()))
        .bind(invoice.counterpart.customer_name())
        .bind(invoice.subtotal.cents())
        .bind(invoice.tax.cents())
        .bind(invoice.total.cents())
        .bind(invoice.paid.cents())
        .bind(invoice.remaining.cents())
        .bind(&invoice.notes)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(id)
    }

    async fn update_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
        changes: &InvoiceChanges,
    ) -> Result<()> {
        if let Some(Counterpart::Supplier(supplier_id)) = changes.counterpart {
            require_supplier(&mut self.tx, owner_id, supplier_id).await?;
        }

        let counterpart = changes.counterpart.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                date = COALESCE($4, date),
                subtotal = COALESCE($5, subtotal),
                tax = COALESCE($6, tax),
                total = COALESCE($7, total),
                paid = COALESCE($8, paid),
                remaining = COALESCE($9, remaining),
                notes = COALESCE($10, notes),
                supplier_id = CASE WHEN $11::boolean THEN $12 ELSE supplier_id END,
                customer_name = CASE WHEN $11::boolean THEN $13 ELSE customer_name END,
                updated_at = $14
            WHERE id = $1 AND owner_id = $2 AND kind = $3
            "#,
        )
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(kind.as_str())
        .bind(changes.date)
        .bind(changes.subtotal.map(|m| m.cents()))
        .bind(changes.tax.map(|m| m.cents()))
        .bind(changes.total.map(|m| m.cents()))
        .bind(changes.paid.map(|m| m.cents()))
        .bind(changes.remaining.map(|m| m.cents()))
        .bind(&changes.notes)
        .bind(counterpart.is_some())
        .bind(counterpart.and_then(|c| c.supplier_id()).map(|s| s.as_uuid()))
        .bind(counterpart.and_then(|c| c.customer_name()))
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Invoice", id));
        }
        Ok(())
    }

    async fn delete_invoice(
        &mut self,
        owner_id: OwnerId,
        kind: InvoiceKind,
        id: InvoiceId,
    ) -> Result<()> {
        // Items cascade; payment links are cleared by ON DELETE SET NULL.
        let result =
            sqlx::query("DELETE FROM invoices WHERE id = $1 AND owner_id = $2 AND kind = $3")
                .bind(id.as_uuid())
                .bind(owner_id.as_uuid())
                .bind(kind.as_str())
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Invoice", id));
        }
        Ok(())
    }

    async fn insert_item(
        &mut self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        values: &ItemValues,
    ) -> Result<ItemId> {
        require_product(&mut self.tx, owner_id, values.product_id).await?;

        let id = ItemId::new();
        sqlx::query(
            r#"
            INSERT INTO invoice_items (id, invoice_id, product_id, quantity, unit_amount, total)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id.as_uuid())
        .bind(invoice_id.as_uuid())
        .bind(values.product_id.as_uuid())
        .bind(i64::from(values.quantity))
        .bind(values.unit_amount.cents())
        .bind(values.total.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(id)
    }

    async fn update_item(
        &mut self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        item_id: ItemId,
        values: &ItemValues,
    ) -> Result<()> {
        require_product(&mut self.tx, owner_id, values.product_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE invoice_items
            SET product_id = $3, quantity = $4, unit_amount = $5, total = $6
            WHERE id = $1 AND invoice_id = $2
            "#,
        )
        .bind(item_id.as_uuid())
        .bind(invoice_id.as_uuid())
        .bind(values.product_id.as_uuid())
        .bind(i64::from(values.quantity))
        .bind(values.unit_amount.cents())
        .bind(values.total.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Invoice item", item_id));
        }
        Ok(())
    }

    async fn delete_item(&mut self, invoice_id: InvoiceId, item_id: ItemId) -> Result<()> {
        let result = sqlx::query("DELETE FROM invoice_items WHERE id = $1 AND invoice_id = $2")
            .bind(item_id.as_uuid())
            .bind(invoice_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
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
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock = stock + $3
            WHERE id = $1 AND owner_id = $2 AND stock + $3 >= 0
            RETURNING stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(stock) = updated {
            return Ok(stock);
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 AND owner_id = $2")
                .bind(product_id.as_uuid())
                .bind(owner_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id,
                available,
                requested: -delta,
            }),
            None => Err(StoreError::not_found("Product", product_id)),
        }
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment> {
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

        sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(record.id.as_uuid())
        .bind(record.owner_id.as_uuid())
        .bind(record.amount.cents())
        .bind(record.payment_type.as_str())
        .bind(record.date)
        .bind(record.link.and_then(|l| l.purchase_invoice_id()).map(|id| id.as_uuid()))
        .bind(record.link.and_then(|l| l.sale_invoice_id()).map(|id| id.as_uuid()))
        .bind(&record.notes)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| {
            if let (sqlx::Error::Database(db_err), Some(link)) = (&err, record.link)
                && db_err.is_foreign_key_violation()
            {
                return StoreError::not_found("Invoice", link.invoice_id());
            }
            map_write_error(err)
        })?;

        Ok(record)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
