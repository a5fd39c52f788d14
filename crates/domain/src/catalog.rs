//! Products, suppliers, expenses and payment ledger reads.

use chrono::{DateTime, Utc};
use common::{ExpenseId, Money, OwnerId, PaymentId, ProductId, SupplierId};
use ledger_store::{
    Expense, ExpenseChanges, LedgerStore, ListQuery, NewExpense, NewProduct, NewSupplier, Page,
    Payment, PaymentQuery, Product, ProductChanges, Supplier, SupplierChanges,
};

use crate::error::{DomainError, ValidationErrors};

const MIN_NAME_LEN: usize = 3;

fn too_short(value: &str) -> bool {
    value.trim().chars().count() < MIN_NAME_LEN
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A sent optional column: blank clears it.
fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| trimmed(Some(v)))
}

fn check_min_len(field: &str, label: &str, value: &str, errors: &mut ValidationErrors) {
    if too_short(value) {
        errors.add(field, format!("{label} must be at least {MIN_NAME_LEN} characters"));
    }
}

fn check_positive(field: &str, label: &str, amount: Money, errors: &mut ValidationErrors) {
    if !amount.is_positive() {
        errors.add(field, format!("{label} must be a positive number"));
    }
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        errors.add("email", "Invalid email address");
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateProduct {
    pub name: String,
    pub code: Option<String>,
    pub cost: Money,
    pub price: Money,
    pub sale_price: Money,
    pub stock: i64,
}

impl CreateProduct {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_min_len("name", "Name", &self.name, &mut errors);
        if let Some(ref code) = self.code {
            check_min_len("code", "Code", code, &mut errors);
        }
        check_positive("cost", "Cost", self.cost, &mut errors);
        check_positive("price", "Price", self.price, &mut errors);
        check_positive("sale_price", "Sale price", self.sale_price, &mut errors);
        if self.stock < 0 {
            errors.add("stock", "Stock cannot be negative");
        }
        errors.into_result()
    }
}

/// Partial product update. A blank `code` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub code: Option<String>,
    pub cost: Option<Money>,
    pub price: Option<Money>,
    pub sale_price: Option<Money>,
    pub stock: Option<i64>,
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ref name) = self.name {
            check_min_len("name", "Name", name, &mut errors);
        }
        if let Some(ref code) = self.code
            && !code.trim().is_empty()
        {
            check_min_len("code", "Code", code, &mut errors);
        }
        if let Some(cost) = self.cost {
            check_positive("cost", "Cost", cost, &mut errors);
        }
        if let Some(price) = self.price {
            check_positive("price", "Price", price, &mut errors);
        }
        if let Some(sale_price) = self.sale_price {
            check_positive("sale_price", "Sale price", sale_price, &mut errors);
        }
        if self.stock.is_some_and(|stock| stock < 0) {
            errors.add("stock", "Stock cannot be negative");
        }
        errors.into_result()
    }

    fn into_changes(self) -> ProductChanges {
        ProductChanges {
            name: self.name.map(|name| name.trim().to_string()),
            code: clearable(self.code),
            cost: self.cost,
            price: self.price,
            sale_price: self.sale_price,
            stock: self.stock,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateSupplier {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
}

impl CreateSupplier {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "Name is required");
        }
        if let Some(ref email) = self.email {
            check_email(email, &mut errors);
        }
        errors.into_result()
    }
}

/// Partial supplier update. A blank optional field clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateSupplier {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub notes: Option<String>,
}

impl UpdateSupplier {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.as_ref().is_some_and(|name| name.trim().is_empty()) {
            errors.add("name", "Name is required");
        }
        if let Some(ref email) = self.email
            && !email.trim().is_empty()
        {
            check_email(email, &mut errors);
        }
        errors.into_result()
    }

    fn into_changes(self) -> SupplierChanges {
        SupplierChanges {
            name: self.name.map(|name| name.trim().to_string()),
            phone: clearable(self.phone),
            email: clearable(self.email),
            address: clearable(self.address),
            city: clearable(self.city),
            company_name: clearable(self.company_name),
            notes: clearable(self.notes),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateExpense {
    pub name: String,
    pub category: String,
    pub amount: Money,
    /// Defaults to the current time.
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl CreateExpense {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_min_len("name", "Name", &self.name, &mut errors);
        check_min_len("category", "Category", &self.category, &mut errors);
        check_positive("amount", "Amount", self.amount, &mut errors);
        errors.into_result()
    }
}

/// Partial expense update: only the sent fields change. Blank `notes` clears them.
#[derive(Debug, Clone, Default)]
pub struct UpdateExpense {
    pub name: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Money>,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl UpdateExpense {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ref name) = self.name {
            check_min_len("name", "Name", name, &mut errors);
        }
        if let Some(ref category) = self.category {
            check_min_len("category", "Category", category, &mut errors);
        }
        if let Some(amount) = self.amount {
            check_positive("amount", "Amount", amount, &mut errors);
        }
        errors.into_result()
    }

    fn into_changes(self) -> ExpenseChanges {
        ExpenseChanges {
            name: self.name.map(|name| name.trim().to_string()),
            category: self.category.map(|category| category.trim().to_string()),
            amount: self.amount,
            date: self.date,
            notes: clearable(self.notes),
        }
    }
}

/// Owner-scoped access to the entities invoices refer to.
#[derive(Clone)]
pub struct CatalogService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_product(
        &self,
        owner_id: OwnerId,
        input: CreateProduct,
    ) -> Result<Product, DomainError> {
        input.validate()?;
        let product = self
            .store
            .create_product(&NewProduct {
                owner_id,
                name: input.name.trim().to_string(),
                code: trimmed(input.code),
                cost: input.cost,
                price: input.price,
                sale_price: input.sale_price,
                stock: input.stock,
            })
            .await
            .map_err(|e| DomainError::from_store("create product", e))?;

        tracing::info!(product_id = %product.id, stock = product.stock, "product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
    ) -> Result<Product, DomainError> {
        self.store
            .get_product(owner_id, product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", product_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(
        &self,
        owner_id: OwnerId,
        query: &ListQuery,
    ) -> Result<Page<Product>, DomainError> {
        Ok(self.store.list_products(owner_id, query).await?)
    }

    #[tracing::instrument(skip(self, input), fields(owner_id = %owner_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
        input: UpdateProduct,
    ) -> Result<Product, DomainError> {
        input.validate()?;
        let product = self
            .store
            .update_product(owner_id, product_id, &input.into_changes())
            .await
            .map_err(|e| DomainError::from_store("update product", e))?;

        tracing::info!(stock = product.stock, "product updated");
        Ok(product)
    }

    /// Deletes a product that no invoice item refers to.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
    ) -> Result<(), DomainError> {
        self.store
            .delete_product(owner_id, product_id)
            .await
            .map_err(|e| DomainError::from_store("delete product", e))?;

        tracing::info!("product deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_supplier(
        &self,
        owner_id: OwnerId,
        input: CreateSupplier,
    ) -> Result<Supplier, DomainError> {
        input.validate()?;
        let supplier = self
            .store
            .create_supplier(&NewSupplier {
                owner_id,
                name: input.name.trim().to_string(),
                phone: trimmed(input.phone),
                email: trimmed(input.email),
                address: trimmed(input.address),
                city: trimmed(input.city),
                company_name: trimmed(input.company_name),
                notes: trimmed(input.notes),
            })
            .await
            .map_err(|e| DomainError::from_store("create supplier", e))?;

        tracing::info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_supplier(
        &self,
        owner_id: OwnerId,
        supplier_id: SupplierId,
    ) -> Result<Supplier, DomainError> {
        self.store
            .get_supplier(owner_id, supplier_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Supplier", supplier_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        owner_id: OwnerId,
        query: &ListQuery,
    ) -> Result<Page<Supplier>, DomainError> {
        Ok(self.store.list_suppliers(owner_id, query).await?)
    }

    #[tracing::instrument(skip(self, input), fields(owner_id = %owner_id, supplier_id = %supplier_id))]
    pub async fn update_supplier(
        &self,
        owner_id: OwnerId,
        supplier_id: SupplierId,
        input: UpdateSupplier,
    ) -> Result<Supplier, DomainError> {
        input.validate()?;
        let supplier = self
            .store
            .update_supplier(owner_id, supplier_id, &input.into_changes())
            .await
            .map_err(|e| DomainError::from_store("update supplier", e))?;

        tracing::info!("supplier updated");
        Ok(supplier)
    }

    /// Deletes a supplier along with its purchase invoices. Returns the number
    /// of invoices removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_supplier(
        &self,
        owner_id: OwnerId,
        supplier_id: SupplierId,
    ) -> Result<u64, DomainError> {
        let removed = self
            .store
            .delete_supplier(owner_id, supplier_id)
            .await
            .map_err(|e| DomainError::from_store("delete supplier", e))?;

        metrics::counter!("invoices_deleted_total", "kind" => "purchase").increment(removed);
        tracing::info!(invoices_removed = removed, "supplier deleted");
        Ok(removed)
    }

    #[tracing::instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_expense(
        &self,
        owner_id: OwnerId,
        input: CreateExpense,
    ) -> Result<Expense, DomainError> {
        input.validate()?;
        let expense = self
            .store
            .create_expense(&NewExpense {
                owner_id,
                name: input.name.trim().to_string(),
                category: input.category.trim().to_string(),
                amount: input.amount,
                date: input.date.unwrap_or_else(Utc::now),
                notes: trimmed(input.notes),
            })
            .await
            .map_err(|e| DomainError::from_store("create expense", e))?;

        tracing::info!(expense_id = %expense.id, amount = %expense.amount, "expense created");
        Ok(expense)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_expense(
        &self,
        owner_id: OwnerId,
        expense_id: ExpenseId,
    ) -> Result<Expense, DomainError> {
        self.store
            .get_expense(owner_id, expense_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Expense", expense_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_expenses(
        &self,
        owner_id: OwnerId,
        query: &ListQuery,
    ) -> Result<Page<Expense>, DomainError> {
        Ok(self.store.list_expenses(owner_id, query).await?)
    }

    #[tracing::instrument(skip(self, input), fields(owner_id = %owner_id, expense_id = %expense_id))]
    pub async fn update_expense(
        &self,
        owner_id: OwnerId,
        expense_id: ExpenseId,
        input: UpdateExpense,
    ) -> Result<Expense, DomainError> {
        input.validate()?;
        let expense = self
            .store
            .update_expense(owner_id, expense_id, &input.into_changes())
            .await
            .map_err(|e| DomainError::from_store("update expense", e))?;

        tracing::info!(amount = %expense.amount, "expense updated");
        Ok(expense)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_expense(
        &self,
        owner_id: OwnerId,
        expense_id: ExpenseId,
    ) -> Result<(), DomainError> {
        self.store
            .delete_expense(owner_id, expense_id)
            .await
            .map_err(|e| DomainError::from_store("delete expense", e))?;

        tracing::info!("expense deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_payment(
        &self,
        owner_id: OwnerId,
        payment_id: PaymentId,
    ) -> Result<Payment, DomainError> {
        self.store
            .get_payment(owner_id, payment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", payment_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_payments(
        &self,
        owner_id: OwnerId,
        query: &PaymentQuery,
    ) -> Result<Page<Payment>, DomainError> {
        Ok(self.store.list_payments(owner_id, query).await?)
    }
}
