use chrono::{DateTime, Utc};
use common::{InvoiceId, PaymentType, SupplierId};
use serde::{Deserialize, Serialize};

/// Largest page size accepted by list queries.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Columns invoices may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSortField {
    #[default]
    CreatedAt,
    Date,
    Total,
    Remaining,
}

impl InvoiceSortField {
    /// Column name in the `invoices` table.
    pub fn column(&self) -> &'static str {
        match self {
            InvoiceSortField::CreatedAt => "created_at",
            InvoiceSortField::Date => "date",
            InvoiceSortField::Total => "total",
            InvoiceSortField::Remaining => "remaining",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Paging window shared by every list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Paging {
    /// Creates a paging window, clamping out-of-range values.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Filters and ordering for listing invoices of one kind.
///
/// Search matches the notes and the counterpart name (supplier name for
/// purchases, customer name for sales), case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub search: Option<String>,
    pub supplier_id: Option<SupplierId>,
    /// Inclusive lower bound on the invoice date.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the invoice date.
    pub date_to: Option<DateTime<Utc>>,
    /// Only invoices with `remaining > 0`.
    pub outstanding_only: bool,
    pub sort_by: InvoiceSortField,
    pub sort_order: SortOrder,
    pub paging: Paging,
}

impl InvoiceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self
    }

    pub fn supplier(mut self, supplier_id: SupplierId) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    pub fn date_from(mut self, from: DateTime<Utc>) -> Self {
        self.date_from = Some(from);
        self
    }

    pub fn date_to(mut self, to: DateTime<Utc>) -> Self {
        self.date_to = Some(to);
        self
    }

    pub fn outstanding_only(mut self) -> Self {
        self.outstanding_only = true;
        self
    }

    pub fn sort(mut self, field: InvoiceSortField, order: SortOrder) -> Self {
        self.sort_by = field;
        self.sort_order = order;
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.paging = Paging::new(page, page_size);
        self
    }
}

/// Name search plus paging, used for products, suppliers and expenses.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub paging: Paging,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.paging = Paging::new(page, page_size);
        self
    }
}

/// Filters for the payment ledger. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct PaymentQuery {
    pub payment_type: Option<PaymentType>,
    /// Payments linked to this invoice, of either kind.
    pub invoice_id: Option<InvoiceId>,
    pub paging: Paging,
}

impl PaymentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payment_type(mut self, payment_type: PaymentType) -> Self {
        self.payment_type = Some(payment_type);
        self
    }

    pub fn invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.paging = Paging::new(page, page_size);
        self
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, paging: Paging) -> Self {
        Self {
            items,
            total_count,
            page: paging.page,
            page_size: paging.page_size,
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.total_count.div_ceil(u64::from(self.page_size.max(1)))
    }

    /// Slices an already filtered and ordered collection.
    pub fn from_sorted(all: Vec<T>, paging: Paging) -> Self {
        let total_count = all.len() as u64;
        let items = all
            .into_iter()
            .skip(paging.offset() as usize)
            .take(paging.limit() as usize)
            .collect();
        Self::new(items, total_count, paging)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_clamped() {
        let paging = Paging::new(0, 500);
        assert_eq!(paging.page, 1);
        assert_eq!(paging.page_size, MAX_PAGE_SIZE);

        let paging = Paging::new(3, 0);
        assert_eq!(paging.page_size, 1);
    }

    #[test]
    fn paging_offset() {
        assert_eq!(Paging::new(1, 10).offset(), 0);
        assert_eq!(Paging::new(3, 25).offset(), 50);
    }

    #[test]
    fn invoice_query_defaults() {
        let query = InvoiceQuery::new();
        assert_eq!(query.sort_by, InvoiceSortField::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);
        assert_eq!(query.paging, Paging::new(1, DEFAULT_PAGE_SIZE));
        assert!(!query.outstanding_only);
    }

    #[test]
    fn invoice_query_builder_chain() {
        let supplier = SupplierId::new();
        let query = InvoiceQuery::new()
            .search("acme")
            .supplier(supplier)
            .outstanding_only()
            .sort(InvoiceSortField::Total, SortOrder::Asc)
            .page(2, 20);

        assert_eq!(query.search.as_deref(), Some("acme"));
        assert_eq!(query.supplier_id, Some(supplier));
        assert!(query.outstanding_only);
        assert_eq!(query.sort_by.column(), "total");
        assert_eq!(query.sort_order.as_sql(), "ASC");
        assert_eq!(query.paging.offset(), 20);
    }

    #[test]
    fn blank_search_is_ignored() {
        assert!(ListQuery::new().search("   ").search.is_none());
    }

    #[test]
    fn page_from_sorted_slices_and_counts() {
        let page = Page::from_sorted((1..=25).collect::<Vec<_>>(), Paging::new(3, 10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total_count, 25);
        assert_eq!(page.total_pages(), 3);
    }
}
