//! HTTP handlers, grouped by resource.

pub mod catalog;
pub mod invoices;
pub mod ops;
pub mod payments;
pub mod statistics;

use common::Money;
use domain::ValidationErrors;
use ledger_store::{DEFAULT_PAGE_SIZE, ListQuery, Page};
use serde::{Deserialize, Serialize};

/// Largest accepted magnitude for a `*_cents` request field.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000_000;

/// Reads a request amount, reporting `field` when it exceeds [`MAX_AMOUNT_CENTS`].
pub fn amount(field: impl Into<String>, cents: i64, errors: &mut ValidationErrors) -> Money {
    if cents.unsigned_abs() > MAX_AMOUNT_CENTS.unsigned_abs() {
        errors.add(field, "Amount is out of range");
        return Money::zero();
    }
    Money::from_cents(cents)
}

/// [`amount`] for optional fields.
pub fn optional_amount(
    field: impl Into<String>,
    cents: Option<i64>,
    errors: &mut ValidationErrors,
) -> Option<Money> {
    cents.map(|cents| amount(field, cents, errors))
}

/// One page of a list response.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> PageResponse<T> {
    pub fn from_page<U>(page: Page<U>, f: impl FnMut(U) -> T) -> Self {
        let total_pages = page.total_pages();
        let page = page.map(f);
        Self {
            items: page.items,
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
            total_pages,
        }
    }
}

/// `?search=&page=&page_size=` for the catalog lists.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListParams {
    pub fn into_query(self) -> ListQuery {
        let query = ListQuery::new().page(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        match self.search {
            Some(search) => query.search(search),
            None => query,
        }
    }
}
