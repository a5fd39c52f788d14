//! Line-item reconciliation.
//!
//! Diffs the items stored on an invoice against the item set requested by an
//! update and derives the stock movements that the diff implies. Nothing here
//! touches the store; the caller applies the result inside its transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use common::{InvoiceKind, ItemId, ProductId};
use ledger_store::{ItemValues, LineItem};
use thiserror::Error;

use super::payload::ItemInput;
use crate::error::ValidationErrors;

/// A signed quantity to add to one product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDelta {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// An existing item to overwrite in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    pub item_id: ItemId,
    pub values: ItemValues,
}

/// The persistence diff and stock movements for one item replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Stored items the request no longer references.
    pub to_delete: Vec<LineItem>,
    pub to_update: Vec<ItemUpdate>,
    pub to_create: Vec<ItemValues>,
    /// Ordered as deletions, then updates, then creations. Zero deltas are left out.
    pub stock_deltas: Vec<StockDelta>,
}

impl Reconciliation {
    /// Net stock change per product.
    pub fn net_by_product(&self) -> BTreeMap<ProductId, i64> {
        net_by_product(&self.stock_deltas)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("item {item_id} does not belong to this invoice")]
    UnknownItem { index: usize, item_id: ItemId },

    #[error("item {item_id} is listed more than once")]
    DuplicateItem { index: usize, item_id: ItemId },
}

impl From<ReconcileError> for ValidationErrors {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::UnknownItem { index, .. } => ValidationErrors::single(
                format!("items[{index}].id"),
                "Item does not belong to this invoice",
            ),
            ReconcileError::DuplicateItem { index, .. } => ValidationErrors::single(
                format!("items[{index}].id"),
                "Item is listed more than once",
            ),
        }
    }
}

/// Sign applied to item quantities: purchases receive stock, sales consume it.
pub fn direction(kind: InvoiceKind) -> i64 {
    match kind {
        InvoiceKind::Purchase => 1,
        InvoiceKind::Sale => -1,
    }
}

/// Stock movements for inserting `items` on a new invoice of `kind`.
pub fn creation_deltas<'a>(
    kind: InvoiceKind,
    items: impl IntoIterator<Item = &'a ItemValues>,
) -> Vec<StockDelta> {
    let sign = direction(kind);
    items
        .into_iter()
        .map(|item| StockDelta {
            product_id: item.product_id,
            quantity: sign * i64::from(item.quantity),
        })
        .collect()
}

/// Stock movements that undo every item of an invoice of `kind`.
pub fn reversal_deltas(kind: InvoiceKind, items: &[LineItem]) -> Vec<StockDelta> {
    let sign = direction(kind);
    items
        .iter()
        .map(|item| StockDelta {
            product_id: item.product_id,
            quantity: -sign * i64::from(item.quantity),
        })
        .collect()
}

/// Sums deltas per product. Products whose deltas cancel out are kept with 0.
pub fn net_by_product(deltas: &[StockDelta]) -> BTreeMap<ProductId, i64> {
    let mut net = BTreeMap::new();
    for delta in deltas {
        *net.entry(delta.product_id).or_insert(0) += delta.quantity;
    }
    net
}

/// Matches `desired` against `existing` by item id.
///
/// Desired items without an id are created. Existing items not referenced are
/// deleted. Referenced items are updated; when the product of an updated item
/// changes, the old quantity leaves the old product and the new quantity
/// lands on the new one.
pub fn reconcile(
    kind: InvoiceKind,
    existing: &[LineItem],
    desired: &[ItemInput],
) -> Result<Reconciliation, ReconcileError> {
    let sign = direction(kind);
    let stored: HashMap<ItemId, &LineItem> = existing.iter().map(|i| (i.id, i)).collect();

    let mut referenced = HashSet::new();
    for (index, item) in desired.iter().enumerate() {
        if let Some(item_id) = item.id {
            if !stored.contains_key(&item_id) {
                return Err(ReconcileError::UnknownItem { index, item_id });
            }
            if !referenced.insert(item_id) {
                return Err(ReconcileError::DuplicateItem { index, item_id });
            }
        }
    }

    let mut result = Reconciliation::default();
    let push = |deltas: &mut Vec<StockDelta>, product_id: ProductId, quantity: i64| {
        if quantity != 0 {
            deltas.push(StockDelta {
                product_id,
                quantity,
            });
        }
    };

    for item in existing.iter().filter(|i| !referenced.contains(&i.id)) {
        push(
            &mut result.stock_deltas,
            item.product_id,
            -sign * i64::from(item.quantity),
        );
        result.to_delete.push(item.clone());
    }

    for item in desired {
        let Some(item_id) = item.id else { continue };
        let Some(old) = stored.get(&item_id) else {
            continue;
        };
        let new_quantity = i64::from(item.quantity);
        let old_quantity = i64::from(old.quantity);

        if old.product_id == item.product_id {
            push(
                &mut result.stock_deltas,
                item.product_id,
                sign * (new_quantity - old_quantity),
            );
        } else {
            push(&mut result.stock_deltas, old.product_id, -sign * old_quantity);
            push(&mut result.stock_deltas, item.product_id, sign * new_quantity);
        }
        result.to_update.push(ItemUpdate {
            item_id,
            values: item.values(),
        });
    }

    for item in desired.iter().filter(|i| i.id.is_none()) {
        push(
            &mut result.stock_deltas,
            item.product_id,
            sign * i64::from(item.quantity),
        );
        result.to_create.push(item.values());
    }

    Ok(result)
}
