//! # Stock Rules
//!
//! The pure half of the stock ledger: availability checks and the signed
//! deltas a sale or refund applies. The storage half (the guarded
//! `UPDATE`) lives in `kasir-db`'s ledger module.
//!
//! ```text
//!   sale:    stock' = stock - qty   (rejected if stock' < 0)
//!   refund:  stock' = stock + qty
//!
//!   after N sales and M refunds of the same line:
//!   stock = initial - Σ sold + Σ refunded, never negative in between
//! ```

use std::collections::HashMap;

use crate::types::{Product, TransactionItem};

/// True iff `product` has at least `requested` units on hand.
#[inline]
pub fn check_availability(product: &Product, requested: i64) -> bool {
    product.stock >= requested
}

/// A signed stock movement for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDelta {
    pub product_id: String,
    /// Negative for a sale, positive for a refund.
    pub delta: i64,
}

impl StockDelta {
    pub fn sale(product_id: impl Into<String>, quantity: i64) -> Self {
        StockDelta {
            product_id: product_id.into(),
            delta: -quantity,
        }
    }

    pub fn refund(product_id: impl Into<String>, quantity: i64) -> Self {
        StockDelta {
            product_id: product_id.into(),
            delta: quantity,
        }
    }
}

/// Collapses per-line movements into one delta per product, keeping the
/// order in which products first appear.
///
/// Applying one row update per product keeps the number of guarded writes
/// (and row locks) to a minimum.
pub fn merge_deltas(deltas: impl IntoIterator<Item = StockDelta>) -> Vec<StockDelta> {
    let mut merged: Vec<StockDelta> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for d in deltas {
        match index.get(&d.product_id) {
            Some(&i) => merged[i].delta = merged[i].delta.saturating_add(d.delta),
            None => {
                index.insert(d.product_id.clone(), merged.len());
                merged.push(d);
            }
        }
    }

    merged.retain(|d| d.delta != 0);
    merged
}

/// Stock restoration for every line of a refunded transaction.
pub fn refund_deltas(items: &[TransactionItem]) -> Vec<StockDelta> {
    merge_deltas(
        items
            .iter()
            .map(|item| StockDelta::refund(item.product_id.clone(), item.quantity)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_per_product_in_first_seen_order() {
        let merged = merge_deltas(vec![
            StockDelta::sale("b", 2),
            StockDelta::sale("a", 1),
            StockDelta::sale("b", 3),
        ]);
        assert_eq!(merged, vec![StockDelta::sale("b", 5), StockDelta::sale("a", 1)]);
    }

    #[test]
    fn drops_net_zero_movements() {
        let merged = merge_deltas(vec![StockDelta::sale("a", 2), StockDelta::refund("a", 2)]);
        assert!(merged.is_empty());
    }
}
