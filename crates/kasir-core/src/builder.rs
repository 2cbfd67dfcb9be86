//! # Transaction Builder
//!
//! Turns a caller-side cart plus the products fetched for it into a
//! [`DraftTransaction`]: resolved lines with frozen price snapshots, totals,
//! and the stock movements the sale will apply.
//!
//! ## Build Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CreateSaleRequest              products (active, fetched by ids)       │
//! │        │                                │                               │
//! │        └──────────────┬─────────────────┘                               │
//! │                       ▼                                                 │
//! │  1. validate payload (items non-empty, qty ≥ 1, tax/discount ≥ 0)       │
//! │  2. resolve every line ─────────► missing? ValidationError             │
//! │  3. check stock, first violation ► InsufficientStock                   │
//! │  4. line subtotal = unit_price(snapshot) × qty                         │
//! │  5. subtotal = Σ lines; total = subtotal + tax − discount               │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │               DraftTransaction                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transaction number is formatted here ([`transaction_number`]) but the
//! count it is derived from is read by the storage layer inside the same
//! unit of work as the insert.
//!
//! Nothing in this module reads the clock or touches storage.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::input::CreateSaleRequest;
use crate::money::Money;
use crate::stock::{check_availability, merge_deltas, StockDelta};
use crate::types::{PaymentMethod, Product, ProductSnapshot};
use crate::validation::validate_sale_request;

// =============================================================================
// Draft
// =============================================================================

/// One resolved cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: String,
    pub snapshot: ProductSnapshot,
    pub quantity: i64,
    pub subtotal: Money,
}

/// A fully priced sale, ready to be persisted.
///
/// ## Invariants
/// - `subtotal == Σ line.subtotal`
/// - `total == subtotal + tax − discount`, and `total ≥ 0`
/// - every line has `quantity ≥ 1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTransaction {
    pub customer_id: Option<String>,
    pub lines: Vec<DraftLine>,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl DraftTransaction {
    /// Stock decrements for this sale, one per product.
    pub fn stock_deltas(&self) -> Vec<StockDelta> {
        merge_deltas(
            self.lines
                .iter()
                .map(|line| StockDelta::sale(line.product_id.clone(), line.quantity)),
        )
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Prices a cart against a set of products.
///
/// ## Example
/// ```rust,ignore
/// let products = catalog.find_active_by_ids(&request.distinct_product_ids()).await?;
/// let draft = TransactionBuilder::new(&products).build(&request)?;
/// assert_eq!(draft.total, draft.subtotal + draft.tax - draft.discount);
/// ```
pub struct TransactionBuilder<'a> {
    products: HashMap<&'a str, &'a Product>,
}

impl<'a> TransactionBuilder<'a> {
    /// Indexes the given products by id. Inactive products are ignored, so a
    /// cart line pointing at one fails resolution.
    pub fn new(products: &'a [Product]) -> Self {
        let products = products
            .iter()
            .filter(|p| p.is_active)
            .map(|p| (p.id.as_str(), p))
            .collect();
        TransactionBuilder { products }
    }

    pub fn build(&self, request: &CreateSaleRequest) -> CoreResult<DraftTransaction> {
        validate_sale_request(request)?;

        let resolved = self.resolve(request)?;
        self.check_stock(&resolved)?;

        let mut lines = Vec::with_capacity(resolved.len());
        let mut subtotal = Money::zero();
        for (product, quantity) in resolved {
            let line_subtotal = product
                .price()
                .checked_mul_quantity(quantity)
                .ok_or_else(|| ValidationError::overflow("subtotal"))?;
            subtotal = subtotal
                .checked_add(line_subtotal)
                .ok_or_else(|| ValidationError::overflow("subtotal"))?;
            lines.push(DraftLine {
                product_id: product.id.clone(),
                snapshot: product.snapshot(),
                quantity,
                subtotal: line_subtotal,
            });
        }

        let tax = request.tax.unwrap_or_default();
        let discount = request.discount.unwrap_or_default();
        let total = compute_total(subtotal, tax, discount)?;

        Ok(DraftTransaction {
            customer_id: request.customer_id.clone(),
            lines,
            subtotal,
            tax,
            discount,
            total,
            payment_method: request.payment_method,
            notes: request.notes.clone(),
        })
    }

    /// Pairs every cart line with its active product.
    fn resolve(&self, request: &CreateSaleRequest) -> CoreResult<Vec<(&'a Product, i64)>> {
        let mut resolved = Vec::with_capacity(request.items.len());
        let mut missing: Vec<String> = Vec::new();

        for item in &request.items {
            match self.products.get(item.product_id.as_str()) {
                Some(product) => resolved.push((*product, item.quantity)),
                None => {
                    if !missing.contains(&item.product_id) {
                        missing.push(item.product_id.clone());
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(ValidationError::ProductsUnavailable { missing }.into());
        }
        Ok(resolved)
    }

    /// First violation wins. A product listed on several lines is checked
    /// against the running total requested so far.
    fn check_stock(&self, resolved: &[(&'a Product, i64)]) -> CoreResult<()> {
        let mut requested_so_far: HashMap<&str, i64> = HashMap::new();

        for (product, quantity) in resolved {
            let requested = requested_so_far.entry(product.id.as_str()).or_insert(0);
            *requested = requested.saturating_add(*quantity);

            if !check_availability(product, *requested) {
                return Err(CoreError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock,
                    requested: *requested,
                });
            }
        }
        Ok(())
    }
}

/// `subtotal + tax − discount`, rejected when negative or out of range.
pub fn compute_total(subtotal: Money, tax: Money, discount: Money) -> CoreResult<Money> {
    let total = subtotal
        .checked_add(tax)
        .and_then(|t| t.checked_sub(discount))
        .ok_or_else(|| ValidationError::overflow("total"))?;

    if total.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "total".to_string(),
        }
        .into());
    }
    Ok(total)
}

// =============================================================================
// Numbering
// =============================================================================

/// Local business day key stored on each transaction (`YYYYMMDD`).
pub fn business_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// `TRX-<YYYYMMDD>-<NNNN>` where `NNNN` is `existing_today + 1`, zero padded
/// to four digits (wider once a day passes 9999 sales).
///
/// ## Known Limitation
/// ```text
///   sale A: count today = 7 ─┐
///   sale B: count today = 7 ─┼─► both want TRX-20240115-0008
///                            │
///   UNIQUE(transaction_number) rejects the second insert; the sale is
///   retried and re-counts. Numbers are sequential per day in the common
///   case but NOT gap-free.
/// ```
pub fn transaction_number(date: NaiveDate, existing_today: i64) -> String {
    format!(
        "TRX-{}-{:04}",
        business_date(date),
        existing_today.max(0) + 1
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
