//! # Input Types
//!
//! Request payloads, partial updates, list filters and pagination.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller payload (JSON, camelCase)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CreateSaleRequest { customerId?, items[], tax?, discount?, ... }       │
//! │  NewProduct / ProductUpdate / BulkProductUpdate                         │
//! │  NewCustomer / CustomerUpdate, NewCategory / CategoryUpdate             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validation.rs checks ──► repositories / SaleService                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Partial updates are explicit optional-field structs: `None` means
//! "leave unchanged". Nullable columns use `Option<Option<T>>` so a caller
//! can clear them.

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{PaymentMethod, PaymentStatus, StockLevel, UserRole};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
fn present_or_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Default page size for every list endpoint.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Upper bound on a single page.
pub const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// Sale
// =============================================================================

/// One line of the caller-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        CartItem {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Checkout payload. The cart lives entirely in this request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSaleRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub tax: Option<Money>,
    #[serde(default)]
    pub discount: Option<Money>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateSaleRequest {
    /// A cash sale with no customer, tax or discount.
    pub fn cash(items: Vec<CartItem>) -> Self {
        CreateSaleRequest {
            customer_id: None,
            items,
            tax: None,
            discount: None,
            payment_method: PaymentMethod::Cash,
            notes: None,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = Some(tax);
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    /// Distinct product ids referenced by the cart, in first-seen order.
    pub fn distinct_product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id.clone());
            }
        }
        ids
    }
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_min_stock")]
    pub min_stock: i64,
}

fn default_min_stock() -> i64 {
    10
}

/// Partial product edit. Stock edits here are catalog corrections, not
/// ledger movements.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductUpdate {
    pub sku: Option<String>,
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub category_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub barcode: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub description: Option<Option<String>>,
    pub price: Option<Money>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub cost: Option<Option<Money>>,
    pub stock: Option<i64>,
    pub min_stock: Option<i64>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.name.is_none()
            && self.category_id.is_none()
            && self.barcode.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.cost.is_none()
            && self.stock.is_none()
            && self.min_stock.is_none()
            && self.is_active.is_none()
    }
}

/// The same partial edit applied to many products at once.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BulkProductUpdate {
    pub ids: Vec<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ProductSort {
    Name,
    Price,
    Stock,
    #[default]
    CreatedAt,
}

impl ProductSort {
    pub const fn column(&self) -> &'static str {
        match self {
            ProductSort::Name => "name",
            ProductSort::Price => "price_cents",
            ProductSort::Stock => "stock",
            ProductSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub const fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct ProductFilter {
    /// Substring match on name, SKU or barcode (case-insensitive).
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub stock_level: Option<StockLevel>,
    pub is_active: Option<bool>,
    pub sort_by: ProductSort,
    pub sort_order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub color: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct CategoryFilter {
    pub search: Option<String>,
    /// Defaults to active categories only.
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Contact edits. `totalPurchases` is deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub email: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub phone: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub address: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct CustomerFilter {
    /// Substring match on name, email or phone.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct TransactionFilter {
    /// Substring match on the transaction number.
    pub search: Option<String>,
    pub status: Option<PaymentStatus>,
    /// Inclusive lower bound, `YYYY-MM-DD` local date.
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD` local date.
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// =============================================================================
// Pagination
// =============================================================================

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Applies defaults and clamps: page ≥ 1, 1 ≤ limit ≤ [`MAX_PAGE_LIMIT`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl PageMeta {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let limit = request.limit.max(1) as i64;
        let total_pages = ((total.max(0) + limit - 1) / limit) as u32;
        PageMeta {
            total,
            page: request.page,
            limit: request.limit,
            total_pages,
        }
    }
}

/// A page of results with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: i64) -> Self {
        Page {
            data,
            meta: PageMeta::new(request, total),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
