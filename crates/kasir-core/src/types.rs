//! # Domain Types
//!
//! Core domain types used throughout Kasir.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   Transaction   │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  trx number     │   │  name           │       │
//! │  │  price_cents    │   │  payment_status │   │  total_purchases│       │
//! │  │  stock ≥ 0      │   │  total_cents    │   └─────────────────┘       │
//! │  └─────────────────┘   └────────┬────────┘                              │
//! │                                 │ owns 1..N                             │
//! │                        ┌────────▼────────┐   ┌─────────────────┐       │
//! │                        │ TransactionItem │──►│ ProductSnapshot │       │
//! │                        │  quantity ≥ 1   │   │ name, sku, price│       │
//! │                        └─────────────────┘   │ (frozen)        │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, transaction_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Category
// =============================================================================

/// Product grouping shown in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Hex color used for badges, e.g. `#10B981`.
    pub color: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `stock` is only moved by the stock ledger (sales and refunds) or by an
/// explicit catalog edit. Products are never erased, only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub category_id: Option<String>,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name, copied onto line items at sale time.
    pub name: String,

    pub description: Option<String>,

    /// Price in cents.
    pub price_cents: i64,

    /// Cost in cents (for profit reporting).
    pub cost_cents: Option<i64>,

    /// Units on hand. Never negative.
    pub stock: i64,

    /// Reorder threshold.
    pub min_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the cost as Money, if known.
    #[inline]
    pub fn cost(&self) -> Option<Money> {
        self.cost_cents.map(Money::from_cents)
    }

    /// Stock is strictly below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock < self.min_stock
    }

    /// Classifies current stock the way the dashboard filters do.
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::classify(self.stock, self.min_stock)
    }

    /// Freezes the sale-relevant attributes for a line item.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_name: self.name.clone(),
            product_sku: self.sku.clone(),
            unit_price_cents: self.price_cents,
        }
    }
}

/// Stock buckets used by catalog filters.
///
/// ```text
///   0 ──── out
///   1 .. min_stock-1 ──── low
///   min_stock .. 99 ──── normal
///   100+ ──── high
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StockLevel {
    Out,
    Low,
    Normal,
    High,
}

impl StockLevel {
    /// Boundary between "normal" and "high" stock.
    pub const HIGH_THRESHOLD: i64 = 100;

    pub fn classify(stock: i64, min_stock: i64) -> Self {
        if stock <= 0 {
            StockLevel::Out
        } else if stock < min_stock {
            StockLevel::Low
        } else if stock < Self::HIGH_THRESHOLD {
            StockLevel::Normal
        } else {
            StockLevel::High
        }
    }
}

impl FromStr for StockLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "out" => Ok(StockLevel::Out),
            "low" => Ok(StockLevel::Low),
            "normal" => Ok(StockLevel::Normal),
            "high" => Ok(StockLevel::High),
            _ => Err(ValidationError::NotAllowed {
                field: "stockLevel".to_string(),
                allowed: ["out", "low", "normal", "high"].map(String::from).to_vec(),
            }),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer. Optional on a sale (walk-in sales have none).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Lifetime purchases in cents. Only the aggregate updater moves this.
    pub total_purchases_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn total_purchases(&self) -> Money {
        Money::from_cents(self.total_purchases_cents)
    }
}

// =============================================================================
// User (operator)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserRole {
    Admin,
    Cashier,
}

/// The operator who rang up a sale. Authentication lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// The subset of a user attached to transaction records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserSummary {
    pub id: String,
    pub full_name: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        UserSummary {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    DigitalWallet,
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::DebitCard,
        PaymentMethod::CreditCard,
        PaymentMethod::DigitalWallet,
        PaymentMethod::BankTransfer,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DigitalWallet => "digital_wallet",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "paymentMethod".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Lifecycle of a transaction's payment.
///
/// ## State Machine
/// ```text
///            create()
///               │
///               ▼
///          ┌─────────┐   set_status(refunded)   ┌──────────┐
///          │  paid   │ ───────────────────────► │ refunded │
///          └─────────┘   restores stock ONCE    └──────────┘
///             │   ▲                                  │
///  pending /  │   │  bookkeeping only,               │ refunded again:
///  cancelled  ▼   │  no stock movement               ▼ no-op on ledger
///          ┌─────────┐
///          │ pending │ / cancelled
///          └─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Paid,
        PaymentStatus::Pending,
        PaymentStatus::Refunded,
        PaymentStatus::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Moving into this status from `current` must reverse the sale's
    /// ledger effects.
    pub fn triggers_refund_from(self, current: PaymentStatus) -> bool {
        self == PaymentStatus::Refunded && current != PaymentStatus::Refunded
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Paid
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: PaymentStatus::ALL.iter().map(|st| st.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A completed checkout.
///
/// Invariants: `total = subtotal + tax - discount` and
/// `subtotal = Σ item.subtotal`. Only `payment_status` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    /// `TRX-YYYYMMDD-NNNN`, unique.
    pub transaction_number: String,
    /// Local business day the number was allocated in (`YYYYMMDD`).
    pub business_date: String,
    pub customer_id: Option<String>,
    pub user_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Transaction Item
// =============================================================================

/// Product attributes frozen at sale time.
///
/// Never re-derived from the live product: prices and names change after
/// the sale, receipts must not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSnapshot {
    pub product_name: String,
    pub product_sku: String,
    pub unit_price_cents: i64,
}

impl ProductSnapshot {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// A line item in a transaction. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    /// Kept even if the product is later deactivated.
    pub product_id: String,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub snapshot: ProductSnapshot,
    pub quantity: i64,
    /// `unit_price × quantity`.
    pub subtotal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl TransactionItem {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Records (what callers receive)
// =============================================================================

/// A line item with the current product attached for convenience.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionItemRecord {
    #[serde(flatten)]
    pub item: TransactionItem,
    pub product: Option<Product>,
}

/// A transaction with items, customer and operator eagerly attached.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionRecord {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub items: Vec<TransactionItemRecord>,
    pub customer: Option<Customer>,
    pub user: Option<UserSummary>,
}

/// Result of a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusUpdate {
    pub message: String,
}

impl StatusUpdate {
    pub const REFUNDED: &'static str = "Transaction refunded and stock restored";
    pub const UPDATED: &'static str = "Transaction status updated";

    pub fn refunded() -> Self {
        StatusUpdate {
            message: Self::REFUNDED.to_string(),
        }
    }

    pub fn updated() -> Self {
        StatusUpdate {
            message: Self::UPDATED.to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_default() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Paid);
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!("refunded".parse::<PaymentStatus>().unwrap(), PaymentStatus::Refunded);
        assert_eq!("pending".parse::<PaymentStatus>().unwrap(), PaymentStatus::Pending);
        assert!("REFUNDED".parse::<PaymentStatus>().is_err());
        assert!("void".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_refund_trigger_only_once() {
        assert!(PaymentStatus::Refunded.triggers_refund_from(PaymentStatus::Paid));
        assert!(PaymentStatus::Refunded.triggers_refund_from(PaymentStatus::Pending));
        assert!(!PaymentStatus::Refunded.triggers_refund_from(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Cancelled.triggers_refund_from(PaymentStatus::Paid));
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::DigitalWallet).unwrap(),
            "\"digital_wallet\""
        );
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!("card".parse::<PaymentMethod>().is_err());
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_stock_level_classify() {
        assert_eq!(StockLevel::classify(0, 5), StockLevel::Out);
        assert_eq!(StockLevel::classify(3, 5), StockLevel::Low);
        assert_eq!(StockLevel::classify(5, 5), StockLevel::Normal);
        assert_eq!(StockLevel::classify(100, 5), StockLevel::High);
        assert_eq!("low".parse::<StockLevel>().unwrap(), StockLevel::Low);
        assert!("empty".parse::<StockLevel>().is_err());
    }

    #[test]
    fn test_item_snapshot_is_flattened_on_the_wire() {
        let item = TransactionItem {
            id: "i1".into(),
            transaction_id: "t1".into(),
            product_id: "p1".into(),
            snapshot: ProductSnapshot {
                product_name: "Kopi Susu".into(),
                product_sku: "KOPI-01".into(),
                unit_price_cents: 1_800_000,
            },
            quantity: 2,
            subtotal_cents: 3_600_000,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["productName"], "Kopi Susu");
        assert_eq!(json["productSku"], "KOPI-01");
        assert_eq!(json["unitPriceCents"], 1_800_000);
        assert_eq!(json["subtotalCents"], 3_600_000);
    }
}
