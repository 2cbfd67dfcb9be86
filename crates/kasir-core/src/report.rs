//! # Report Shapes
//!
//! Read-only aggregation results consumed by the dashboard. The queries that
//! fill these live in `kasir-db`; nothing here mutates state.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::PaymentStatus;

/// Count and total for one payment status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusSummary {
    pub payment_status: PaymentStatus,
    pub count: i64,
    pub total_cents: i64,
}

/// Headline sales figures.
///
/// Revenue and profit count `paid` transactions only; refunded sales drop
/// out of both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalesStats {
    pub total_transactions: i64,
    pub total_revenue: Money,
    /// `Σ (unit_price − cost) × quantity`, unknown cost counted as zero.
    pub total_profit: Money,
    pub by_status: Vec<StatusSummary>,
    pub today_revenue: Money,
    pub today_transactions: i64,
    pub today_products_sold: i64,
}

/// Paid sales for one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DailySales {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub total_sales: Money,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TopSellingProduct {
    pub product_id: String,
    pub name: String,
    /// Category name, `Uncategorized` when none.
    pub category: String,
    pub price_cents: i64,
    pub total_sold: i64,
    pub total_revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CatalogStats {
    pub total: i64,
    pub active: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub total_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerStats {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

/// Active category with its count of active products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryProductCount {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub product_count: i64,
}
