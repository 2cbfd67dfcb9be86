//! # Stock Ledger and Customer Aggregates
//!
//! The only writers of `products.stock` during a sale or refund, and the
//! only writers of `customers.total_purchases_cents` at all.
//!
//! ## Guarded Delta
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UPDATE products                                                       │
//! │  SET    stock = stock + :delta                                         │
//! │  WHERE  id = :id AND stock + :delta >= 0                               │
//! │                                                                         │
//! │  rows_affected = 1  → applied                                          │
//! │  rows_affected = 0  → re-read the row on the same connection:          │
//! │                       missing       → ProductsUnavailable              │
//! │                       present       → InsufficientStock                │
//! │                                                                         │
//! │  The check and the write are one statement, so no reader ever sees a  │
//! │  negative stock, and the CHECK (stock >= 0) column constraint backs it │
//! │  up if anything else tries.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function takes the caller's unit-of-work connection. None of them
//! commits; an error here means the caller must drop the whole unit of work.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, SaleResult};
use kasir_core::stock::StockDelta;
use kasir_core::{CoreError, Money, ValidationError};

/// Applies one signed stock movement.
pub async fn apply_stock_delta(conn: &mut SqliteConnection, delta: &StockDelta) -> SaleResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1 AND stock + ?2 >= 0
        "#,
    )
    .bind(&delta.product_id)
    .bind(delta.delta)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    if result.rows_affected() == 1 {
        debug!(product_id = %delta.product_id, delta = delta.delta, "Stock moved");
        return Ok(());
    }

    let current: Option<(String, i64)> =
        sqlx::query_as("SELECT name, stock FROM products WHERE id = ?1")
            .bind(&delta.product_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;

    match current {
        None => Err(ValidationError::ProductsUnavailable {
            missing: vec![delta.product_id.clone()],
        }
        .into()),
        Some((name, stock)) => Err(CoreError::InsufficientStock {
            product: name,
            available: stock,
            requested: -delta.delta,
        }
        .into()),
    }
}

/// Applies deltas in order; the first failure stops the rest.
pub async fn apply_stock_deltas(
    conn: &mut SqliteConnection,
    deltas: &[StockDelta],
) -> SaleResult<()> {
    for delta in deltas {
        apply_stock_delta(conn, delta).await?;
    }
    Ok(())
}

/// Adds a completed sale's total to the customer's lifetime purchases.
pub async fn increment_customer_total(
    conn: &mut SqliteConnection,
    customer_id: &str,
    amount: Money,
) -> SaleResult<()> {
    adjust_customer_total(conn, customer_id, amount.cents()).await
}

/// Takes a refunded sale's total back off.
pub async fn decrement_customer_total(
    conn: &mut SqliteConnection,
    customer_id: &str,
    amount: Money,
) -> SaleResult<()> {
    adjust_customer_total(conn, customer_id, -amount.cents()).await
}

async fn adjust_customer_total(
    conn: &mut SqliteConnection,
    customer_id: &str,
    delta_cents: i64,
) -> SaleResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET total_purchases_cents = total_purchases_cents + ?2, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(customer_id)
    .bind(delta_cents)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    if result.rows_affected() == 0 {
        return Err(ValidationError::CustomerNotFound(customer_id.to_string()).into());
    }

    debug!(customer_id = %customer_id, delta_cents, "Customer total adjusted");
    Ok(())
}
