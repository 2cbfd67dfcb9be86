//! # Transaction Repository
//!
//! Read side of the sales history plus the statements a sale or refund
//! runs inside its unit of work.
//!
//! ## Two Kinds of Functions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  TransactionRepository (pool)        free functions (&mut conn)        │
//! │  ────────────────────────────        ──────────────────────────        │
//! │  get_record                          count_for_business_date           │
//! │  list                                insert_transaction / insert_items │
//! │                                      fetch_transaction / fetch_items   │
//! │                                      mark_refunded / set_status        │
//! │                                      load_record                       │
//! │                                                                         │
//! │  The free functions never open or commit anything themselves; they     │
//! │  run on whatever connection the caller's UnitOfWork hands them.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::customer::CUSTOMER_COLUMNS;
use crate::repository::product::PRODUCT_COLUMNS;
use kasir_core::builder::business_date;
use kasir_core::input::{Page, PageRequest, TransactionFilter};
use kasir_core::validation::validate_search_query;
use kasir_core::{
    Customer, PaymentStatus, Product, Transaction, TransactionItem, TransactionItemRecord,
    TransactionRecord, UserSummary, ValidationError,
};

const TRANSACTION_COLUMNS: &str = "id, transaction_number, business_date, customer_id, user_id, \
     subtotal_cents, tax_cents, discount_cents, total_cents, payment_method, payment_status, \
     notes, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, transaction_id, product_id, product_name, product_sku, \
     unit_price_cents, quantity, subtotal_cents, created_at";

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// The transaction with its items (and their current products), the
    /// customer and the operator attached.
    pub async fn get_record(&self, id: &str) -> DbResult<Option<TransactionRecord>> {
        let mut conn = self.pool.acquire().await?;
        load_record(&mut conn, id).await
    }

    /// Newest first.
    ///
    /// ## Filters
    /// - `search`: substring of the transaction number
    /// - `status`: exact payment status
    /// - `start_date` / `end_date`: inclusive `YYYY-MM-DD` business days
    pub async fn list(&self, filter: &TransactionFilter) -> DbResult<Page<Transaction>> {
        let search = validate_search_query(filter.search.as_deref())?;
        let start = filter
            .start_date
            .as_deref()
            .map(|d| parse_business_day("startDate", d))
            .transpose()?;
        let end = filter
            .end_date
            .as_deref()
            .map(|d| parse_business_day("endDate", d))
            .transpose()?;
        let page = PageRequest::new(filter.page, filter.limit);

        let conditions = ListConditions {
            search: search.as_deref(),
            status: filter.status,
            start: start.as_deref(),
            end: end.as_deref(),
        };

        let mut count_qb =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM transactions WHERE 1 = 1");
        conditions.push(&mut count_qb);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1 = 1"
        ));
        conditions.push(&mut qb);
        qb.push(" ORDER BY created_at DESC, transaction_number DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let transactions = qb
            .build_query_as::<Transaction>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(transactions, page, total))
    }
}

struct ListConditions<'f> {
    search: Option<&'f str>,
    status: Option<PaymentStatus>,
    start: Option<&'f str>,
    end: Option<&'f str>,
}

impl ListConditions<'_> {
    fn push(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(search) = self.search {
            qb.push(" AND transaction_number LIKE ")
                .push_bind(format!("%{search}%"));
        }
        if let Some(status) = self.status {
            qb.push(" AND payment_status = ").push_bind(status);
        }
        if let Some(start) = self.start {
            qb.push(" AND business_date >= ").push_bind(start.to_string());
        }
        if let Some(end) = self.end {
            qb.push(" AND business_date <= ").push_bind(end.to_string());
        }
    }
}

/// `2024-03-05` → `20240305`.
fn parse_business_day(field: &str, value: &str) -> DbResult<String> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a date like 2024-03-05".to_string(),
        }
    })?;
    Ok(business_date(date))
}

// =============================================================================
// In-transaction statements
// =============================================================================

/// Transactions already numbered on `business_date` (`YYYYMMDD`).
pub(crate) async fn count_for_business_date(
    conn: &mut SqliteConnection,
    business_date: &str,
) -> DbResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE business_date = ?1")
            .bind(business_date)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

pub(crate) async fn insert_transaction(
    conn: &mut SqliteConnection,
    tx: &Transaction,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, transaction_number, business_date, customer_id, user_id,
            subtotal_cents, tax_cents, discount_cents, total_cents,
            payment_method, payment_status, notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.transaction_number)
    .bind(&tx.business_date)
    .bind(&tx.customer_id)
    .bind(&tx.user_id)
    .bind(tx.subtotal_cents)
    .bind(tx.tax_cents)
    .bind(tx.discount_cents)
    .bind(tx.total_cents)
    .bind(tx.payment_method)
    .bind(tx.payment_status)
    .bind(&tx.notes)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: tx.transaction_number.clone(),
        },
        other => other,
    })?;

    debug!(number = %tx.transaction_number, "Inserted transaction");
    Ok(())
}

pub(crate) async fn insert_items(
    conn: &mut SqliteConnection,
    items: &[TransactionItem],
) -> DbResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!("INSERT INTO transaction_items ({ITEM_COLUMNS}) "));
    qb.push_values(items, |mut row, item| {
        row.push_bind(item.id.clone())
            .push_bind(item.transaction_id.clone())
            .push_bind(item.product_id.clone())
            .push_bind(item.snapshot.product_name.clone())
            .push_bind(item.snapshot.product_sku.clone())
            .push_bind(item.snapshot.unit_price_cents)
            .push_bind(item.quantity)
            .push_bind(item.subtotal_cents)
            .push_bind(item.created_at);
    });
    qb.build().execute(&mut *conn).await?;

    debug!(count = items.len(), "Inserted transaction items");
    Ok(())
}

pub(crate) async fn fetch_transaction(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Transaction>> {
    let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
    let tx = sqlx::query_as::<_, Transaction>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(tx)
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    transaction_id: &str,
) -> DbResult<Vec<TransactionItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM transaction_items WHERE transaction_id = ?1 \
         ORDER BY created_at ASC, rowid ASC"
    );
    let items = sqlx::query_as::<_, TransactionItem>(&sql)
        .bind(transaction_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

/// Moves a transaction to `refunded` unless it already is.
///
/// Returns `false` when the row was already refunded (or is gone): the
/// caller must then skip every ledger side effect. This single guarded
/// UPDATE is what makes a refund's stock and customer reversal happen at
/// most once, even with two refunds racing.
pub(crate) async fn mark_refunded(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET payment_status = 'refunded', updated_at = ?2
        WHERE id = ?1 AND payment_status <> 'refunded'
        "#,
    )
    .bind(id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Plain status write with no ledger effects.
pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: PaymentStatus,
) -> DbResult<bool> {
    let result =
        sqlx::query("UPDATE transactions SET payment_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

    Ok(result.rows_affected() == 1)
}

/// Assembles a [`TransactionRecord`].
pub(crate) async fn load_record(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<TransactionRecord>> {
    let Some(transaction) = fetch_transaction(conn, id).await? else {
        return Ok(None);
    };
    let items = fetch_items(conn, id).await?;

    let products = fetch_products(conn, &items).await?;
    let items = items
        .into_iter()
        .map(|item| {
            let product = products.iter().find(|p| p.id == item.product_id).cloned();
            TransactionItemRecord { item, product }
        })
        .collect();

    let customer = match &transaction.customer_id {
        Some(customer_id) => {
            let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
            sqlx::query_as::<_, Customer>(&sql)
                .bind(customer_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => None,
    };

    let user = sqlx::query_as::<_, UserSummary>(
        "SELECT id, full_name, email FROM users WHERE id = ?1",
    )
    .bind(&transaction.user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(Some(TransactionRecord {
        transaction,
        items,
        customer,
        user,
    }))
}

/// Current products behind `items`, active or not.
async fn fetch_products(
    conn: &mut SqliteConnection,
    items: &[TransactionItem],
) -> DbResult<Vec<Product>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("
    ));
    let mut ids = qb.separated(", ");
    for item in items {
        ids.push_bind(item.product_id.clone());
    }
    ids.push_unseparated(")");

    let products = qb.build_query_as::<Product>().fetch_all(&mut *conn).await?;
    Ok(products)
}

// =============================================================================
// Unit Tests
// =============================================================================
