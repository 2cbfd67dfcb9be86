//! # Sale Service
//!
//! The sale orchestrator: the three operations the HTTP layer calls, each
//! running as one atomic unit of work.
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(user_id, request)                                         │
//! │                                                                         │
//! │  validate payload ─── ValidationError (no database touched)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────── UnitOfWork (BEGIN IMMEDIATE) ─────────────────┐     │
//! │  │ find_active_by_ids          products as of the write lock     │     │
//! │  │ TransactionBuilder::build   snapshot prices, totals, stock    │     │
//! │  │ count today + 1             TRX-YYYYMMDD-NNNN                  │     │
//! │  │ ledger: stock −qty          guarded, per product               │     │
//! │  │ ledger: customer +total     unknown customer aborts            │     │
//! │  │ insert transaction + items                                     │     │
//! │  │ load record                                                    │     │
//! │  └──────────────── COMMIT ─── or ROLLBACK on any error ───────────┘     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  retryable storage error? ── yes ──► sleep(backoff × attempt), again   │
//! │                                      at most max_attempts times,       │
//! │                                      then StorageConflict (409)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status State Machine
//! ```text
//!   paid ──► refunded        stock +qty per item, customer −total (once)
//!   paid ──► pending / cancelled / paid      status only
//!   refunded ──► refunded    no-op
//!   refunded ──► anything else               rejected
//! ```
//!
//! `refunded` is terminal: allowing a refunded sale back to `paid` would let
//! a second refund restore its stock twice.

use std::future::Future;
use std::time::Duration;

use chrono::{Local, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{SaleError, SaleResult};
use crate::ledger::{
    apply_stock_deltas, decrement_customer_total, increment_customer_total,
};
use crate::repository::product::find_active_by_ids;
use crate::repository::transaction::{
    count_for_business_date, fetch_items, fetch_transaction, insert_items, insert_transaction,
    load_record, mark_refunded, set_status, TransactionRepository,
};
use crate::unit_of_work::UnitOfWork;
use kasir_core::builder::{business_date, transaction_number, TransactionBuilder};
use kasir_core::input::{CreateSaleRequest, Page, TransactionFilter};
use kasir_core::stock::refund_deltas;
use kasir_core::validation::validate_sale_request;
use kasir_core::{
    new_id, CoreError, PaymentStatus, StatusUpdate, Transaction, TransactionItem,
    TransactionRecord, ValidationError,
};

// =============================================================================
// Configuration
// =============================================================================

/// Bounded retry policy for storage conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleServiceConfig {
    /// Total attempts per operation, first try included.
    /// Default: 3
    pub max_attempts: u32,

    /// Linear backoff step: attempt `n` waits `n × retry_backoff`.
    /// Default: 25 ms
    pub retry_backoff: Duration,
}

impl Default for SaleServiceConfig {
    fn default() -> Self {
        SaleServiceConfig {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct SaleService {
    pool: SqlitePool,
    config: SaleServiceConfig,
}

impl SaleService {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_config(pool, SaleServiceConfig::default())
    }

    pub fn with_config(pool: SqlitePool, config: SaleServiceConfig) -> Self {
        SaleService { pool, config }
    }

    /// Records a sale, moving stock and the customer's total with it.
    ///
    /// ## Errors
    /// - `Core(Validation)` - bad payload, unknown/inactive product, unknown customer
    /// - `Core(InsufficientStock)` - first line that does not fit
    /// - `Core(StorageConflict)` - write lock contention outlasted the retries
    pub async fn create_sale(
        &self,
        user_id: &str,
        request: CreateSaleRequest,
    ) -> SaleResult<TransactionRecord> {
        validate_sale_request(&request)?;
        let request = &request;

        let record = self
            .with_retry("create_sale", move || self.try_create_sale(user_id, request))
            .await?;

        info!(
            id = %record.transaction.id,
            number = %record.transaction.transaction_number,
            total = %record.transaction.total(),
            lines = record.items.len(),
            "Sale committed"
        );
        Ok(record)
    }

    pub async fn get_sale_by_id(&self, id: &str) -> SaleResult<TransactionRecord> {
        TransactionRepository::new(self.pool.clone())
            .get_record(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", id).into())
    }

    /// Changes a sale's payment status. `status` is the wire value
    /// (`paid`, `pending`, `refunded`, `cancelled`).
    ///
    /// The transaction is looked up before `status` is parsed, so an unknown
    /// id is `NotFound` whatever the status string.
    pub async fn set_sale_status(&self, id: &str, status: &str) -> SaleResult<StatusUpdate> {
        let status = status.trim();

        let update = self
            .with_retry("set_sale_status", move || self.try_set_status(id, status))
            .await?;

        info!(id = %id, status = %status, message = %update.message, "Sale status changed");
        Ok(update)
    }

    pub async fn list_sales(&self, filter: &TransactionFilter) -> SaleResult<Page<Transaction>> {
        Ok(TransactionRepository::new(self.pool.clone())
            .list(filter)
            .await?)
    }

    // =========================================================================
    // Units of work
    // =========================================================================

    async fn try_create_sale(
        &self,
        user_id: &str,
        request: &CreateSaleRequest,
    ) -> SaleResult<TransactionRecord> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let result = create_in(uow.conn()?, user_id, request).await;
        match result {
            Ok(record) => {
                uow.commit().await?;
                Ok(record)
            }
            Err(e) => {
                uow.rollback().await;
                Err(e)
            }
        }
    }

    async fn try_set_status(&self, id: &str, status: &str) -> SaleResult<StatusUpdate> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let result = set_status_in(uow.conn()?, id, status).await;
        match result {
            Ok(update) => {
                uow.commit().await?;
                Ok(update)
            }
            Err(e) => {
                uow.rollback().await;
                Err(e)
            }
        }
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is used up.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> SaleResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SaleResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut tries = 1;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && tries < max_attempts => {
                    warn!(operation, attempt = tries, error = %e, "Storage conflict, retrying");
                    tokio::time::sleep(self.config.retry_backoff * tries).await;
                    tries += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!(operation, attempts = tries, error = %e, "Storage conflict, giving up");
                    return Err(CoreError::StorageConflict { attempts: tries }.into());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// Statement sequences (run inside a UnitOfWork)
// =============================================================================

async fn create_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    request: &CreateSaleRequest,
) -> SaleResult<TransactionRecord> {
    let products = find_active_by_ids(conn, &request.distinct_product_ids()).await?;
    let draft = TransactionBuilder::new(&products).build(request)?;

    let today = Local::now().date_naive();
    let date_key = business_date(today);
    let existing = count_for_business_date(conn, &date_key).await?;

    let now = Utc::now();
    let transaction = Transaction {
        id: new_id(),
        transaction_number: transaction_number(today, existing),
        business_date: date_key,
        customer_id: draft.customer_id.clone(),
        user_id: user_id.to_string(),
        subtotal_cents: draft.subtotal.cents(),
        tax_cents: draft.tax.cents(),
        discount_cents: draft.discount.cents(),
        total_cents: draft.total.cents(),
        payment_method: draft.payment_method,
        payment_status: PaymentStatus::Paid,
        notes: draft.notes.clone(),
        created_at: now,
        updated_at: now,
    };
    let items: Vec<TransactionItem> = draft
        .lines
        .iter()
        .map(|line| TransactionItem {
            id: new_id(),
            transaction_id: transaction.id.clone(),
            product_id: line.product_id.clone(),
            snapshot: line.snapshot.clone(),
            quantity: line.quantity,
            subtotal_cents: line.subtotal.cents(),
            created_at: now,
        })
        .collect();

    apply_stock_deltas(conn, &draft.stock_deltas()).await?;

    // Before the insert, so an unknown id is CustomerNotFound rather than a
    // foreign-key failure.
    if let Some(customer_id) = &transaction.customer_id {
        increment_customer_total(conn, customer_id, draft.total).await?;
    }

    insert_transaction(conn, &transaction).await?;
    insert_items(conn, &items).await?;

    debug!(number = %transaction.transaction_number, "Sale written, loading record");
    load_record(conn, &transaction.id)
        .await?
        .ok_or_else(|| CoreError::not_found("Transaction", &transaction.id).into())
}

async fn set_status_in(
    conn: &mut SqliteConnection,
    id: &str,
    status: &str,
) -> SaleResult<StatusUpdate> {
    let transaction = fetch_transaction(conn, id)
        .await?
        .ok_or_else(|| SaleError::from(CoreError::not_found("Transaction", id)))?;
    let status: PaymentStatus = status.parse()?;
    let current = transaction.payment_status;

    if status.triggers_refund_from(current) {
        if !mark_refunded(conn, id).await? {
            return Ok(StatusUpdate::updated());
        }

        let items = fetch_items(conn, id).await?;
        apply_stock_deltas(conn, &refund_deltas(&items)).await?;
        if let Some(customer_id) = &transaction.customer_id {
            decrement_customer_total(conn, customer_id, transaction.total()).await?;
        }

        debug!(id = %id, lines = items.len(), "Refund reversed stock and customer total");
        return Ok(StatusUpdate::refunded());
    }

    if current == PaymentStatus::Refunded {
        if status == PaymentStatus::Refunded {
            return Ok(StatusUpdate::updated());
        }
        return Err(ValidationError::NotAllowed {
            field: "status".to_string(),
            allowed: vec![PaymentStatus::Refunded.as_str().to_string()],
        }
        .into());
    }

    set_status(conn, id, status).await?;
    Ok(StatusUpdate::updated())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use kasir_core::input::{CartItem, NewCustomer, NewProduct, NewUser};
    use kasir_core::validation::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};
    use kasir_core::{Money, PaymentMethod, UserRole};
    use std::path::PathBuf;

    struct Shop {
        db: Database,
        user_id: String,
    }

    impl Shop {
        async fn open(config: DbConfig) -> Self {
            let db = Database::new(config).await.unwrap();
            let user = db
                .users()
                .create(NewUser {
                    full_name: "Kasir".into(),
                    email: "kasir@toko.id".into(),
                    role: UserRole::Cashier,
                })
                .await
                .unwrap();
            Shop {
                db,
                user_id: user.id,
            }
        }

        async fn new() -> Self {
            Self::open(DbConfig::in_memory()).await
        }

        async fn product(&self, sku: &str, price_cents: i64, stock: i64) -> String {
            self.db
                .products()
                .create(NewProduct {
                    sku: sku.into(),
                    name: format!("Produk {sku}"),
                    category_id: None,
                    barcode: None,
                    description: None,
                    price: Money::from_cents(price_cents),
                    cost: None,
                    stock,
                    min_stock: 1,
                })
                .await
                .unwrap()
                .id
        }

        async fn customer(&self) -> String {
            self.db
                .customers()
                .create(NewCustomer {
                    name: "Budi".into(),
                    email: None,
                    phone: None,
                    address: None,
                })
                .await
                .unwrap()
                .id
        }

        async fn stock(&self, product_id: &str) -> i64 {
            self.db
                .products()
                .get_by_id(product_id)
                .await
                .unwrap()
                .unwrap()
                .stock
        }

        async fn customer_total(&self, customer_id: &str) -> Money {
            self.db
                .customers()
                .get_by_id(customer_id)
                .await
                .unwrap()
                .unwrap()
                .total_purchases()
        }

        async fn transaction_count(&self) -> i64 {
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
                .fetch_one(self.db.pool())
                .await
                .unwrap()
        }
    }

    fn temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("kasir-test-{}.db", uuid::Uuid::new_v4()))
    }

    fn remove_db_files(path: &PathBuf) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_sale_and_refund_scenario() {
        let shop = Shop::new().await;
        let a = shop.product("A", 10_000, 10).await;
        let customer = shop.customer().await;
        let sales = shop.db.sales();

        let record = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 3)]).with_customer(&customer),
            )
            .await
            .unwrap();

        let tx = &record.transaction;
        assert_eq!(tx.subtotal(), Money::from_cents(30_000));
        assert_eq!(tx.total(), Money::from_cents(30_000));
        assert_eq!(tx.payment_status, PaymentStatus::Paid);
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].item.snapshot.unit_price_cents, 10_000);
        assert_eq!(record.items[0].product.as_ref().unwrap().stock, 7);
        assert_eq!(record.customer.as_ref().unwrap().total_purchases_cents, 30_000);
        assert_eq!(record.user.as_ref().unwrap().id, shop.user_id);
        assert_eq!(shop.stock(&a).await, 7);
        assert_eq!(shop.customer_total(&customer).await, Money::from_cents(30_000));

        let update = sales.set_sale_status(&tx.id, "refunded").await.unwrap();
        assert_eq!(update, StatusUpdate::refunded());
        assert_eq!(shop.stock(&a).await, 10);
        assert_eq!(shop.customer_total(&customer).await, Money::zero());

        let fetched = sales.get_sale_by_id(&tx.id).await.unwrap();
        assert_eq!(fetched.transaction.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_double_refund_is_idempotent() {
        let shop = Shop::new().await;
        let a = shop.product("A", 10_000, 10).await;
        let customer = shop.customer().await;
        let sales = shop.db.sales();

        let record = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 4)]).with_customer(&customer),
            )
            .await
            .unwrap();
        let id = &record.transaction.id;

        sales.set_sale_status(id, "refunded").await.unwrap();
        let second = sales.set_sale_status(id, "refunded").await.unwrap();

        assert_eq!(second, StatusUpdate::updated());
        assert_eq!(shop.stock(&a).await, 10);
        assert_eq!(shop.customer_total(&customer).await, Money::zero());
    }

    #[tokio::test]
    async fn test_refunded_is_terminal() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 5).await;
        let sales = shop.db.sales();

        let record = sales
            .create_sale(&shop.user_id, CreateSaleRequest::cash(vec![CartItem::new(&a, 2)]))
            .await
            .unwrap();
        let id = &record.transaction.id;
        sales.set_sale_status(id, "refunded").await.unwrap();

        let err = sales.set_sale_status(id, "paid").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        // A second refund after a rejected reopen still restores nothing.
        sales.set_sale_status(id, "refunded").await.unwrap();
        assert_eq!(shop.stock(&a).await, 5);
    }

    #[tokio::test]
    async fn test_other_statuses_leave_stock_alone() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 5).await;
        let sales = shop.db.sales();

        let record = sales
            .create_sale(&shop.user_id, CreateSaleRequest::cash(vec![CartItem::new(&a, 2)]))
            .await
            .unwrap();
        let id = &record.transaction.id;

        for status in ["pending", "cancelled", "paid"] {
            let update = sales.set_sale_status(id, status).await.unwrap();
            assert_eq!(update, StatusUpdate::updated());
            assert_eq!(shop.stock(&a).await, 3);
        }

        let fetched = sales.get_sale_by_id(id).await.unwrap();
        assert_eq!(fetched.transaction.payment_status, PaymentStatus::Paid);

        let err = sales.set_sale_status(id, "lost").await.unwrap_err();
        assert!(matches!(
            err,
            SaleError::Core(CoreError::Validation(ValidationError::NotAllowed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_not_found() {
        let shop = Shop::new().await;
        let sales = shop.db.sales();

        let err = sales.get_sale_by_id("missing").await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = sales.set_sale_status("missing", "refunded").await.unwrap_err();
        assert!(matches!(err, SaleError::Core(CoreError::NotFound { .. })));

        let err = sales.set_sale_status("missing", "lost").await.unwrap_err();
        assert!(matches!(err, SaleError::Core(CoreError::NotFound { .. })));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_inactive_or_unknown_product_rejects_whole_sale() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 10).await;
        let b = shop.product("B", 1_000, 10).await;
        shop.db.products().soft_delete(&b).await.unwrap();
        let sales = shop.db.sales();

        let err = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 1), CartItem::new(&b, 1)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SaleError::Core(CoreError::Validation(ValidationError::ProductsUnavailable { ref missing }))
                if missing == &vec![b.clone()]
        ));

        let err = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 1), CartItem::new("ghost", 1)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert_eq!(shop.stock(&a).await, 10);
        assert_eq!(shop.stock(&b).await, 10);
        assert_eq!(shop.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_one_short_line_rejects_whole_sale() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 10).await;
        let b = shop.product("B", 1_000, 2).await;
        let sales = shop.db.sales();

        let err = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 3), CartItem::new(&b, 5)]),
            )
            .await
            .unwrap_err();

        match err {
            SaleError::Core(CoreError::InsufficientStock {
                product,
                available,
                requested,
            }) => {
                assert_eq!(product, "Produk B");
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(shop.stock(&a).await, 10);
        assert_eq!(shop.stock(&b).await, 2);
        assert_eq!(shop.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_lines_checked_cumulatively() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 5).await;
        let sales = shop.db.sales();

        let err = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 3), CartItem::new(&a, 3)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::Core(CoreError::InsufficientStock { .. })));

        let record = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 2), CartItem::new(&a, 3)]),
            )
            .await
            .unwrap();
        assert_eq!(record.items.len(), 2);
        assert_eq!(shop.stock(&a).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_customer_aborts_sale() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 10).await;

        let err = shop
            .db
            .sales()
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 2)]).with_customer("ghost"),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SaleError::Core(CoreError::Validation(ValidationError::CustomerNotFound(_)))
        ));
        assert_eq!(shop.stock(&a).await, 10);
        assert_eq!(shop.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_totals_with_tax_and_discount() {
        let shop = Shop::new().await;
        let a = shop.product("A", 12_500, 10).await;
        let b = shop.product("B", 3_000, 10).await;
        let sales = shop.db.sales();

        let record = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 2), CartItem::new(&b, 1)])
                    .with_tax(Money::from_cents(2_800))
                    .with_discount(Money::from_cents(1_000))
                    .with_payment_method(PaymentMethod::DigitalWallet),
            )
            .await
            .unwrap();

        let tx = &record.transaction;
        let items_sum: Money = record.items.iter().map(|i| i.item.subtotal()).sum();
        assert_eq!(tx.subtotal(), items_sum);
        assert_eq!(tx.subtotal(), Money::from_cents(28_000));
        assert_eq!(tx.total(), tx.subtotal() + tx.tax() - tx.discount());
        assert_eq!(tx.total(), Money::from_cents(29_800));
        assert_eq!(tx.payment_method, PaymentMethod::DigitalWallet);

        let err = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&b, 1)])
                    .with_discount(Money::from_cents(5_000)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(shop.stock(&b).await, 9);
    }

    #[tokio::test]
    async fn test_transaction_numbers_are_sequential() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 10).await;
        let sales = shop.db.sales();
        let prefix = format!("TRX-{}-", business_date(Local::now().date_naive()));

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let record = sales
                .create_sale(&shop.user_id, CreateSaleRequest::cash(vec![CartItem::new(&a, 1)]))
                .await
                .unwrap();
            numbers.push(record.transaction.transaction_number);
        }

        assert_eq!(
            numbers,
            vec![
                format!("{prefix}0001"),
                format!("{prefix}0002"),
                format!("{prefix}0003")
            ]
        );
    }

    #[tokio::test]
    async fn test_stock_follows_sales_and_refunds() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 20).await;
        let sales = shop.db.sales();

        let mut ids = Vec::new();
        for qty in [3, 1, 4, 2] {
            let record = sales
                .create_sale(&shop.user_id, CreateSaleRequest::cash(vec![CartItem::new(&a, qty)]))
                .await
                .unwrap();
            ids.push((record.transaction.id, qty));
        }
        assert_eq!(shop.stock(&a).await, 20 - 10);

        for (id, _) in ids.iter().filter(|(_, qty)| *qty >= 3) {
            sales.set_sale_status(id, "refunded").await.unwrap();
        }
        assert_eq!(shop.stock(&a).await, 20 - 10 + 7);
    }

    #[tokio::test]
    async fn test_invalid_payload_touches_nothing() {
        let shop = Shop::new().await;
        let err = shop
            .db
            .sales()
            .create_sale(&shop.user_id, CreateSaleRequest::cash(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::Core(CoreError::Validation(_))));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_oversized_cart_is_a_validation_error() {
        let shop = Shop::new().await;
        let a = shop.product("A", 1_000, 5_000).await;
        let sales = shop.db.sales();

        let err = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 1); 4_000]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SaleError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(err.status_code(), 400);

        let err = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, MAX_ITEM_QUANTITY + 1)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(shop.stock(&a).await, 5_000);
        assert_eq!(shop.transaction_count().await, 0);

        let record = sales
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 1); MAX_CART_ITEMS]),
            )
            .await
            .unwrap();
        assert_eq!(record.items.len(), MAX_CART_ITEMS);
        assert_eq!(shop.stock(&a).await, 5_000 - MAX_CART_ITEMS as i64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let path = temp_db_path();
        let shop = Shop::open(DbConfig::new(&path).max_connections(5)).await;
        let a = shop.product("A", 1_000, 5).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let sales = shop.db.sales();
            let user_id = shop.user_id.clone();
            let a = a.clone();
            handles.push(tokio::spawn(async move {
                sales
                    .create_sale(&user_id, CreateSaleRequest::cash(vec![CartItem::new(&a, 1)]))
                    .await
            }));
        }

        let mut sold = 0;
        let mut numbers = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => {
                    sold += 1;
                    numbers.push(record.transaction.transaction_number);
                }
                Err(SaleError::Core(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(sold, 5);
        assert_eq!(shop.stock(&a).await, 0);
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 5);

        shop.db.close().await;
        remove_db_files(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_refunds_restore_once() {
        let path = temp_db_path();
        let shop = Shop::open(DbConfig::new(&path).max_connections(5)).await;
        let a = shop.product("A", 2_500, 10).await;
        let customer = shop.customer().await;

        let record = shop
            .db
            .sales()
            .create_sale(
                &shop.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&a, 4)]).with_customer(&customer),
            )
            .await
            .unwrap();
        assert_eq!(shop.stock(&a).await, 6);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sales = shop.db.sales();
            let id = record.transaction.id.clone();
            handles.push(tokio::spawn(async move {
                sales.set_sale_status(&id, "refunded").await
            }));
        }

        let mut restored = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == StatusUpdate::refunded() {
                restored += 1;
            }
        }

        assert_eq!(restored, 1);
        assert_eq!(shop.stock(&a).await, 10);
        assert_eq!(shop.customer_total(&customer).await, Money::zero());

        shop.db.close().await;
        remove_db_files(&path);
    }

    #[tokio::test]
    async fn test_lock_contention_surfaces_as_conflict() {
        let path = temp_db_path();
        let shop = Shop::open(
            DbConfig::new(&path)
                .max_connections(3)
                .busy_timeout(Duration::from_millis(50)),
        )
        .await;
        let a = shop.product("A", 1_000, 5).await;

        let mut blocker = shop.db.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *blocker)
            .await
            .unwrap();

        let sales = shop.db.sales_with(SaleServiceConfig {
            max_attempts: 2,
            retry_backoff: Duration::from_millis(1),
        });
        let err = sales
            .create_sale(&shop.user_id, CreateSaleRequest::cash(vec![CartItem::new(&a, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, SaleError::Core(CoreError::StorageConflict { attempts: 2 })));
        assert_eq!(err.status_code(), 409);

        sqlx::query("ROLLBACK").execute(&mut *blocker).await.unwrap();
        drop(blocker);
        assert_eq!(shop.stock(&a).await, 5);

        shop.db.close().await;
        remove_db_files(&path);
    }

    #[tokio::test]
    async fn test_record_wire_shape() {
        let shop = Shop::new().await;
        let a = shop.product("A", 10_000, 10).await;

        let record = shop
            .db
            .sales()
            .create_sale(&shop.user_id, CreateSaleRequest::cash(vec![CartItem::new(&a, 2)]))
            .await
            .unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["paymentStatus"], "paid");
        assert_eq!(json["paymentMethod"], "cash");
        assert_eq!(json["totalCents"], 20_000);
        assert!(json["transactionNumber"].as_str().unwrap().starts_with("TRX-"));
        assert_eq!(json["items"][0]["productName"], "Produk A");
        assert_eq!(json["items"][0]["unitPriceCents"], 10_000);
        assert_eq!(json["items"][0]["product"]["stock"], 8);
        assert_eq!(json["user"]["fullName"], "Kasir");
        assert!(json["customer"].is_null());
    }

    #[test]
    fn test_retry_classification() {
        let busy: SaleError = DbError::Busy("database is locked".into()).into();
        assert!(busy.is_retryable());
        let stock: SaleError = CoreError::InsufficientStock {
            product: "A".into(),
            available: 0,
            requested: 1,
        }
        .into();
        assert!(!stock.is_retryable());
    }
}
