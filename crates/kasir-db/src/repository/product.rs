//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - `find_active_by_ids` - the catalog lookup a sale starts from
//! - Filtered, paginated listing for the dashboard
//! - Partial and bulk edits (catalog corrections)
//! - Soft delete (deactivation, never erasure)
//!
//! ## Who Moves `stock`
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleService ──► ledger::apply_stock_delta   (sale −qty, refund +qty)   │
//! │                  guarded, inside the sale's unit of work                │
//! │                                                                         │
//! │  ProductRepository::update / bulk_update     (manual stock correction)  │
//! │                  absolute value, validated ≥ 0                          │
//! │                                                                         │
//! │  Nothing else writes products.stock.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kasir_core::input::{
    BulkProductUpdate, NewProduct, Page, PageRequest, ProductFilter, ProductUpdate,
};
use kasir_core::report::{CatalogStats, CategoryProductCount};
use kasir_core::validation::{
    validate_bulk_update, validate_new_product, validate_product_update, validate_search_query,
};
use kasir_core::{new_id, Product, StockLevel};

/// Column list matching [`Product`]'s `FromRow` derive.
pub(crate) const PRODUCT_COLUMNS: &str = "id, category_id, sku, barcode, name, description, \
     price_cents, cost_cents, stock, min_stock, is_active, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let page = repo.list(&ProductFilter { search: Some("kopi".into()), ..Default::default() }).await?;
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Returns the active products among `ids`.
    ///
    /// Fewer rows than distinct ids means at least one id is unknown or
    /// deactivated; the caller decides what that means.
    pub async fn find_active_by_ids(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        find_active_by_ids(&mut conn, ids).await
    }

    /// Gets a product by its ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU (e.g. "KOPI-01").
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn create(&self, input: NewProduct) -> DbResult<Product> {
        validate_new_product(&input)?;
        debug!(sku = %input.sku, "Inserting product");

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            category_id: input.category_id,
            sku: input.sku.trim().to_string(),
            barcode: input.barcode,
            name: input.name.trim().to_string(),
            description: input.description,
            price_cents: input.price.cents(),
            cost_cents: input.cost.map(|c| c.cents()),
            stock: input.stock,
            min_stock: input.min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, category_id, sku, barcode, name, description,
                price_cents, cost_cents, stock, min_stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| with_sku(e.into(), &product.sku))?;

        Ok(product)
    }

    /// Filtered, sorted, paginated listing.
    ///
    /// ## Stock Level Filter
    /// ```text
    /// out     stock = 0
    /// low     0 < stock < min_stock
    /// normal  min_stock ≤ stock < 100
    /// high    stock ≥ 100 (and ≥ min_stock)
    /// ```
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Page<Product>> {
        let search = validate_search_query(filter.search.as_deref())?;
        let page = PageRequest::new(filter.page, filter.limit);

        debug!(search = ?search, page = page.page, limit = page.limit, "Listing products");

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products WHERE 1 = 1");
        push_product_filters(&mut count_qb, filter, search.as_deref());
        let total: i64 = count_qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"
        ));
        push_product_filters(&mut qb, filter, search.as_deref());
        // Column and direction come from closed enums, never from input text.
        qb.push(format!(
            " ORDER BY {} {}, id ASC LIMIT ",
            filter.sort_by.column(),
            filter.sort_order.keyword()
        ));
        qb.push_bind(page.limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;

        Ok(Page::new(products, page, total))
    }

    /// Active products below their reorder threshold, lowest stock first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND stock < min_stock \
             ORDER BY stock ASC, name ASC"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Applies a partial edit. Only the fields present in `update` are
    /// written, so a concurrent sale's stock movement is never overwritten
    /// by an edit that did not touch stock.
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        validate_product_update(update)?;
        debug!(id = %id, "Updating product");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = ");
        qb.push_bind(Utc::now());

        if let Some(sku) = &update.sku {
            qb.push(", sku = ").push_bind(sku.trim().to_string());
        }
        if let Some(name) = &update.name {
            qb.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(category_id) = &update.category_id {
            qb.push(", category_id = ").push_bind(category_id.clone());
        }
        if let Some(barcode) = &update.barcode {
            qb.push(", barcode = ").push_bind(barcode.clone());
        }
        if let Some(description) = &update.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(price) = update.price {
            qb.push(", price_cents = ").push_bind(price.cents());
        }
        if let Some(cost) = update.cost {
            qb.push(", cost_cents = ").push_bind(cost.map(|c| c.cents()));
        }
        if let Some(stock) = update.stock {
            qb.push(", stock = ").push_bind(stock);
        }
        if let Some(min_stock) = update.min_stock {
            qb.push(", min_stock = ").push_bind(min_stock);
        }
        if let Some(is_active) = update.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await.map_err(|e| {
            let err = DbError::from(e);
            match &update.sku {
                Some(sku) => with_sku(err, sku),
                None => err,
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Applies the same price / stock / active edit to many products.
    ///
    /// ## Returns
    /// Number of products changed. Unknown ids are ignored.
    pub async fn bulk_update(&self, update: &BulkProductUpdate) -> DbResult<u64> {
        validate_bulk_update(update)?;
        debug!(count = update.ids.len(), "Bulk-updating products");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(price) = update.price {
            qb.push(", price_cents = ").push_bind(price.cents());
        }
        if let Some(stock) = update.stock {
            qb.push(", stock = ").push_bind(stock);
        }
        if let Some(is_active) = update.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        qb.push(" WHERE id IN (");
        let mut ids = qb.separated(", ");
        for id in &update.ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Historical transaction items still reference this product id
    /// - Can be restored if deleted by mistake
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Catalog overview for the dashboard.
    pub async fn stats(&self) -> DbResult<CatalogStats> {
        let (total, active, low_stock, out_of_stock, total_stock): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(is_active = 1), 0),
                    COALESCE(SUM(is_active = 1 AND stock < min_stock), 0),
                    COALESCE(SUM(is_active = 1 AND stock = 0), 0),
                    COALESCE(SUM(stock), 0)
                FROM products
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(CatalogStats {
            total,
            active,
            low_stock,
            out_of_stock,
            total_stock,
        })
    }

    /// Active categories with their count of active products.
    pub async fn count_by_category(&self) -> DbResult<Vec<CategoryProductCount>> {
        let rows = sqlx::query_as::<_, CategoryProductCount>(
            r#"
            SELECT
                c.id,
                c.name,
                c.color,
                COUNT(p.id) AS product_count
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id AND p.is_active = 1
            WHERE c.is_active = 1
            GROUP BY c.id, c.name, c.color
            ORDER BY c.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// In-transaction variant of [`ProductRepository::find_active_by_ids`].
pub(crate) async fn find_active_by_ids(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> DbResult<Vec<Product>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 AND id IN ("
    ));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");

    let products = qb.build_query_as::<Product>().fetch_all(&mut *conn).await?;
    debug!(requested = ids.len(), found = products.len(), "Resolved active products");
    Ok(products)
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter, search: Option<&str>) {
    if let Some(search) = search {
        let pattern = format!("%{search}%");
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku LIKE ")
            .push_bind(pattern.clone())
            .push(" OR barcode LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(category_id) = &filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id.clone());
    }
    if let Some(min_price) = filter.min_price {
        qb.push(" AND price_cents >= ").push_bind(min_price.cents());
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND price_cents <= ").push_bind(max_price.cents());
    }
    if let Some(level) = filter.stock_level {
        qb.push(match level {
            StockLevel::Out => " AND stock <= 0",
            StockLevel::Low => " AND stock > 0 AND stock < min_stock",
            StockLevel::Normal => " AND stock >= min_stock AND stock < 100",
            StockLevel::High => " AND stock >= 100 AND stock >= min_stock",
        });
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}

/// Fills in the offending SKU on a SKU uniqueness violation.
fn with_sku(err: DbError, sku: &str) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } if field.contains("products.sku") => {
            DbError::duplicate("sku", sku)
        }
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use kasir_core::input::{ProductSort, SortOrder};
    use kasir_core::Money;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn new_product(sku: &str, name: &str, price_cents: i64, stock: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: name.to_string(),
            category_id: None,
            barcode: None,
            description: None,
            price: Money::from_cents(price_cents),
            cost: None,
            stock,
            min_stock: 10,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = db().await;
        let repo = db.products();

        let created = repo
            .create(new_product("KOPI-01", "Kopi Susu", 18_000, 50))
            .await
            .unwrap();

        let by_id = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "KOPI-01");
        assert_eq!(by_id.price(), Money::from_cents(18_000));
        assert!(by_id.is_active);

        let by_sku = repo.get_by_sku("KOPI-01").await.unwrap().unwrap();
        assert_eq!(by_sku.id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = db().await;
        let repo = db.products();

        repo.create(new_product("KOPI-01", "Kopi", 1, 1)).await.unwrap();
        let err = repo
            .create(new_product("KOPI-01", "Kopi lagi", 1, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let db = db().await;
        let err = db
            .products()
            .create(new_product("KOPI-01", "Kopi", -1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_find_active_by_ids_skips_inactive_and_unknown() {
        let db = db().await;
        let repo = db.products();

        let a = repo.create(new_product("A", "A", 100, 5)).await.unwrap();
        let b = repo.create(new_product("B", "B", 100, 5)).await.unwrap();
        repo.soft_delete(&b.id).await.unwrap();

        let found = repo
            .find_active_by_ids(&[a.id.clone(), b.id.clone(), "nope".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);

        // Soft delete keeps the row.
        assert!(!repo.get_by_id(&b.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let db = db().await;
        let repo = db.products();

        repo.create(new_product("KOPI-01", "Kopi Susu", 18_000, 0)).await.unwrap();
        repo.create(new_product("KOPI-02", "Kopi Hitam", 15_000, 5)).await.unwrap();
        repo.create(new_product("TEH-01", "Teh Manis", 8_000, 50)).await.unwrap();
        repo.create(new_product("AIR-01", "Air Mineral", 5_000, 150)).await.unwrap();

        let kopi = repo
            .list(&ProductFilter {
                search: Some("kopi".into()),
                sort_by: ProductSort::Price,
                sort_order: SortOrder::Asc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(kopi.meta.total, 2);
        assert_eq!(kopi.data[0].sku, "KOPI-02");

        let out = repo
            .list(&ProductFilter {
                stock_level: Some(StockLevel::Out),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.data.len(), 1);
        assert_eq!(out.data[0].sku, "KOPI-01");

        let low = repo
            .list(&ProductFilter {
                stock_level: Some(StockLevel::Low),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low.data.len(), 1);
        assert_eq!(low.data[0].sku, "KOPI-02");

        let high = repo
            .list(&ProductFilter {
                stock_level: Some(StockLevel::High),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(high.data[0].sku, "AIR-01");

        let priced = repo
            .list(&ProductFilter {
                min_price: Some(Money::from_cents(6_000)),
                max_price: Some(Money::from_cents(16_000)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(priced.meta.total, 2);

        let paged = repo
            .list(&ProductFilter {
                page: Some(2),
                limit: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.meta.total, 4);
        assert_eq!(paged.meta.total_pages, 2);
        assert_eq!(paged.data.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_update_touches_only_given_fields() {
        let db = db().await;
        let repo = db.products();

        let mut input = new_product("KOPI-01", "Kopi", 18_000, 50);
        input.barcode = Some("8991234567890".into());
        let p = repo.create(input).await.unwrap();

        let updated = repo
            .update(
                &p.id,
                &ProductUpdate {
                    price: Some(Money::from_cents(20_000)),
                    barcode: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price_cents, 20_000);
        assert_eq!(updated.barcode, None);
        assert_eq!(updated.stock, 50);
        assert_eq!(updated.name, "Kopi");

        let err = repo
            .update("missing", &ProductUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_bulk_update_and_stats() {
        let db = db().await;
        let repo = db.products();

        let a = repo.create(new_product("A", "A", 100, 0)).await.unwrap();
        let b = repo.create(new_product("B", "B", 100, 5)).await.unwrap();
        repo.create(new_product("C", "C", 100, 20)).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.low_stock, 2);
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.total_stock, 25);

        let changed = repo
            .bulk_update(&BulkProductUpdate {
                ids: vec![a.id.clone(), b.id.clone()],
                price: Some(Money::from_cents(250)),
                stock: Some(30),
                is_active: None,
            })
            .await
            .unwrap();
        assert_eq!(changed, 2);

        assert!(repo.low_stock().await.unwrap().is_empty());
        assert_eq!(repo.get_by_id(&a.id).await.unwrap().unwrap().price_cents, 250);
    }
}
