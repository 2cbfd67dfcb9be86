//! # Report Repository
//!
//! Read-only aggregations for the dashboard. Every query here runs on the
//! pool outside any unit of work; WAL gives each one a consistent snapshot.
//!
//! "Today" is the server's local calendar day, matched against
//! `transactions.business_date`, the same key transaction numbers use.

use chrono::{Local, NaiveDate};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::builder::business_date;
use kasir_core::report::{DailySales, SalesStats, StatusSummary, TopSellingProduct};
use kasir_core::Money;

/// Longest window [`ReportRepository::daily_sales`] will build.
pub const MAX_REPORT_DAYS: u32 = 366;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Headline figures over an optional inclusive date range, plus today's
    /// paid figures regardless of range.
    pub async fn sales_stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> DbResult<SalesStats> {
        let range = DateRange {
            start: start.map(business_date),
            end: end.map(business_date),
        };
        debug!(start = ?range.start, end = ?range.end, "Computing sales stats");

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN t.payment_status = 'paid' THEN t.total_cents END), 0) \
             FROM transactions t WHERE 1 = 1",
        );
        range.push(&mut qb);
        let (total_transactions, revenue_cents): (i64, i64) =
            qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COALESCE(SUM((ti.unit_price_cents - COALESCE(p.cost_cents, 0)) * ti.quantity), 0) \
             FROM transaction_items ti \
             JOIN transactions t ON t.id = ti.transaction_id \
             JOIN products p ON p.id = ti.product_id \
             WHERE t.payment_status = 'paid'",
        );
        range.push(&mut qb);
        let profit_cents: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT t.payment_status, COUNT(*) AS count, \
             COALESCE(SUM(t.total_cents), 0) AS total_cents \
             FROM transactions t WHERE 1 = 1",
        );
        range.push(&mut qb);
        qb.push(" GROUP BY t.payment_status ORDER BY t.payment_status ASC");
        let by_status = qb
            .build_query_as::<StatusSummary>()
            .fetch_all(&self.pool)
            .await?;

        let today = business_date(Local::now().date_naive());
        let (today_transactions, today_revenue_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total_cents), 0)
            FROM transactions
            WHERE payment_status = 'paid' AND business_date = ?1
            "#,
        )
        .bind(&today)
        .fetch_one(&self.pool)
        .await?;

        let today_products_sold: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(ti.quantity), 0)
            FROM transaction_items ti
            JOIN transactions t ON t.id = ti.transaction_id
            WHERE t.payment_status = 'paid' AND t.business_date = ?1
            "#,
        )
        .bind(&today)
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesStats {
            total_transactions,
            total_revenue: Money::from_cents(revenue_cents),
            total_profit: Money::from_cents(profit_cents),
            by_status,
            today_revenue: Money::from_cents(today_revenue_cents),
            today_transactions,
            today_products_sold,
        })
    }

    /// Paid sales per day for the last `days` days ending today, oldest
    /// first. Days without sales are present with zero.
    pub async fn daily_sales(&self, days: u32) -> DbResult<Vec<DailySales>> {
        let days = days.clamp(1, MAX_REPORT_DAYS);
        let today = Local::now().date_naive();
        let first = today - chrono::Duration::days(i64::from(days) - 1);

        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT business_date, COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM transactions
            WHERE payment_status = 'paid' AND business_date >= ?1 AND business_date <= ?2
            GROUP BY business_date
            "#,
        )
        .bind(business_date(first))
        .bind(business_date(today))
        .fetch_all(&self.pool)
        .await?;

        Ok(first
            .iter_days()
            .take(days as usize)
            .map(|day| {
                let key = business_date(day);
                let (total, count) = rows
                    .iter()
                    .find(|(date, _, _)| *date == key)
                    .map(|(_, total, count)| (*total, *count))
                    .unwrap_or((0, 0));
                DailySales {
                    date: day.format("%Y-%m-%d").to_string(),
                    total_sales: Money::from_cents(total),
                    count,
                }
            })
            .collect())
    }

    /// Today's best sellers by quantity over paid sales.
    pub async fn top_selling_today(&self, limit: u32) -> DbResult<Vec<TopSellingProduct>> {
        let today = business_date(Local::now().date_naive());

        let rows = sqlx::query_as::<_, TopSellingProduct>(
            r#"
            SELECT
                ti.product_id,
                p.name,
                COALESCE(c.name, 'Uncategorized') AS category,
                p.price_cents,
                SUM(ti.quantity) AS total_sold,
                SUM(ti.subtotal_cents) AS total_revenue_cents
            FROM transaction_items ti
            JOIN transactions t ON t.id = ti.transaction_id
            JOIN products p ON p.id = ti.product_id
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE t.payment_status = 'paid' AND t.business_date = ?1
            GROUP BY ti.product_id, p.name, c.name, p.price_cents
            ORDER BY total_sold DESC, p.name ASC
            LIMIT ?2
            "#,
        )
        .bind(today)
        .bind(i64::from(limit.max(1)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

struct DateRange {
    start: Option<String>,
    end: Option<String>,
}

impl DateRange {
    fn push(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(start) = &self.start {
            qb.push(" AND t.business_date >= ").push_bind(start.clone());
        }
        if let Some(end) = &self.end {
            qb.push(" AND t.business_date <= ").push_bind(end.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use kasir_core::input::{CartItem, CreateSaleRequest, NewCategory, NewProduct, NewUser};
    use kasir_core::{PaymentStatus, UserRole};

    struct Fixture {
        db: Database,
        user_id: String,
        kopi: String,
        teh: String,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create(NewUser {
                full_name: "Kasir".into(),
                email: "kasir@toko.id".into(),
                role: UserRole::Cashier,
            })
            .await
            .unwrap();
        let minuman = db
            .categories()
            .create(NewCategory {
                name: "Minuman".into(),
                description: None,
                color: None,
            })
            .await
            .unwrap();

        let product = |sku: &str, price: i64, cost: Option<i64>, category: Option<String>| NewProduct {
            sku: sku.into(),
            name: sku.into(),
            category_id: category,
            barcode: None,
            description: None,
            price: Money::from_cents(price),
            cost: cost.map(Money::from_cents),
            stock: 100,
            min_stock: 10,
        };

        let kopi = db
            .products()
            .create(product("KOPI", 10_000, Some(6_000), Some(minuman.id.clone())))
            .await
            .unwrap();
        let teh = db
            .products()
            .create(product("TEH", 5_000, None, None))
            .await
            .unwrap();

        Fixture {
            db,
            user_id: user.id,
            kopi: kopi.id,
            teh: teh.id,
        }
    }

    #[tokio::test]
    async fn test_sales_stats_counts_paid_only() {
        let f = fixture().await;
        let sales = f.db.sales();

        sales
            .create_sale(&f.user_id, CreateSaleRequest::cash(vec![CartItem::new(&f.kopi, 2)]))
            .await
            .unwrap();
        sales
            .create_sale(&f.user_id, CreateSaleRequest::cash(vec![CartItem::new(&f.teh, 3)]))
            .await
            .unwrap();
        let refunded = sales
            .create_sale(&f.user_id, CreateSaleRequest::cash(vec![CartItem::new(&f.kopi, 1)]))
            .await
            .unwrap();
        sales
            .set_sale_status(&refunded.transaction.id, "refunded")
            .await
            .unwrap();

        let stats = f.db.reports().sales_stats(None, None).await.unwrap();
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.total_revenue, Money::from_cents(35_000));
        // Kopi: (10000 - 6000) * 2, teh has no cost: 5000 * 3.
        assert_eq!(stats.total_profit, Money::from_cents(23_000));
        assert_eq!(stats.today_transactions, 2);
        assert_eq!(stats.today_revenue, Money::from_cents(35_000));
        assert_eq!(stats.today_products_sold, 5);

        let refunded_row = stats
            .by_status
            .iter()
            .find(|s| s.payment_status == PaymentStatus::Refunded)
            .unwrap();
        assert_eq!(refunded_row.count, 1);
        assert_eq!(refunded_row.total_cents, 10_000);

        let past = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let empty = f.db.reports().sales_stats(Some(past), Some(past)).await.unwrap();
        assert_eq!(empty.total_transactions, 0);
        assert!(empty.by_status.is_empty());
    }

    #[tokio::test]
    async fn test_daily_sales_zero_filled() {
        let f = fixture().await;
        f.db.sales()
            .create_sale(&f.user_id, CreateSaleRequest::cash(vec![CartItem::new(&f.teh, 1)]))
            .await
            .unwrap();

        let days = f.db.reports().daily_sales(7).await.unwrap();
        assert_eq!(days.len(), 7);
        assert!(days[..6].iter().all(|d| d.count == 0 && d.total_sales.is_zero()));
        assert_eq!(days[6].count, 1);
        assert_eq!(days[6].total_sales, Money::from_cents(5_000));
        assert_eq!(
            days[6].date,
            Local::now().date_naive().format("%Y-%m-%d").to_string()
        );
    }

    #[tokio::test]
    async fn test_top_selling_today() {
        let f = fixture().await;
        let sales = f.db.sales();
        sales
            .create_sale(
                &f.user_id,
                CreateSaleRequest::cash(vec![CartItem::new(&f.kopi, 1), CartItem::new(&f.teh, 4)]),
            )
            .await
            .unwrap();
        sales
            .create_sale(&f.user_id, CreateSaleRequest::cash(vec![CartItem::new(&f.kopi, 2)]))
            .await
            .unwrap();

        let top = f.db.reports().top_selling_today(5).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, f.teh);
        assert_eq!(top[0].total_sold, 4);
        assert_eq!(top[0].category, "Uncategorized");
        assert_eq!(top[1].category, "Minuman");
        assert_eq!(top[1].total_sold, 3);
        assert_eq!(top[1].total_revenue_cents, 30_000);
    }
}
