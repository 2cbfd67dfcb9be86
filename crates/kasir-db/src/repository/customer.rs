//! # Customer Repository
//!
//! Customer records for the dashboard. `total_purchases_cents` is read
//! here but only ever written by the sale ledger; no method in this
//! module touches it.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kasir_core::input::{CustomerFilter, CustomerUpdate, NewCustomer, Page, PageRequest};
use kasir_core::report::CustomerStats;
use kasir_core::validation::{
    validate_customer_update, validate_new_customer, validate_search_query,
};
use kasir_core::{new_id, Customer};

pub(crate) const CUSTOMER_COLUMNS: &str = "id, name, email, phone, address, \
     total_purchases_cents, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn create(&self, input: NewCustomer) -> DbResult<Customer> {
        validate_new_customer(&input)?;
        debug!(name = %input.name, "Inserting customer");

        let now = Utc::now();
        let customer = Customer {
            id: new_id(),
            name: input.name.trim().to_string(),
            email: input.email,
            phone: input.phone,
            address: input.address,
            total_purchases_cents: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, email, phone, address,
                total_purchases_cents, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.total_purchases_cents)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Searches name, email and phone. Active customers first, then by name.
    pub async fn list(&self, filter: &CustomerFilter) -> DbResult<Page<Customer>> {
        let search = validate_search_query(filter.search.as_deref())?;
        let page = PageRequest::new(filter.page, filter.limit);

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM customers WHERE 1 = 1");
        push_customer_search(&mut count_qb, search.as_deref());
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE 1 = 1"
        ));
        push_customer_search(&mut qb, search.as_deref());
        qb.push(" ORDER BY is_active DESC, name ASC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let customers = qb.build_query_as::<Customer>().fetch_all(&self.pool).await?;
        Ok(Page::new(customers, page, total))
    }

    /// Contact details only.
    pub async fn update(&self, id: &str, update: &CustomerUpdate) -> DbResult<Customer> {
        validate_customer_update(update)?;
        debug!(id = %id, "Updating customer");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE customers SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(name) = &update.name {
            qb.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(email) = &update.email {
            qb.push(", email = ").push_bind(email.clone());
        }
        if let Some(phone) = &update.phone {
            qb.push(", phone = ").push_bind(phone.clone());
        }
        if let Some(address) = &update.address {
            qb.push(", address = ").push_bind(address.clone());
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Flips `is_active` and returns the new state.
    pub async fn toggle_active(&self, id: &str) -> DbResult<Customer> {
        debug!(id = %id, "Toggling customer");

        let result = sqlx::query(
            "UPDATE customers SET is_active = NOT is_active, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn stats(&self) -> DbResult<CustomerStats> {
        let (total, active): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(is_active = 1), 0) FROM customers")
                .fetch_one(&self.pool)
                .await?;

        Ok(CustomerStats { total, active })
    }
}

fn push_customer_search(qb: &mut QueryBuilder<'_, Sqlite>, search: Option<&str>) {
    if let Some(search) = search {
        let pattern = format!("%{search}%");
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
