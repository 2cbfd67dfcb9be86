//! # Category Repository
//!
//! Product groupings. Deactivated, never deleted: products keep their
//! `category_id` either way.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kasir_core::input::{CategoryFilter, CategoryUpdate, NewCategory, Page, PageRequest};
use kasir_core::report::CategoryStats;
use kasir_core::validation::{
    validate_category_update, validate_new_category, validate_search_query,
};
use kasir_core::{new_id, Category};

const CATEGORY_COLUMNS: &str = "id, name, description, color, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn create(&self, input: NewCategory) -> DbResult<Category> {
        validate_new_category(&input)?;
        debug!(name = %input.name, "Inserting category");

        let now = Utc::now();
        let category = Category {
            id: new_id(),
            name: input.name.trim().to_string(),
            description: input.description,
            color: input.color,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, color, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.color)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("name", &category.name),
            other => other,
        })?;

        Ok(category)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    /// Lists categories by name. Only active ones unless the filter says
    /// otherwise.
    pub async fn list(&self, filter: &CategoryFilter) -> DbResult<Page<Category>> {
        let search = validate_search_query(filter.search.as_deref())?;
        let page = PageRequest::new(filter.page, filter.limit);
        let is_active = filter.is_active.unwrap_or(true);

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM categories");
        push_category_filters(&mut count_qb, is_active, search.as_deref());
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {CATEGORY_COLUMNS} FROM categories"));
        push_category_filters(&mut qb, is_active, search.as_deref());
        qb.push(" ORDER BY name ASC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let categories = qb.build_query_as::<Category>().fetch_all(&self.pool).await?;
        Ok(Page::new(categories, page, total))
    }

    pub async fn update(&self, id: &str, update: &CategoryUpdate) -> DbResult<Category> {
        validate_category_update(update)?;
        debug!(id = %id, "Updating category");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE categories SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(name) = &update.name {
            qb.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(description) = &update.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(color) = &update.color {
            qb.push(", color = ").push_bind(color.clone());
        }
        if let Some(is_active) = update.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting category");

        let result = sqlx::query("UPDATE categories SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        Ok(())
    }

    pub async fn stats(&self) -> DbResult<CategoryStats> {
        let (total, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(is_active = 1), 0) FROM categories",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CategoryStats {
            total,
            active,
            inactive: total - active,
        })
    }
}

fn push_category_filters(qb: &mut QueryBuilder<'_, Sqlite>, is_active: bool, search: Option<&str>) {
    qb.push(" WHERE is_active = ").push_bind(is_active);
    if let Some(search) = search {
        let pattern = format!("%{search}%");
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR description LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            description: None,
            color: Some("#10B981".to_string()),
        }
    }

    #[tokio::test]
    async fn test_category_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        let minuman = repo.create(new_category("Minuman")).await.unwrap();
        let makanan = repo.create(new_category("Makanan")).await.unwrap();

        let page = repo.list(&CategoryFilter::default()).await.unwrap();
        assert_eq!(page.meta.total, 2);
        assert_eq!(page.data[0].name, "Makanan");

        repo.soft_delete(&makanan.id).await.unwrap();
        let page = repo.list(&CategoryFilter::default()).await.unwrap();
        assert_eq!(page.data.len(), 1);

        let inactive = repo
            .list(&CategoryFilter {
                is_active: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(inactive.data[0].id, makanan.id);

        let renamed = repo
            .update(
                &minuman.id,
                &CategoryUpdate {
                    name: Some("Minuman Dingin".into()),
                    color: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Minuman Dingin");
        assert_eq!(renamed.color, None);

        let stats = repo.stats().await.unwrap();
        assert_eq!(
            stats,
            CategoryStats {
                total: 2,
                active: 1,
                inactive: 1
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_name_and_bad_color() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        repo.create(new_category("Snack")).await.unwrap();
        let err = repo.create(new_category("Snack")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let mut bad = new_category("Roti");
        bad.color = Some("green".into());
        assert!(matches!(
            repo.create(bad).await.unwrap_err(),
            DbError::Validation(_)
        ));
    }
}
