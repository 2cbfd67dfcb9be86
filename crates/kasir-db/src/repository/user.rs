//! # User Repository
//!
//! Operators. Authentication is handled outside this crate; a sale only
//! needs to know who rang it up.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use kasir_core::input::NewUser;
use kasir_core::validation::validate_new_user;
use kasir_core::{new_id, User, UserSummary};

const USER_COLUMNS: &str = "id, full_name, email, role, is_active, created_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - email already registered
    pub async fn create(&self, input: NewUser) -> DbResult<User> {
        validate_new_user(&input)?;
        debug!(email = %input.email, "Inserting user");

        let user = User {
            id: new_id(),
            full_name: input.full_name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            role: input.role,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, full_name, email, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", &user.email),
            other => other,
        })?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_summary(&self, id: &str) -> DbResult<Option<UserSummary>> {
        Ok(self.get_by_id(id).await?.map(UserSummary::from))
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY full_name ASC");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use kasir_core::UserRole;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        let user = repo
            .create(NewUser {
                full_name: "Kasir Satu".into(),
                email: "Kasir1@Toko.id".into(),
                role: UserRole::Cashier,
            })
            .await
            .unwrap();

        let by_email = repo.get_by_email("kasir1@toko.id").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.role, UserRole::Cashier);

        let summary = repo.get_summary(&user.id).await.unwrap().unwrap();
        assert_eq!(summary.full_name, "Kasir Satu");
        assert!(repo.get_summary("missing").await.unwrap().is_none());

        let err = repo
            .create(NewUser {
                full_name: "Lagi".into(),
                email: "kasir1@toko.id".into(),
                role: UserRole::Admin,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "email"));

        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
