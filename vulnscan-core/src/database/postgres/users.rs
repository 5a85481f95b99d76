use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::{column, db_error};
use crate::{
    database::ports::users::UsersRepository,
    domain::users::{User, normalize_email},
    error::{Result, StoreError},
};

const EMAIL_UNIQUE_CONSTRAINT: &str = "idx_users_email_unique";

/// PostgreSQL-backed implementation of the `UsersRepository` port.
#[derive(Clone, Debug)]
pub struct PostgresUsersRepository {
    pool: PgPool,
}

impl PostgresUsersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<User> {
        Ok(User {
            id: column(row, "id")?,
            email: column(row, "email")?,
            name: column(row, "name")?,
            is_verified: column(row, "is_verified")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl UsersRepository for PostgresUsersRepository {
    async fn create_user_with_password(
        &self,
        user: &User,
        password_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(password_hash)
        .bind(user.is_verified)
        .bind(user.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error()
                && db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT)
            {
                return StoreError::Conflict("Email already exists".to_string());
            }
            StoreError::Database(format!("Failed to create user: {e}"))
        })?;

        info!(user_id = %user.id, "created user");
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, is_verified, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Failed to get user by id"))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, is_verified, created_at
            FROM users
            WHERE lower(email) = $1
            LIMIT 1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Failed to get user by email"))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_user_password_hash(&self, id: Uuid) -> Result<Option<String>> {
        let row = sqlx::query("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error("Failed to get password hash"))?;

        row.as_ref()
            .map(|row| column(row, "password_hash"))
            .transpose()
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool())
        .await
        .map_err(db_error("Failed to update password hash"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, updated_at = NOW()
            WHERE id = $1 AND is_verified = FALSE
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(db_error("Failed to mark user verified"))?;

        Ok(result.rows_affected() > 0)
    }
}
