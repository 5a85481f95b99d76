use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgRow};

use super::{column, db_error};
use crate::{
    database::ports::verification_tokens::{
        NewVerificationToken, VerificationTokenRecord, VerificationTokenRepository,
    },
    error::Result,
};

#[derive(Debug, Clone)]
pub struct PostgresVerificationTokenRepository {
    pool: PgPool,
}

impl PostgresVerificationTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<VerificationTokenRecord> {
        Ok(VerificationTokenRecord {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            token_hash: column(row, "token_hash")?,
            expires_at: column(row, "expires_at")?,
            used_at: column(row, "used_at")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl VerificationTokenRepository for PostgresVerificationTokenRepository {
    async fn insert(&self, token: NewVerificationToken) -> Result<VerificationTokenRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO email_verification_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, used_at, created_at
            "#,
        )
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(db_error("Failed to create verification token"))?;

        Self::map_row(&row)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<VerificationTokenRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token_hash, expires_at, used_at, created_at
            FROM email_verification_tokens
            WHERE token_hash = $1
            LIMIT 1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Failed to load verification token"))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn mark_used(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE email_verification_tokens
            SET used_at = $2
            WHERE token_hash = $1 AND used_at IS NULL
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(db_error("Failed to mark verification token used"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_stale(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM email_verification_tokens
            WHERE (used_at IS NOT NULL AND used_at < $1)
               OR expires_at < $1
            "#,
        )
        .bind(older_than)
        .execute(self.pool())
        .await
        .map_err(db_error("Failed to purge verification tokens"))?;

        Ok(result.rows_affected())
    }
}
