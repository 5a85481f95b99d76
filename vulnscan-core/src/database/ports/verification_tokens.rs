use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NewVerificationToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait VerificationTokenRepository: Send + Sync {
    async fn insert(
        &self,
        token: NewVerificationToken,
    ) -> Result<VerificationTokenRecord>;

    /// Lookup by token digest, regardless of expiry or use.
    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationTokenRecord>>;

    /// Stamp `used_at` if it is still null. Returns whether a row changed;
    /// an already consumed token is left untouched.
    async fn mark_used(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Delete tokens that were consumed or expired before `older_than`.
    async fn purge_stale(&self, older_than: DateTime<Utc>) -> Result<u64>;
}
