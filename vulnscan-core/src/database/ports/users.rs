use async_trait::async_trait;
use uuid::Uuid;

use crate::{domain::users::User, error::Result};

#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Insert a new account. Fails with `StoreError::Conflict` when the
    /// email (compared case-insensitively) is already registered.
    async fn create_user_with_password(
        &self,
        user: &User,
        password_hash: &str,
    ) -> Result<()>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user_password_hash(&self, id: Uuid) -> Result<Option<String>>;

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<()>;

    /// Set `is_verified`. Returns whether the flag changed, so repeating
    /// the call is harmless.
    async fn mark_verified(&self, id: Uuid) -> Result<bool>;
}
