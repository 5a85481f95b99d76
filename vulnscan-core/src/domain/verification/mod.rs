//! Single-use email verification tokens.
//!
//! A token is valid while `used_at` is null and `now < expires_at`.
//! Checking a token and spending it are separate steps: callers run
//! `verify`, apply their side effect, then `consume`. Consumption is a
//! conditional update, so replaying the last step after a crash is a no-op.

use std::{any::type_name_of_val, fmt, sync::Arc};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    database::ports::verification_tokens::{
        NewVerificationToken, VerificationTokenRepository,
    },
    domain::users::auth::AuthCrypto,
    error::StoreError,
};

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const TOKEN_PREFIX: &str = "verify_";
const TOKEN_ENTROPY_BYTES: usize = 32;

pub struct VerificationService<R>
where
    R: VerificationTokenRepository + ?Sized,
{
    repository: Arc<R>,
    crypto: Arc<AuthCrypto>,
    token_ttl: Duration,
}

impl<R> Clone for VerificationService<R>
where
    R: VerificationTokenRepository + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            crypto: Arc::clone(&self.crypto),
            token_ttl: self.token_ttl,
        }
    }
}

impl<R> fmt::Debug for VerificationService<R>
where
    R: VerificationTokenRepository + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationService")
            .field("repository", &type_name_of_val(self.repository.as_ref()))
            .field("crypto", &type_name_of_val(self.crypto.as_ref()))
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl<R> VerificationService<R>
where
    R: VerificationTokenRepository + ?Sized,
{
    pub fn new(repository: Arc<R>, crypto: Arc<AuthCrypto>) -> Self {
        Self {
            repository,
            crypto,
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    /// Override the default token TTL (primarily for tests).
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Issue a new token for `user_id`. Only its digest is stored.
    pub async fn create(
        &self,
        user_id: Uuid,
    ) -> Result<IssuedToken, VerificationError> {
        let token = generate_token()?;
        let expires_at = Utc::now() + self.token_ttl;

        let record = self
            .repository
            .insert(NewVerificationToken {
                user_id,
                token_hash: self.crypto.hash_token(&token),
                expires_at,
            })
            .await?;

        Ok(IssuedToken {
            token,
            user_id: record.user_id,
            expires_at: record.expires_at,
        })
    }

    /// Check a token without spending it.
    pub async fn verify(
        &self,
        token: &str,
    ) -> Result<VerifiedToken, VerificationError> {
        self.verify_at(token, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedToken, VerificationError> {
        if token.trim().is_empty() {
            return Err(VerificationError::NotFound);
        }

        let record = self
            .repository
            .find_by_hash(&self.crypto.hash_token(token))
            .await?
            .ok_or(VerificationError::NotFound)?;

        if record.used_at.is_some() {
            return Err(VerificationError::AlreadyUsed);
        }

        if now >= record.expires_at {
            return Err(VerificationError::Expired {
                expired_at: record.expires_at,
            });
        }

        Ok(VerifiedToken {
            user_id: record.user_id,
            expires_at: record.expires_at,
        })
    }

    /// Mark a token as spent. Returns `false` when it was already spent.
    pub async fn consume(&self, token: &str) -> Result<bool, VerificationError> {
        let hashed = self.crypto.hash_token(token);
        Ok(self.repository.mark_used(&hashed, Utc::now()).await?)
    }

    pub async fn purge_stale(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, VerificationError> {
        Ok(self.repository.purge_stale(older_than).await?)
    }
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Invalid token")]
    NotFound,
    #[error("Token already used")]
    AlreadyUsed,
    #[error("Token expired")]
    Expired { expired_at: DateTime<Utc> },
    #[error("failed to generate verification token: {0}")]
    Generation(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// A freshly issued token. `token` is the only copy of the plaintext.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

fn generate_token() -> Result<String, VerificationError> {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| VerificationError::Generation(err.to_string()))?;
    Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes)))
}
