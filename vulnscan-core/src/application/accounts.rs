//! Registration, login and email confirmation.

use std::{any::type_name_of_val, fmt, sync::Arc};

use thiserror::Error;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::unit_of_work::AppUnitOfWork,
    database::ports::{
        users::UsersRepository,
        verification_tokens::VerificationTokenRepository,
    },
    domain::{
        users::{
            MIN_PASSWORD_LENGTH, User,
            auth::{AuthCrypto, SessionError, SessionManager},
            normalize_email,
        },
        verification::{VerificationError, VerificationService},
    },
    error::StoreError,
};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    MissingFields(&'static str),
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("User already exists, please login")]
    EmailTaken,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Please verify your email before logging in")]
    EmailNotVerified,
    #[error("Token is required")]
    MissingToken,
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub verification_url: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// Signed session token to hand back as a cookie.
    pub session_token: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepository>,
    crypto: Arc<AuthCrypto>,
    verification: VerificationService<dyn VerificationTokenRepository>,
    sessions: SessionManager<dyn UsersRepository>,
    public_url: String,
}

impl fmt::Debug for AccountService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountService")
            .field("users", &type_name_of_val(self.users.as_ref()))
            .field("verification", &self.verification)
            .field("sessions", &self.sessions)
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl AccountService {
    pub fn new(
        unit_of_work: &AppUnitOfWork,
        crypto: Arc<AuthCrypto>,
        sessions: SessionManager<dyn UsersRepository>,
        public_url: impl Into<String>,
    ) -> Self {
        let verification = VerificationService::new(
            unit_of_work.verification_tokens.clone(),
            crypto.clone(),
        );
        Self {
            users: unit_of_work.users.clone(),
            crypto,
            verification,
            sessions,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Replace the verification service (tests shorten its TTL).
    pub fn with_verification(
        mut self,
        verification: VerificationService<dyn VerificationTokenRepository>,
    ) -> Self {
        self.verification = verification;
        self
    }

    /// Link a user follows to confirm their address.
    pub fn verification_url(&self, token: &str) -> String {
        format!("{}/verify-email?token={token}", self.public_url)
    }

    /// Create an unverified account and issue its verification token.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<Registration, AccountError> {
        let RegistrationRequest {
            email,
            password,
            name,
        } = request;

        if email.trim().is_empty() || password.is_empty() || name.trim().is_empty() {
            return Err(AccountError::MissingFields(
                "Email, password, and name are required",
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AccountError::PasswordTooShort);
        }
        if !looks_like_email(&email) {
            return Err(AccountError::InvalidEmail);
        }

        if self.users.get_user_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = self.hash_password(password).await?;
        let user = User::new(&email, &name);
        self.users
            .create_user_with_password(&user, &password_hash)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => AccountError::EmailTaken,
                other => AccountError::Storage(other),
            })?;

        let issued = self.verification.create(user.id).await?;
        let verification_url = self.verification_url(&issued.token);
        info!(user_id = %user.id, "registered user; verification email would be sent");

        Ok(Registration {
            user,
            verification_url,
        })
    }

    /// Authenticate and issue a session token.
    ///
    /// An unverified account is refused before its password is checked.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AccountError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AccountError::MissingFields(
                "Email and password are required",
            ));
        }

        let user = self
            .users
            .get_user_by_email(&normalize_email(email))
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if !user.is_verified {
            return Err(AccountError::EmailNotVerified);
        }

        let stored = self
            .users
            .get_user_password_hash(user.id)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !self.verify_password(password.to_string(), stored.clone()).await? {
            return Err(AccountError::InvalidCredentials);
        }

        if self.crypto.needs_rehash(&stored) {
            self.upgrade_hash(user.id, password.to_string()).await;
        }

        let session_token = self.sessions.issue(user.id)?;
        info!(user_id = %user.id, "login succeeded");
        Ok(LoginOutcome {
            user,
            session_token,
        })
    }

    /// Check a verification token, mark its owner verified, then spend it.
    ///
    /// Each step is idempotent, so retrying after a failure between the
    /// last two steps converges.
    pub async fn confirm_email(&self, token: &str) -> Result<Uuid, AccountError> {
        if token.trim().is_empty() {
            return Err(AccountError::MissingToken);
        }

        let verified = self.verification.verify(token).await?;
        if !self.users.mark_verified(verified.user_id).await? {
            info!(user_id = %verified.user_id, "user was already verified");
        }
        self.verification.consume(token).await?;

        info!(user_id = %verified.user_id, "email verified");
        Ok(verified.user_id)
    }

    async fn hash_password(&self, password: String) -> Result<String, AccountError> {
        let crypto = Arc::clone(&self.crypto);
        task::spawn_blocking(move || crypto.hash_password(&password))
            .await
            .map_err(|err| AccountError::Hash(err.to_string()))?
            .map_err(|err| AccountError::Hash(err.to_string()))
    }

    async fn verify_password(
        &self,
        password: String,
        stored: String,
    ) -> Result<bool, AccountError> {
        let crypto = Arc::clone(&self.crypto);
        task::spawn_blocking(move || crypto.verify_password(&password, &stored))
            .await
            .map_err(|err| AccountError::Hash(err.to_string()))
    }

    /// Replace a legacy digest with an Argon2 hash. Failures only log.
    async fn upgrade_hash(&self, user_id: Uuid, password: String) {
        let upgraded = match self.hash_password(password).await {
            Ok(hash) => hash,
            Err(err) => {
                warn!(%user_id, "could not rehash legacy password: {err}");
                return;
            }
        };
        match self.users.update_password_hash(user_id, &upgraded).await {
            Ok(()) => info!(%user_id, "upgraded legacy password hash"),
            Err(err) => warn!(%user_id, "could not store upgraded password hash: {err}"),
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
