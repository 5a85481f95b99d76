use std::{any::type_name_of_val, fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode,
    encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{database::ports::users::UsersRepository, domain::users::User};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "auth-token";

/// Fixed session lifetime: seven days.
pub const SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;

/// Claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Owning user id.
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id. Not checked yet; it is the hook for a revocation
    /// list.
    pub jti: Uuid,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret must not be empty")]
    EmptySecret,
    #[error("failed to sign session token: {0}")]
    Encode(String),
    #[error("session token expired")]
    Expired,
    #[error("invalid session token: {0}")]
    Invalid(String),
}

/// Issues and verifies stateless HS256 session tokens.
///
/// There is no server-side session table. A correctly signed, unexpired
/// token is the only proof of identity, so a token stays valid until its
/// natural expiry even after logout.
pub struct SessionManager<R>
where
    R: UsersRepository + ?Sized,
{
    users: Arc<R>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl<R> Clone for SessionManager<R>
where
    R: UsersRepository + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            encoding: self.encoding.clone(),
            decoding: self.decoding.clone(),
            validation: self.validation.clone(),
            ttl: self.ttl,
        }
    }
}

impl<R> fmt::Debug for SessionManager<R>
where
    R: UsersRepository + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("users", &type_name_of_val(self.users.as_ref()))
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<R> SessionManager<R>
where
    R: UsersRepository + ?Sized,
{
    pub fn new(
        users: Arc<R>,
        secret: impl AsRef<[u8]>,
    ) -> Result<Self, SessionError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            users,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::seconds(SESSION_TTL_SECS),
        })
    }

    /// Override the token lifetime (primarily for tests).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sign a new session token for `user_id`.
    pub fn issue(&self, user_id: Uuid) -> Result<String, SessionError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| SessionError::Encode(err.to_string()))
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid(err.to_string()),
            })
    }

    /// Resolve an optional token to its user.
    ///
    /// Every failure (missing token, bad signature, expiry, unknown user,
    /// storage trouble) collapses to `None` and is only logged.
    pub async fn resolve_token(&self, token: Option<&str>) -> Option<User> {
        let token = token?;

        let claims = match self.verify(token) {
            Ok(claims) => claims,
            Err(SessionError::Expired) => {
                debug!("session token expired");
                return None;
            }
            Err(err) => {
                warn!("session verification failed: {err}");
                return None;
            }
        };

        match self.users.get_user_by_id(claims.sub).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                debug!(user_id = %claims.sub, "session refers to unknown user");
                None
            }
            Err(err) => {
                warn!(user_id = %claims.sub, "failed to load session user: {err}");
                None
            }
        }
    }
}

/// `Set-Cookie` value that stores a session token.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={SESSION_TTL_SECS}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that deletes the session cookie. Idempotent.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extract the session token from a raw `Cookie` request header.
pub fn session_token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryUsersRepository;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes!";

    async fn manager_with_user() -> (SessionManager<InMemoryUsersRepository>, User)
    {
        let users = Arc::new(InMemoryUsersRepository::default());
        let user = User::new("alice@example.com", "Alice");
        users
            .create_user_with_password(&user, "hash")
            .await
            .unwrap();
        (SessionManager::new(users, SECRET).unwrap(), user)
    }

    #[tokio::test]
    async fn issued_tokens_resolve_to_their_user() {
        let (sessions, user) = manager_with_user().await;
        let token = sessions.issue(user.id).unwrap();

        let claims = sessions.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);

        let resolved = sessions.resolve_token(Some(&token)).await;
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn missing_or_tampered_tokens_resolve_to_none() {
        let (sessions, user) = manager_with_user().await;
        assert!(sessions.resolve_token(None).await.is_none());
        assert!(sessions.resolve_token(Some("garbage")).await.is_none());

        let other = SessionManager::new(
            Arc::new(InMemoryUsersRepository::default()),
            "a-completely-different-signing-secret",
        )
        .unwrap();
        let foreign = other.issue(user.id).unwrap();
        assert!(matches!(
            sessions.verify(&foreign),
            Err(SessionError::Invalid(_))
        ));
        assert!(sessions.resolve_token(Some(&foreign)).await.is_none());
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let (sessions, user) = manager_with_user().await;
        let sessions = sessions.with_ttl(Duration::seconds(-60));
        let token = sessions.issue(user.id).unwrap();
        assert!(matches!(sessions.verify(&token), Err(SessionError::Expired)));
        assert!(sessions.resolve_token(Some(&token)).await.is_none());
    }

    #[tokio::test]
    async fn tokens_for_deleted_users_resolve_to_none() {
        let (sessions, _) = manager_with_user().await;
        let token = sessions.issue(Uuid::now_v7()).unwrap();
        assert!(sessions.verify(&token).is_ok());
        assert!(sessions.resolve_token(Some(&token)).await.is_none());
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("abc", true);
        assert_eq!(
            cookie,
            "auth-token=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=604800; Secure"
        );
        assert!(!session_cookie("abc", false).contains("Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn reads_token_from_cookie_header() {
        assert_eq!(
            session_token_from_cookie_header("theme=dark; auth-token=abc.def; x=1"),
            Some("abc.def")
        );
        assert_eq!(session_token_from_cookie_header("auth-token="), None);
        assert_eq!(session_token_from_cookie_header("other=1"), None);
    }

    #[test]
    fn rejects_empty_secret() {
        let users = Arc::new(InMemoryUsersRepository::default());
        assert!(matches!(
            SessionManager::new(users, ""),
            Err(SessionError::EmptySecret)
        ));
    }
}
