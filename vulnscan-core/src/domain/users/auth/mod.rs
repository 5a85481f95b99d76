//! Credential hashing and session tokens.

pub mod crypto;
pub mod session;

pub use crypto::{
    AuthCrypto, AuthCryptoError, VERIFICATION_TOKEN_KEY_PURPOSE, derive_key,
};
pub use session::{
    SESSION_COOKIE_NAME, SESSION_TTL_SECS, SessionClaims, SessionError,
    SessionManager, clear_session_cookie, session_cookie,
    session_token_from_cookie_header,
};
