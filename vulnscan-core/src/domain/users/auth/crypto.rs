use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

/// Argon2id cost: 19 MiB, two passes, one lane.
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_PASSES: u32 = 2;
const ARGON2_LANES: u32 = 1;
const ARGON2_OUTPUT_LEN: usize = 32;

const SALT_BYTES: usize = 16;

/// Length of a hex-encoded SHA-256 digest from the pre-Argon2 scheme.
const LEGACY_HEX_LEN: usize = 64;

/// Label for the verification token key derived from a master secret.
pub const VERIFICATION_TOKEN_KEY_PURPOSE: &str = "vulnscan/verification-token/v1";

/// HMAC-SHA-256 of `purpose` under `secret`.
///
/// Lets one configured secret feed several keys without any of them being
/// usable in place of another.
pub fn derive_key(secret: &[u8], purpose: &str) -> Result<[u8; 32], AuthCryptoError> {
    if secret.is_empty() {
        return Err(AuthCryptoError::EmptyTokenKey);
    }
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret)
        .map_err(|_| AuthCryptoError::EmptyTokenKey)?;
    mac.update(purpose.as_bytes());
    Ok(mac.finalize().into_bytes().into())
}

/// Password and token hashing for the account flows.
///
/// Passwords are hashed with Argon2id over `password || pepper`. Verification
/// tokens are stored as HMAC-SHA-256 digests so a leaked table cannot be
/// replayed.
///
/// Accounts created before Argon2 was introduced carry an unsalted SHA-256
/// hex digest. Those still verify, and [`AuthCrypto::needs_rehash`] tells the
/// caller to upgrade them after a successful login.
pub struct AuthCrypto {
    hasher: Argon2<'static>,
    pepper: Zeroizing<Vec<u8>>,
    token_key: Hmac<Sha256>,
}

impl fmt::Debug for AuthCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCrypto")
            .field("params", self.hasher.params())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum AuthCryptoError {
    #[error("AUTH_PASSWORD_PEPPER is empty")]
    EmptyPasswordPepper,
    #[error("verification token key is empty")]
    EmptyTokenKey,
    #[error("argon2 parameters rejected: {0}")]
    InvalidArgon2Params(argon2::Error),
    #[error("could not hash password: {0}")]
    PasswordHash(String),
}

/// What a stored credential turned out to be.
enum StoredDigest<'a> {
    Argon2(PasswordHash<'a>),
    LegacySha256(&'a str),
    Unrecognized,
}

impl<'a> StoredDigest<'a> {
    fn classify(stored: &'a str) -> Self {
        if stored.len() == LEGACY_HEX_LEN
            && stored.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return StoredDigest::LegacySha256(stored);
        }
        PasswordHash::new(stored)
            .map(StoredDigest::Argon2)
            .unwrap_or(StoredDigest::Unrecognized)
    }
}

impl AuthCrypto {
    /// Production cost parameters.
    pub fn new(
        pepper: impl AsRef<[u8]>,
        token_key: impl AsRef<[u8]>,
    ) -> Result<Self, AuthCryptoError> {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_PASSES,
            ARGON2_LANES,
            Some(ARGON2_OUTPUT_LEN),
        )
        .map_err(AuthCryptoError::InvalidArgon2Params)?;
        Self::with_params(pepper, token_key, params)
    }

    /// Explicit Argon2 parameters. Tests pass cheap ones.
    pub fn with_params(
        pepper: impl AsRef<[u8]>,
        token_key: impl AsRef<[u8]>,
        params: Params,
    ) -> Result<Self, AuthCryptoError> {
        if pepper.as_ref().is_empty() {
            return Err(AuthCryptoError::EmptyPasswordPepper);
        }
        if token_key.as_ref().is_empty() {
            return Err(AuthCryptoError::EmptyTokenKey);
        }

        // Infallible for HMAC.
        let token_key = <Hmac<Sha256> as Mac>::new_from_slice(token_key.as_ref())
            .map_err(|_| AuthCryptoError::EmptyTokenKey)?;

        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            pepper: Zeroizing::new(pepper.as_ref().to_vec()),
            token_key,
        })
    }

    fn with_pepper(&self, password: &str) -> Zeroizing<Vec<u8>> {
        let mut input = Zeroizing::new(password.as_bytes().to_vec());
        input.extend_from_slice(&self.pepper);
        input
    }

    /// Argon2id PHC string for `password`, freshly salted.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthCryptoError> {
        let mut salt = [0u8; SALT_BYTES];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|err| AuthCryptoError::PasswordHash(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt)
            .map_err(|err| AuthCryptoError::PasswordHash(err.to_string()))?;

        self.hasher
            .hash_password(&self.with_pepper(password), &salt)
            .map(|phc| phc.to_string())
            .map_err(|err| AuthCryptoError::PasswordHash(err.to_string()))
    }

    /// Check a password against a stored digest.
    ///
    /// Never fails: a digest that is neither a PHC string nor a legacy
    /// SHA-256 hex digest simply does not match.
    pub fn verify_password(&self, password: &str, stored: &str) -> bool {
        match StoredDigest::classify(stored) {
            StoredDigest::Argon2(phc) => self
                .hasher
                .verify_password(&self.with_pepper(password), &phc)
                .is_ok(),
            StoredDigest::LegacySha256(hex_digest) => {
                let expected = hex::encode(Sha256::digest(password.as_bytes()));
                constant_time_eq(
                    expected.as_bytes(),
                    hex_digest.to_ascii_lowercase().as_bytes(),
                )
            }
            StoredDigest::Unrecognized => false,
        }
    }

    /// True when `stored` predates Argon2 and should be replaced.
    pub fn needs_rehash(&self, stored: &str) -> bool {
        matches!(StoredDigest::classify(stored), StoredDigest::LegacySha256(_))
    }

    /// Hex HMAC-SHA-256 of a verification token, as stored in the database.
    pub fn hash_token(&self, token: &str) -> String {
        let mut mac = self.token_key.clone();
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
