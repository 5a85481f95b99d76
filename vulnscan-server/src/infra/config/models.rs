use std::{path::PathBuf, time::Duration};

use url::Url;
use vulnscan_core::{
    database::postgres::PoolSettings,
    domain::{
        scans::{EngineSettings, ScanLimits},
        users::auth::{
            AuthCryptoError, VERIFICATION_TOKEN_KEY_PURPOSE, derive_key,
        },
    },
};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub app: AppConfig,
    pub engine: EngineConfig,
    pub scan: ScanConfig,
    pub cors: CorsConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub password_pepper: String,
    /// HMAC key for verification tokens. Derived from `jwt_secret` when unset.
    pub token_key: Option<String>,
}

impl AuthConfig {
    /// Key material for [`AuthCrypto`](vulnscan_core::domain::users::auth::AuthCrypto)'s
    /// token digests. Never the raw JWT secret.
    pub fn verification_token_key(&self) -> Result<Vec<u8>, AuthCryptoError> {
        match &self.token_key {
            Some(key) => Ok(key.as_bytes().to_vec()),
            None => derive_key(
                self.jwt_secret.as_bytes(),
                VERIFICATION_TOKEN_KEY_PURPOSE,
            )
            .map(|key| key.to_vec()),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("password_pepper", &"<redacted>")
            .field("token_key", &self.token_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Origin of the web front end; verification links point here.
    pub public_url: Url,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub pdf_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Declared for operators; not enforced.
    pub max_concurrent_scans: usize,
    pub max_url_length: usize,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Config {
    /// Session cookies carry `Secure` everywhere except local development.
    pub fn cookie_secure(&self) -> bool {
        !self.dev_mode
    }

    /// Public URL without a trailing slash, ready to have paths appended.
    pub fn public_url(&self) -> &str {
        self.app.public_url.as_str().trim_end_matches('/')
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            base_url: self.engine.base_url.clone(),
            timeout: self.engine.timeout,
            pdf_timeout: self.engine.pdf_timeout,
            connect_timeout: self.engine.connect_timeout,
        }
    }

    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            max_url_length: self.scan.max_url_length,
            max_concurrent_scans: self.scan.max_concurrent_scans,
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.database.max_connections,
            acquire_timeout: self.database.acquire_timeout,
        }
    }
}
