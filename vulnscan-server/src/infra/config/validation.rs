use thiserror::Error;

use super::models::Config;
use crate::infra::constants::{
    DEFAULT_JWT_SECRET, DEFAULT_PASSWORD_PEPPER, MIN_JWT_SECRET_BYTES,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

/// Non-fatal findings collected while loading configuration. `main` logs
/// them once the subscriber is installed.
#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error(
        "JWT_SECRET must be at least {MIN_JWT_SECRET_BYTES} bytes outside dev mode (got {length})"
    )]
    WeakJwtSecret { length: usize },
    #[error("AUTH_PASSWORD_PEPPER must not be empty")]
    EmptyPasswordPepper,
}

/// Check secrets. Development fallbacks only warn; a short JWT secret is
/// fatal unless `dev_mode` is set.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let auth = &config.auth;

    if auth.password_pepper.is_empty() {
        return Err(ConfigGuardRailError::EmptyPasswordPepper);
    }

    let secret_len = auth.jwt_secret.len();
    if secret_len < MIN_JWT_SECRET_BYTES {
        if !config.dev_mode {
            return Err(ConfigGuardRailError::WeakJwtSecret { length: secret_len });
        }
        warnings.push(format!(
            "JWT_SECRET is only {secret_len} bytes; accepted because DEV_MODE is on"
        ));
    }

    if auth.jwt_secret == DEFAULT_JWT_SECRET {
        warnings.push_with_hint(
            "JWT_SECRET is using the built-in development default",
            "Set JWT_SECRET to a random value of at least 32 bytes",
        );
    }
    if auth.password_pepper == DEFAULT_PASSWORD_PEPPER {
        warnings.push_with_hint(
            "AUTH_PASSWORD_PEPPER is using the built-in development default",
            "Set AUTH_PASSWORD_PEPPER before storing real credentials; changing it later invalidates existing passwords",
        );
    }

    if config.dev_mode {
        warnings.push("DEV_MODE is on: session cookies are sent without the Secure flag");
    }

    Ok(warnings)
}
