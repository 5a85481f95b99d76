use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use vulnscan_core::{
    StoreError,
    application::AccountError,
    domain::{
        scans::ScanError, users::auth::SessionError,
        verification::VerificationError,
    },
};

pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::conflict(msg),
            StoreError::NotFound(msg) => Self::not_found(msg),
            StoreError::Database(msg) => {
                tracing::error!(error = %msg, "database operation failed");
                Self::internal(INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::NotFound
            | VerificationError::AlreadyUsed
            | VerificationError::Expired { .. } => Self::bad_request(err.to_string()),
            VerificationError::Generation(msg) => {
                tracing::error!(error = %msg, "verification token generation failed");
                Self::internal(INTERNAL_MESSAGE)
            }
            VerificationError::Storage(store) => store.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        tracing::error!(error = %err, "session token operation failed");
        Self::internal(INTERNAL_MESSAGE)
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingFields(_)
            | AccountError::PasswordTooShort
            | AccountError::InvalidEmail
            | AccountError::MissingToken => Self::bad_request(err.to_string()),
            AccountError::EmailTaken => Self::conflict(err.to_string()),
            AccountError::UserNotFound => Self::not_found(err.to_string()),
            AccountError::InvalidCredentials => Self::unauthorized(err.to_string()),
            AccountError::EmailNotVerified => Self::forbidden(err.to_string()),
            AccountError::Verification(inner) => inner.into(),
            AccountError::Session(inner) => inner.into(),
            AccountError::Hash(msg) => {
                tracing::error!(error = %msg, "password hashing failed");
                Self::internal(INTERNAL_MESSAGE)
            }
            AccountError::Storage(store) => store.into(),
        }
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::InvalidInput(msg) => Self::bad_request(msg),
            ScanError::NotFound => Self::not_found(err.to_string()),
            ScanError::Upstream(msg) => Self::bad_gateway(msg),
            ScanError::EngineTimeout => Self::gateway_timeout(err.to_string()),
            ScanError::ReportGeneration(_) => Self::internal("Failed to generate PDF report"),
            ScanError::Storage(store) => store.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        tracing::debug!(error = %err, "rejected request body");
        Self::bad_request("Invalid request body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().status
    }

    #[test]
    fn account_errors_follow_the_taxonomy() {
        assert_eq!(status_of(AccountError::PasswordTooShort), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AccountError::EmailTaken), StatusCode::CONFLICT);
        assert_eq!(status_of(AccountError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AccountError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AccountError::EmailNotVerified), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(AccountError::Verification(VerificationError::Expired {
                expired_at: Utc::now()
            })),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn scan_errors_follow_the_taxonomy() {
        assert_eq!(
            status_of(ScanError::InvalidInput("Invalid URL format".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ScanError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ScanError::Upstream("nope".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(ScanError::EngineTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_of(ScanError::ReportGeneration("renderer crashed".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err: AppError =
            StoreError::Database("relation \"scans\" does not exist".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, INTERNAL_MESSAGE);
    }
}
