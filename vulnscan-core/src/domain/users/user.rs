use chrono::{DateTime, Utc};
use uuid::Uuid;
use vulnscan_model::UserProfile;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// An account as stored by the credential store. The password hash is kept
/// out of this type and only fetched when a login needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A freshly registered, unverified account.
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            email: normalize_email(email),
            name: name.trim().to_string(),
            is_verified: false,
            created_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// Emails are compared case-insensitively; store and look them up lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
