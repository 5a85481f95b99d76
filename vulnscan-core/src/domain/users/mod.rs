pub mod auth;
pub mod user;

pub use user::{MIN_PASSWORD_LENGTH, User, normalize_email};
