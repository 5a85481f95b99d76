//! # vulnscan core
//!
//! Credential handling, sessions, email verification and scan
//! orchestration for the vulnscan backend.
//!
//! - [`domain::users::auth`]: Argon2id password hashing with a pepper, and
//!   stateless HS256 session tokens carried in an HTTP-only cookie.
//! - [`domain::verification`]: single-use, time-limited email verification
//!   tokens, stored only as HMAC digests.
//! - [`domain::scans`]: creates scan rows, delegates execution to the
//!   external scanning engine, and marks rows failed when delegation fails.
//! - [`application`]: the account workflows (register, login, confirm
//!   email) and the [`application::AppUnitOfWork`] that bundles the
//!   repository ports.
//! - [`database`]: repository ports and their PostgreSQL adapters.
//!
//! ## Feature Flags
//!
//! - `database` (default): PostgreSQL adapters and embedded migrations.
//! - `test-utils`: in-memory repositories and a scripted engine.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod application;
pub mod database;
pub mod domain;
pub mod error;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod testing;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{Result, StoreError};
pub use vulnscan_model as model;
