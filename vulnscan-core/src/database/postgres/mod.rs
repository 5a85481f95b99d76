//! PostgreSQL adapters for the repository ports.

mod scans;
mod users;
mod verification_tokens;

use std::time::Duration;

use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use tracing::info;

use crate::error::{Result, StoreError};

pub use scans::PostgresScanRepository;
pub use users::PostgresUsersRepository;
pub use verification_tokens::PostgresVerificationTokenRepository;

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Open a connection pool.
pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to connect to database: {e}")))?;

    info!(
        max_connections = settings.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    crate::MIGRATOR
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to run migrations: {e}")))
}

pub(crate) fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Database(format!("Failed to read {name}: {e}")))
}

pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| StoreError::Database(format!("{context}: {e}"))
}
