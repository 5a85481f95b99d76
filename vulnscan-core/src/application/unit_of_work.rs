use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use crate::database::ports::{
    scans::ScanRepository, users::UsersRepository,
    verification_tokens::VerificationTokenRepository,
};
#[cfg(feature = "database")]
use crate::database::postgres::{
    PostgresScanRepository, PostgresUsersRepository,
    PostgresVerificationTokenRepository,
};

/// Aggregates the repository ports used by application services.
#[derive(Clone)]
pub struct AppUnitOfWork {
    pub users: Arc<dyn UsersRepository>,
    pub verification_tokens: Arc<dyn VerificationTokenRepository>,
    pub scans: Arc<dyn ScanRepository>,
}

impl fmt::Debug for AppUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUnitOfWork")
            .field("users", &type_name_of_val(self.users.as_ref()))
            .field(
                "verification_tokens",
                &type_name_of_val(self.verification_tokens.as_ref()),
            )
            .field("scans", &type_name_of_val(self.scans.as_ref()))
            .finish()
    }
}

impl AppUnitOfWork {
    /// Wire every port to its PostgreSQL adapter.
    #[cfg(feature = "database")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUsersRepository::new(pool.clone())),
            verification_tokens: Arc::new(
                PostgresVerificationTokenRepository::new(pool.clone()),
            ),
            scans: Arc::new(PostgresScanRepository::new(pool)),
        }
    }

    /// Wire every port to a fresh in-memory repository.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Self {
        use crate::testing::{
            InMemoryScanRepository, InMemoryUsersRepository,
            InMemoryVerificationTokenRepository,
        };

        Self {
            users: Arc::new(InMemoryUsersRepository::default()),
            verification_tokens: Arc::new(
                InMemoryVerificationTokenRepository::default(),
            ),
            scans: Arc::new(InMemoryScanRepository::default()),
        }
    }
}
