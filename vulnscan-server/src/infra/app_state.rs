use std::{fmt, sync::Arc};

use vulnscan_core::{
    application::{AccountService, AppUnitOfWork},
    database::ports::users::UsersRepository,
    domain::{
        scans::{ScanEngine, ScanOrchestrator, ScanQueryService},
        users::auth::{AuthCrypto, SessionError, SessionManager},
    },
};

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: Arc<AccountService>,
    pub sessions: SessionManager<dyn UsersRepository>,
    pub orchestrator: Arc<ScanOrchestrator>,
    pub queries: Arc<ScanQueryService>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the services over `unit_of_work` and `engine`.
    pub fn new(
        config: Arc<Config>,
        unit_of_work: Arc<AppUnitOfWork>,
        crypto: Arc<AuthCrypto>,
        engine: Arc<dyn ScanEngine>,
    ) -> Result<Self, SessionError> {
        let sessions = SessionManager::new(
            unit_of_work.users.clone(),
            config.auth.jwt_secret.as_bytes(),
        )?;

        let accounts = AccountService::new(
            &unit_of_work,
            crypto,
            sessions.clone(),
            config.public_url(),
        );

        let orchestrator = ScanOrchestrator::new(unit_of_work.scans.clone(), engine)
            .with_limits(config.scan_limits());
        let queries = ScanQueryService::new(unit_of_work.scans.clone());

        Ok(Self {
            config,
            accounts: Arc::new(accounts),
            sessions,
            orchestrator: Arc::new(orchestrator),
            queries: Arc::new(queries),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cookie_secure(&self) -> bool {
        self.config.cookie_secure()
    }
}
