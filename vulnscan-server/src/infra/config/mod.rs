//! Layered configuration: TOML file, then environment, then defaults.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, compose_config};
pub use models::{
    AppConfig, AuthConfig, Config, ConfigMetadata, CorsConfig, DatabaseConfig,
    EngineConfig, ScanConfig, ServerConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
