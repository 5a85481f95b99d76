use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;
use vulnscan_core::domain::scans::orchestrator::{
    DEFAULT_MAX_CONCURRENT_SCANS, DEFAULT_MAX_URL_LENGTH,
};

use super::{
    models::{
        AppConfig, AuthConfig, Config, ConfigMetadata, CorsConfig,
        DatabaseConfig, EngineConfig, ScanConfig, ServerConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};
use crate::infra::constants::{
    DEFAULT_ENGINE_BASE_URL, DEFAULT_ENGINE_CONNECT_TIMEOUT_SECS,
    DEFAULT_ENGINE_PDF_TIMEOUT_SECS,
    DEFAULT_ENGINE_TIMEOUT_SECS, DEFAULT_JWT_SECRET, DEFAULT_PASSWORD_PEPPER,
    DEFAULT_PUBLIC_URL,
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["vulnscan.toml", "config/vulnscan.toml"];

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, the TOML file and the environment, in that order.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let mut warnings = ConfigWarnings::default();
        if file_config.is_none() {
            warnings.push_with_hint(
                "No vulnscan.toml detected; falling back to environment variables",
                "Pass --config or set VULNSCAN_CONFIG to use a configuration file",
            );
        }

        let metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };
        let (config, guard_warnings) = compose_config(
            file_config.unwrap_or_default(),
            env_config,
            metadata,
        )?;
        warnings.extend(guard_warnings);

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge the layers: environment over file over defaults.
pub fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let FileConfig {
        server: file_server,
        database: file_database,
        auth: file_auth,
        app: file_app,
        engine: file_engine,
        scan: file_scan,
        cors: file_cors,
        dev_mode: file_dev_mode,
    } = file;

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(3000),
    };

    let database = DatabaseConfig {
        url: env
            .database_url
            .or(file_database.url)
            .filter(|value| !value.trim().is_empty()),
        max_connections: env
            .database_max_connections
            .or(file_database.max_connections)
            .unwrap_or(10),
        acquire_timeout: Duration::from_secs(
            env.database_acquire_timeout_secs
                .or(file_database.acquire_timeout_secs)
                .unwrap_or(5),
        ),
    };

    let auth = AuthConfig {
        jwt_secret: env
            .jwt_secret
            .or(file_auth.jwt_secret)
            .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
        password_pepper: env
            .auth_password_pepper
            .or(file_auth.password_pepper)
            .unwrap_or_else(|| DEFAULT_PASSWORD_PEPPER.to_string()),
        token_key: env
            .auth_token_key
            .or(file_auth.token_key)
            .filter(|value| !value.is_empty()),
    };

    let app = AppConfig {
        public_url: parse_http_url(
            "app.public_url",
            env.public_url.or(file_app.public_url).as_deref(),
            DEFAULT_PUBLIC_URL,
        )?,
    };

    let engine = EngineConfig {
        base_url: parse_http_url(
            "engine.base_url",
            env.engine_base_url.or(file_engine.base_url).as_deref(),
            DEFAULT_ENGINE_BASE_URL,
        )?,
        timeout: Duration::from_secs(
            env.engine_timeout_secs
                .or(file_engine.timeout_secs)
                .unwrap_or(DEFAULT_ENGINE_TIMEOUT_SECS),
        ),
        pdf_timeout: Duration::from_secs(
            env.engine_pdf_timeout_secs
                .or(file_engine.pdf_timeout_secs)
                .unwrap_or(DEFAULT_ENGINE_PDF_TIMEOUT_SECS),
        ),
        connect_timeout: Duration::from_secs(
            env.engine_connect_timeout_secs
                .or(file_engine.connect_timeout_secs)
                .unwrap_or(DEFAULT_ENGINE_CONNECT_TIMEOUT_SECS),
        ),
    };

    let scan = ScanConfig {
        max_concurrent_scans: env
            .max_concurrent_scans
            .or(file_scan.max_concurrent_scans)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_SCANS),
        max_url_length: env
            .max_url_length
            .or(file_scan.max_url_length)
            .unwrap_or(DEFAULT_MAX_URL_LENGTH),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .or(file_cors.allowed_origins)
            .unwrap_or_else(|| vec![DEFAULT_PUBLIC_URL.to_string()]),
    };

    let config = Config {
        server,
        database,
        auth,
        app,
        engine,
        scan,
        cors,
        dev_mode: env.dev_mode.or(file_dev_mode).unwrap_or(false),
        metadata,
    };

    let warnings = validation::apply_guard_rails(&config)?;
    Ok((config, warnings))
}

fn parse_http_url(
    field: &'static str,
    raw: Option<&str>,
    default: &str,
) -> Result<Url, ConfigLoadError> {
    let value = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default);
    let url = Url::parse(value).map_err(|source| ConfigLoadError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: source.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigLoadError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: "scheme must be http or https".into(),
        });
    }
    Ok(url)
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid URL for {field} '{value}': {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const STRONG_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn compose(
        file: FileConfig,
        env: EnvConfig,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        compose_config(file, env, ConfigMetadata::default())
    }

    fn env_with_secret() -> EnvConfig {
        EnvConfig {
            jwt_secret: Some(STRONG_SECRET.into()),
            auth_password_pepper: Some("pepper".into()),
            ..EnvConfig::default()
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let (config, warnings) = compose(FileConfig::default(), env_with_secret()).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.public_url(), "http://localhost:3000");
        assert_eq!(config.engine.base_url.as_str(), "http://localhost:5000/api");
        assert_eq!(config.engine.timeout, Duration::from_secs(300));
        assert_eq!(config.engine.pdf_timeout, Duration::from_secs(120));
        assert_eq!(config.engine.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.scan.max_url_length, 2048);
        assert_eq!(config.scan.max_concurrent_scans, 5);
        assert!(config.database.url.is_none());
        assert!(!config.dev_mode);
        assert!(config.cookie_secure());
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn environment_overrides_file_values() {
        let file: FileConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [engine]
            base_url = "http://file-engine:5000/api"
            timeout_secs = 60
            connect_timeout_secs = 3
            "#,
        )
        .unwrap();
        let env = EnvConfig {
            server_port: Some(9000),
            engine_base_url: Some("http://env-engine:5000/api".into()),
            ..env_with_secret()
        };

        let (config, _) = compose(file, env).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.engine.base_url.host_str(), Some("env-engine"));
        assert_eq!(config.engine.timeout, Duration::from_secs(60));
        assert_eq!(config.engine.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.engine_settings().connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn token_key_is_derived_unless_configured() {
        let (config, _) = compose(FileConfig::default(), env_with_secret()).unwrap();
        assert!(config.auth.token_key.is_none());
        let derived = config.auth.verification_token_key().unwrap();
        assert_ne!(derived, STRONG_SECRET.as_bytes());
        assert_eq!(derived, config.auth.verification_token_key().unwrap());

        let file: FileConfig = toml::from_str("[auth]\ntoken_key = \"from-file\"").unwrap();
        let env = EnvConfig {
            auth_token_key: Some("from-env".into()),
            ..env_with_secret()
        };
        let (config, _) = compose(file.clone(), env).unwrap();
        assert_eq!(config.auth.verification_token_key().unwrap(), b"from-env");

        let (config, _) = compose(file, env_with_secret()).unwrap();
        assert_eq!(config.auth.verification_token_key().unwrap(), b"from-file");
    }

    #[test]
    fn short_jwt_secret_is_fatal_outside_dev_mode() {
        let env = EnvConfig {
            jwt_secret: Some("too-short".into()),
            ..EnvConfig::default()
        };
        let err = compose(FileConfig::default(), env.clone()).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::GuardRail(ConfigGuardRailError::WeakJwtSecret { length: 9 })
        ));

        let dev = EnvConfig {
            dev_mode: Some(true),
            ..env
        };
        let (config, warnings) = compose(FileConfig::default(), dev).unwrap();
        assert!(!config.cookie_secure());
        assert!(
            warnings
                .items
                .iter()
                .any(|w| w.message.contains("JWT_SECRET is only 9 bytes"))
        );
    }

    #[test]
    fn built_in_secrets_only_warn() {
        let (config, warnings) =
            compose(FileConfig::default(), EnvConfig::default()).unwrap();

        assert_eq!(config.auth.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.items.iter().all(|w| w.hint.is_some()));
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let env = EnvConfig {
            engine_base_url: Some("ftp://engine/api".into()),
            ..env_with_secret()
        };
        assert!(matches!(
            compose(FileConfig::default(), env),
            Err(ConfigLoadError::InvalidUrl { field: "engine.base_url", .. })
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let loader = ConfigLoader::new().with_config_path("/nonexistent/vulnscan.toml");
        let err = loader.load_file_config(&EnvConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn explicit_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dev_mode = true\n[scan]\nmax_url_length = 512").unwrap();

        let loader = ConfigLoader::new().with_config_path(file.path());
        let (parsed, path) = loader.load_file_config(&EnvConfig::default()).unwrap();
        let parsed = parsed.unwrap();
        assert_eq!(path.as_deref(), Some(file.path()));
        assert_eq!(parsed.dev_mode, Some(true));
        assert_eq!(parsed.scan.max_url_length, Some(512));
    }

    #[test]
    fn explicit_env_file_is_loaded() {
        let mut env_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(env_file, "VULNSCAN_LOADER_TEST_MARKER=1").unwrap();

        let loaded = ConfigLoader::new().with_env_file(env_file.path()).load().unwrap();
        assert!(loaded.config.metadata.env_file_loaded);
        assert_eq!(
            std::env::var("VULNSCAN_LOADER_TEST_MARKER").as_deref(),
            Ok("1")
        );

        let missing = ConfigLoader::new()
            .with_env_file("/nonexistent/vulnscan.env")
            .load()
            .unwrap();
        assert!(!missing.config.metadata.env_file_loaded);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let loader = ConfigLoader::new().with_config_path(file.path());
        assert!(matches!(
            loader.load_file_config(&EnvConfig::default()),
            Err(ConfigLoadError::Parse { .. })
        ));
    }
}
