use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub app: FileAppConfig,
    #[serde(default)]
    pub engine: FileEngineConfig,
    #[serde(default)]
    pub scan: FileScanConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquire_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_pepper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_key: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileEngineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_scans: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_url_length: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

/// Values read from the process environment. Every field is optional; unset
/// or unparsable variables are `None`.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub database_acquire_timeout_secs: Option<u64>,
    pub jwt_secret: Option<String>,
    pub auth_password_pepper: Option<String>,
    pub auth_token_key: Option<String>,
    pub public_url: Option<String>,
    pub engine_base_url: Option<String>,
    pub engine_timeout_secs: Option<u64>,
    pub engine_pdf_timeout_secs: Option<u64>,
    pub engine_connect_timeout_secs: Option<u64>,
    pub max_concurrent_scans: Option<usize>,
    pub max_url_length: Option<usize>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub dev_mode: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.config_path =
            std::env::var("VULNSCAN_CONFIG").ok().map(PathBuf::from);

        env_config.server_host = std::env::var("SERVER_HOST").ok();
        env_config.server_port = parse_var("SERVER_PORT");

        env_config.database_url = std::env::var("DATABASE_URL").ok();
        env_config.database_max_connections = parse_var("DB_MAX_CONNECTIONS");
        env_config.database_acquire_timeout_secs =
            parse_var("DB_ACQUIRE_TIMEOUT_SECS");

        env_config.jwt_secret = std::env::var("JWT_SECRET").ok();
        env_config.auth_password_pepper =
            std::env::var("AUTH_PASSWORD_PEPPER").ok();
        env_config.auth_token_key = std::env::var("AUTH_TOKEN_KEY").ok();

        env_config.public_url = first_var(&["APP_PUBLIC_URL", "NEXT_PUBLIC_APP_URL"]);
        // BACKEND_URL names the engine's origin; its API lives under /api.
        env_config.engine_base_url = first_var(&["ENGINE_BASE_URL"]).or_else(|| {
            first_var(&["BACKEND_URL"])
                .map(|origin| format!("{}/api", origin.trim().trim_end_matches('/')))
        });
        env_config.engine_timeout_secs = parse_var("ENGINE_TIMEOUT_SECS");
        env_config.engine_pdf_timeout_secs = parse_var("ENGINE_PDF_TIMEOUT_SECS");
        env_config.engine_connect_timeout_secs =
            parse_var("ENGINE_CONNECT_TIMEOUT_SECS");

        env_config.max_concurrent_scans = parse_var("MAX_CONCURRENT_SCANS");
        env_config.max_url_length = parse_var("SCAN_MAX_URL_LENGTH");

        env_config.cors_allowed_origins = parse_csv_var("CORS_ALLOWED_ORIGINS");
        env_config.dev_mode = parse_bool_var("DEV_MODE");

        env_config
    }
}

/// The first of `names` that is set to a non-blank value.
fn first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
    })
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| split_csv(&raw))
}

pub(crate) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
