/// Development-only fallbacks. Startup warns whenever either is in use.
pub const DEFAULT_JWT_SECRET: &str = "vulnscan-dev-jwt-secret-change-me-before-deploying";
pub const DEFAULT_PASSWORD_PEPPER: &str = "vulnscan-dev-pepper-change-me";

/// HS256 keys shorter than this are refused outside dev mode.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
pub const DEFAULT_ENGINE_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_ENGINE_PDF_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ENGINE_CONNECT_TIMEOUT_SECS: u64 = 5;
