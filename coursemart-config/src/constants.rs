//! Defaults and environment keys.

use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_MAX_REFRESH_TOKENS: usize = 10;

/// Secrets shorter than this are accepted with a warning.
pub const MIN_SECRET_LENGTH: usize = 32;

// Development-only fallbacks. Production refuses to start without real values.
pub const DEV_ACCESS_TOKEN_SECRET: &str = "coursemart-dev-access-secret-change-me-0001";
pub const DEV_REFRESH_TOKEN_SECRET: &str = "coursemart-dev-refresh-secret-change-me-002";
pub const DEV_PASSWORD_PEPPER: &str = "coursemart-dev-password-pepper-change-me-03";
pub const DEV_TOKEN_HMAC_KEY: &str = "coursemart-dev-token-hmac-key-change-me-0004";

pub const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["coursemart.toml", "config/coursemart.toml"];

pub mod env {
    pub const CONFIG_PATH: &str = "COURSEMART_CONFIG";
    pub const SERVER_HOST: &str = "SERVER_HOST";
    pub const SERVER_PORT: &str = "SERVER_PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
    pub const DATABASE_ACQUIRE_TIMEOUT: &str = "DATABASE_ACQUIRE_TIMEOUT";
    pub const ACCESS_TOKEN_SECRET: &str = "ACCESS_TOKEN_SECRET";
    pub const REFRESH_TOKEN_SECRET: &str = "REFRESH_TOKEN_SECRET";
    pub const PASSWORD_PEPPER: &str = "AUTH_PASSWORD_PEPPER";
    pub const TOKEN_HMAC_KEY: &str = "AUTH_TOKEN_HMAC_KEY";
    pub const ACCESS_TOKEN_EXPIRY: &str = "ACCESS_TOKEN_EXPIRY";
    pub const REFRESH_TOKEN_EXPIRY: &str = "REFRESH_TOKEN_EXPIRY";
    pub const MAX_REFRESH_TOKENS: &str = "AUTH_MAX_REFRESH_TOKENS";
    pub const APP_ENV: &str = "APP_ENV";
}
