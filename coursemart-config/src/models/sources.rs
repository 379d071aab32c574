use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::env;

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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
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
    /// Humantime string, e.g. `"5s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquire_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_pepper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_hmac_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_refresh_tokens: Option<usize>,
}

/// Environment-derived configuration values, kept as raw strings until the
/// loader parses them so malformed values can be reported by key.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<String>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<String>,
    pub database_acquire_timeout: Option<String>,
    pub access_token_secret: Option<String>,
    pub refresh_token_secret: Option<String>,
    pub password_pepper: Option<String>,
    pub token_hmac_key: Option<String>,
    pub access_token_expiry: Option<String>,
    pub refresh_token_expiry: Option<String>,
    pub max_refresh_tokens: Option<String>,
    pub app_env: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            config_path: get(env::CONFIG_PATH).map(PathBuf::from),
            server_host: get(env::SERVER_HOST),
            server_port: get(env::SERVER_PORT),
            database_url: get(env::DATABASE_URL),
            database_max_connections: get(env::DATABASE_MAX_CONNECTIONS),
            database_acquire_timeout: get(env::DATABASE_ACQUIRE_TIMEOUT),
            access_token_secret: get(env::ACCESS_TOKEN_SECRET),
            refresh_token_secret: get(env::REFRESH_TOKEN_SECRET),
            password_pepper: get(env::PASSWORD_PEPPER),
            token_hmac_key: get(env::TOKEN_HMAC_KEY),
            access_token_expiry: get(env::ACCESS_TOKEN_EXPIRY),
            refresh_token_expiry: get(env::REFRESH_TOKEN_EXPIRY),
            max_refresh_tokens: get(env::MAX_REFRESH_TOKENS),
            app_env: get(env::APP_ENV),
        }
    }
}
