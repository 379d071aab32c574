pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use error::ConfigLoadError;

use crate::constants::{self, env};
use crate::models::{
    AuthConfig, Config, ConfigMetadata, DatabaseConfig, Environment, ServerConfig,
    sources::{EnvConfig, FileConfig},
};
use crate::validation::{self, ConfigGuardRailError, ConfigWarnings};

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
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

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, read the process environment, and merge.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let mut load = self.load_from_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Merge defaults, the config file, and an already-gathered environment.
    /// Does not touch `.env` or the process environment.
    pub fn load_from_env(&self, vars: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&vars)?;
        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No coursemart.toml detected; using environment variables and defaults",
                "Pass --config or set COURSEMART_CONFIG to use a configuration file",
            );
        }

        let config = compose_config(file_config.unwrap_or_default(), vars, config_path)?;
        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };

        loaded.or_else(|err| match err {
            dotenvy::Error::Io(_) => Ok(false),
            other => Err(ConfigLoadError::EnvFile(other)),
        })
    }

    fn load_file_config(
        &self,
        vars: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| vars.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match constants::DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose_config(
    file: FileConfig,
    vars: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        server: file_server,
        database: file_database,
        auth: file_auth,
        environment: file_environment,
    } = file;

    let environment = match vars.app_env.or(file_environment) {
        Some(raw) => raw
            .parse::<Environment>()
            .map_err(|reason| ConfigLoadError::InvalidValue {
                key: env::APP_ENV,
                reason,
            })?,
        None => Environment::default(),
    };

    let server = ServerConfig {
        host: vars
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| constants::DEFAULT_HOST.to_string()),
        port: parse_number(env::SERVER_PORT, vars.server_port)?
            .or(file_server.port)
            .unwrap_or(constants::DEFAULT_PORT),
    };

    let database = DatabaseConfig {
        url: vars
            .database_url
            .or(file_database.url)
            .filter(|url| !url.trim().is_empty()),
        max_connections: parse_number(env::DATABASE_MAX_CONNECTIONS, vars.database_max_connections)?
            .or(file_database.max_connections)
            .unwrap_or(constants::DEFAULT_DB_MAX_CONNECTIONS),
        acquire_timeout: parse_duration(
            env::DATABASE_ACQUIRE_TIMEOUT,
            vars.database_acquire_timeout.or(file_database.acquire_timeout),
        )?
        .unwrap_or(constants::DEFAULT_DB_ACQUIRE_TIMEOUT),
    };

    let mut uses_dev_secrets = false;
    let mut secret = |field: &'static str,
                      value: Option<String>,
                      fallback: &str|
     -> Result<String, ConfigLoadError> {
        match value.filter(|v| !v.is_empty()) {
            Some(value) => Ok(value),
            None if environment == Environment::Production => {
                Err(ConfigGuardRailError::MissingSecret { field }.into())
            }
            None => {
                uses_dev_secrets = true;
                Ok(fallback.to_string())
            }
        }
    };

    let access_token_secret = secret(
        env::ACCESS_TOKEN_SECRET,
        vars.access_token_secret.or(file_auth.access_token_secret),
        constants::DEV_ACCESS_TOKEN_SECRET,
    )?;
    let refresh_token_secret = secret(
        env::REFRESH_TOKEN_SECRET,
        vars.refresh_token_secret.or(file_auth.refresh_token_secret),
        constants::DEV_REFRESH_TOKEN_SECRET,
    )?;
    let password_pepper = secret(
        env::PASSWORD_PEPPER,
        vars.password_pepper.or(file_auth.password_pepper),
        constants::DEV_PASSWORD_PEPPER,
    )?;
    let token_hmac_key = secret(
        env::TOKEN_HMAC_KEY,
        vars.token_hmac_key.or(file_auth.token_hmac_key),
        constants::DEV_TOKEN_HMAC_KEY,
    )?;

    let auth = AuthConfig {
        access_token_secret,
        refresh_token_secret,
        password_pepper,
        token_hmac_key,
        access_token_ttl: parse_duration(
            env::ACCESS_TOKEN_EXPIRY,
            vars.access_token_expiry.or(file_auth.access_token_ttl),
        )?
        .unwrap_or(constants::DEFAULT_ACCESS_TOKEN_TTL),
        refresh_token_ttl: parse_duration(
            env::REFRESH_TOKEN_EXPIRY,
            vars.refresh_token_expiry.or(file_auth.refresh_token_ttl),
        )?
        .unwrap_or(constants::DEFAULT_REFRESH_TOKEN_TTL),
        max_refresh_tokens: parse_number(env::MAX_REFRESH_TOKENS, vars.max_refresh_tokens)?
            .or(file_auth.max_refresh_tokens)
            .unwrap_or(constants::DEFAULT_MAX_REFRESH_TOKENS),
    };

    Ok(Config {
        server,
        database,
        auth,
        environment,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
            uses_dev_secrets,
        },
    })
}

fn parse_duration(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                key,
                value: value.clone(),
                source,
            }
        })
    })
    .transpose()
}

fn parse_number<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigLoadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|err| ConfigLoadError::InvalidValue {
                key,
                reason: format!("'{value}': {err}"),
            })
    })
    .transpose()
}
