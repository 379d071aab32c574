use std::fmt;

use thiserror::Error;

use crate::constants::{MIN_SECRET_LENGTH, env};
use crate::models::{AuthConfig, Config};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} must be set when APP_ENV is production")]
    MissingSecret { field: &'static str },
    #[error("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ")]
    SharedTokenSecret,
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }

    /// Emit every warning through `tracing`.
    pub fn log(&self) {
        for warning in &self.items {
            match &warning.hint {
                Some(hint) => {
                    tracing::warn!(message = %warning.message, hint = %hint, "configuration warning")
                }
                None => tracing::warn!(message = %warning.message, "configuration warning"),
            }
        }
    }
}

/// Checks that run on the merged configuration. Missing production secrets
/// are rejected earlier, while the layers are resolved.
pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    check_auth(&config.auth, &mut warnings)?;

    if config.metadata.uses_dev_secrets {
        warnings.push_with_hint(
            "Using development fallback secrets for token signing or password hashing",
            format!(
                "Set {}, {}, {} and {} before exposing this server",
                env::ACCESS_TOKEN_SECRET,
                env::REFRESH_TOKEN_SECRET,
                env::PASSWORD_PEPPER,
                env::TOKEN_HMAC_KEY
            ),
        );
    }

    if config.database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; identities are kept in memory and lost on restart",
            "Set DATABASE_URL to a PostgreSQL connection string",
        );
    }

    if config.database.max_connections == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: env::DATABASE_MAX_CONNECTIONS,
        });
    }

    Ok(warnings)
}

fn check_auth(auth: &AuthConfig, warnings: &mut ConfigWarnings) -> Result<(), ConfigGuardRailError> {
    if auth.access_token_secret == auth.refresh_token_secret {
        return Err(ConfigGuardRailError::SharedTokenSecret);
    }

    if auth.max_refresh_tokens == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: env::MAX_REFRESH_TOKENS,
        });
    }

    for (field, value) in [
        (env::ACCESS_TOKEN_SECRET, &auth.access_token_secret),
        (env::REFRESH_TOKEN_SECRET, &auth.refresh_token_secret),
        (env::PASSWORD_PEPPER, &auth.password_pepper),
        (env::TOKEN_HMAC_KEY, &auth.token_hmac_key),
    ] {
        if value.len() < MIN_SECRET_LENGTH {
            warnings.push_with_hint(
                format!("{field} is shorter than {MIN_SECRET_LENGTH} bytes"),
                "Generate a longer random value, e.g. `openssl rand -hex 32`",
            );
        }
    }

    if auth.access_token_ttl >= auth.refresh_token_ttl {
        warnings.push("Access tokens outlive refresh tokens; check ACCESS_TOKEN_EXPIRY");
    }

    Ok(())
}
