use std::sync::Arc;

use anyhow::Context;
use coursemart_config::Config;
use coursemart_core::domain::users::auth::{
    AuthCrypto, CredentialStore, SessionManager, TokenService, TokenSettings,
};
use coursemart_core::infrastructure::InMemoryCredentialStore;
use tracing::{info, warn};

use crate::infra::app_state::AppState;

/// Connect the credential store and assemble the session manager.
///
/// With a database URL the PostgreSQL store is opened once and migrated.
/// Without one the process keeps identities in memory.
pub async fn build_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let store = connect_store(&config).await?;
    let sessions = session_manager(&config, store)?;
    Ok(AppState::new(Arc::new(sessions), config))
}

pub fn session_manager(
    config: &Config,
    store: Arc<dyn CredentialStore>,
) -> anyhow::Result<SessionManager> {
    let auth = &config.auth;
    let settings = TokenSettings::new(&auth.access_token_secret, &auth.refresh_token_secret)
        .with_access_ttl(
            chrono::Duration::from_std(auth.access_token_ttl)
                .context("access token TTL out of range")?,
        )
        .with_refresh_ttl(
            chrono::Duration::from_std(auth.refresh_token_ttl)
                .context("refresh token TTL out of range")?,
        );
    let tokens = TokenService::new(settings).context("invalid token signing configuration")?;
    let crypto = AuthCrypto::new(&auth.password_pepper, &auth.token_hmac_key)
        .context("invalid password hashing configuration")?;

    Ok(
        SessionManager::new(store, Arc::new(tokens), Arc::new(crypto))
            .with_max_refresh_tokens(auth.max_refresh_tokens),
    )
}

#[cfg(feature = "database")]
async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    use coursemart_core::infrastructure::{PostgresCredentialStore, PostgresStoreOptions};

    match config.database.url.as_deref() {
        Some(url) => {
            let options = PostgresStoreOptions {
                max_connections: config.database.max_connections,
                acquire_timeout: config.database.acquire_timeout,
            };
            let store = PostgresCredentialStore::connect(url, options).await?;
            info!("using PostgreSQL credential store");
            Ok(Arc::new(store))
        }
        None => Ok(in_memory_store()),
    }
}

#[cfg(not(feature = "database"))]
async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    if config.database.url.is_some() {
        warn!("DATABASE_URL is set but this build has no database support");
    }
    Ok(in_memory_store())
}

fn in_memory_store() -> Arc<dyn CredentialStore> {
    warn!("using in-memory credential store; identities are lost on restart");
    Arc::new(InMemoryCredentialStore::new())
}
