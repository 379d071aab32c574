//! Registration, login, and refresh-token rotation.
//!
//! ## Token lifecycle
//!
//! 1. **Register** creates the identity with its first refresh token already
//!    in the set (one store write).
//! 2. **Login** appends a new refresh token; earlier ones stay valid so several
//!    devices can hold sessions at once. Expired tokens are evicted in the
//!    same store call, which also trims the set to the per-identity cap,
//!    oldest first.
//! 3. **Refresh** accepts a token only if it verifies *and* is still held by
//!    its identity, then swaps it for a new one with a single conditional
//!    store update. A token that was already swapped out fails the membership
//!    check, which is how replay of a stale copy is detected.
//! 4. **Logout** removes one token from the set.
//!
//! The set never holds a token itself, only a [`HeldRefreshToken`] entry: the
//! token's HMAC digest under the server key, prefixed with its expiry.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::crypto::AuthCrypto;
use super::store::{CredentialStore, RotationOutcome};
use super::tokens::{TokenError, TokenKind, TokenService};
use crate::domain::users::identity::{
    HeldRefreshToken, PublicUser, UserId, UserIdentity, normalize_email, normalize_username,
};
use crate::error::{Result, SessionError};

/// Client-facing messages. Login failures share one message so callers cannot
/// tell an unknown email from a wrong password.
pub mod messages {
    pub const FIELDS_REQUIRED: &str = "All fields are required";
    pub const USER_EXISTS: &str = "User already exists with this email or username";
    pub const LOGIN_FIELDS_REQUIRED: &str = "Email and password are required";
    pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
    pub const REFRESH_TOKEN_REQUIRED: &str = "Refresh token is required";
    pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
    pub const REFRESH_TOKEN_REUSED: &str = "Refresh token is expired or already used";
    pub const ACCESS_TOKEN_REQUIRED: &str = "Access token is required";
    pub const INVALID_ACCESS_TOKEN: &str = "Invalid or expired access token";
    pub const USER_NOT_FOUND: &str = "User not found";
}

pub const DEFAULT_MAX_REFRESH_TOKENS: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Result of register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    crypto: Arc<AuthCrypto>,
    max_refresh_tokens: usize,
    timing_hash: OnceLock<Option<String>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store_refs", &Arc::strong_count(&self.store))
            .field("tokens", &self.tokens)
            .field("max_refresh_tokens", &self.max_refresh_tokens)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        crypto: Arc<AuthCrypto>,
    ) -> Self {
        Self {
            store,
            tokens,
            crypto,
            max_refresh_tokens: DEFAULT_MAX_REFRESH_TOKENS,
            timing_hash: OnceLock::new(),
        }
    }

    /// Cap on refresh tokens held per identity. Values below one are raised
    /// to one so the token being issued always fits.
    pub fn with_max_refresh_tokens(mut self, max: usize) -> Self {
        self.max_refresh_tokens = max.max(1);
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession> {
        let email = normalize_email(&request.email);
        let username = normalize_username(&request.username);
        if email.is_empty() || username.is_empty() || request.password.trim().is_empty() {
            return Err(SessionError::validation(messages::FIELDS_REQUIRED));
        }

        if self
            .store
            .find_by_email_or_username(&email, &username)
            .await?
            .is_some()
        {
            return Err(SessionError::conflict(messages::USER_EXISTS));
        }

        let password_hash = self.crypto.hash_password(&request.password)?;
        let id = UserId::new();
        let access = self.tokens.issue_access_token(id)?;
        let refresh = self.tokens.issue_refresh_token(id)?;

        let mut identity = UserIdentity::new(id, email, username, password_hash);
        identity
            .refresh_tokens
            .push(self.stored_entry(&refresh.value, refresh.expires_at)?);

        // The store's unique indexes settle races the lookup above cannot.
        let created = self.store.create(identity).await?;
        info!(user_id = %created.id, username = %created.username, "registered user");

        Ok(AuthSession {
            user: created.to_public(),
            access_token: access.value,
            refresh_token: refresh.value,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(SessionError::validation(messages::LOGIN_FIELDS_REQUIRED));
        }

        let Some(mut identity) = self.store.find_by_email(&email).await? else {
            self.burn_verification(&request.password);
            return Err(SessionError::unauthorized(messages::INVALID_CREDENTIALS));
        };

        if !self
            .crypto
            .verify_password(&request.password, &identity.password_hash)?
        {
            debug!(user_id = %identity.id, "password mismatch");
            return Err(SessionError::unauthorized(messages::INVALID_CREDENTIALS));
        }

        let access = self.tokens.issue_access_token(identity.id)?;
        let refresh = self.tokens.issue_refresh_token(identity.id)?;
        let entry = self.stored_entry(&refresh.value, refresh.expires_at)?;

        let now = Utc::now();
        let evict = expired_entries(&identity, now);
        if !evict.is_empty() {
            warn!(
                user_id = %identity.id,
                evicted = evict.len(),
                "evicting stale refresh tokens"
            );
        }

        if !self
            .store
            .push_refresh_token(identity.id, &entry, &evict, self.max_refresh_tokens)
            .await?
            || !self.store.record_login(identity.id, now).await?
        {
            return Err(SessionError::unauthorized(messages::INVALID_CREDENTIALS));
        }
        identity.record_login(now);
        info!(user_id = %identity.id, "user logged in");

        Ok(AuthSession {
            user: identity.to_public(),
            access_token: access.value,
            refresh_token: refresh.value,
        })
    }

    /// Exchange a held refresh token for a new pair. Each refresh token can be
    /// exchanged exactly once.
    pub async fn refresh(&self, incoming: Option<&str>) -> Result<TokenPair> {
        let incoming = incoming
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SessionError::unauthorized(messages::REFRESH_TOKEN_REQUIRED))?;

        let claims = self
            .tokens
            .verify(incoming, TokenKind::Refresh)
            .map_err(|err| {
                debug!(error = %err, "refresh token rejected");
                SessionError::unauthorized(messages::INVALID_REFRESH_TOKEN)
            })?;

        let identity = self
            .store
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| SessionError::unauthorized(messages::INVALID_REFRESH_TOKEN))?;

        let held = self.stored_entry(incoming, claims.expires_at)?;
        if !identity.holds_refresh_token(&held) {
            warn!(user_id = %identity.id, "refresh token reuse detected");
            return Err(SessionError::unauthorized(messages::REFRESH_TOKEN_REUSED));
        }

        let access = self.tokens.issue_access_token(identity.id)?;
        let refresh = self.tokens.issue_refresh_token(identity.id)?;
        let replacement = self.stored_entry(&refresh.value, refresh.expires_at)?;

        match self
            .store
            .rotate_refresh_token(identity.id, &held, &replacement)
            .await?
        {
            RotationOutcome::Rotated => {
                debug!(user_id = %identity.id, "rotated refresh token");
                Ok(TokenPair {
                    access_token: access.value,
                    refresh_token: refresh.value,
                })
            }
            RotationOutcome::TokenNotPresent => {
                warn!(user_id = %identity.id, "refresh token rotated concurrently");
                Err(SessionError::unauthorized(messages::REFRESH_TOKEN_REUSED))
            }
            RotationOutcome::IdentityMissing => {
                Err(SessionError::unauthorized(messages::INVALID_REFRESH_TOKEN))
            }
        }
    }

    /// Revoke a single refresh token. Revoking a token that is no longer held
    /// succeeds.
    pub async fn logout(&self, incoming: Option<&str>) -> Result<()> {
        let incoming = incoming
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SessionError::unauthorized(messages::REFRESH_TOKEN_REQUIRED))?;

        let claims = self
            .tokens
            .verify(incoming, TokenKind::Refresh)
            .map_err(|_| SessionError::unauthorized(messages::INVALID_REFRESH_TOKEN))?;

        let held = self.stored_entry(incoming, claims.expires_at)?;
        let removed = self
            .store
            .remove_refresh_token(claims.user_id, &held)
            .await?;
        info!(user_id = %claims.user_id, removed, "user logged out");
        Ok(())
    }

    /// Resolve the identity behind an access token.
    pub async fn authenticate(&self, access_token: Option<&str>) -> Result<PublicUser> {
        let token = access_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SessionError::unauthorized(messages::ACCESS_TOKEN_REQUIRED))?;

        let claims = self
            .tokens
            .verify(token, TokenKind::Access)
            .map_err(|err| match err {
                TokenError::Expired | TokenError::Invalid => {
                    SessionError::unauthorized(messages::INVALID_ACCESS_TOKEN)
                }
                other => SessionError::from(other),
            })?;

        self.store
            .find_by_id(claims.user_id)
            .await?
            .map(|identity| identity.to_public())
            .ok_or_else(|| SessionError::not_found(messages::USER_NOT_FOUND))
    }

    /// The form a refresh token takes in the identity's held set.
    fn stored_entry(&self, token: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let digest = self.crypto.hash_token(token)?;
        Ok(HeldRefreshToken::new(digest, expires_at).to_string())
    }

    /// Run one hash verification so an unknown email costs about as much as a
    /// wrong password.
    fn burn_verification(&self, password: &str) {
        let hash = self
            .timing_hash
            .get_or_init(|| self.crypto.hash_password("coursemart-timing-dummy").ok());
        if let Some(hash) = hash {
            let _ = self.crypto.verify_password(password, hash);
        }
    }
}

/// Held entries that are past their expiry or unreadable.
fn expired_entries(identity: &UserIdentity, now: DateTime<Utc>) -> Vec<String> {
    identity
        .refresh_tokens
        .iter()
        .filter(|entry| {
            HeldRefreshToken::parse(entry).is_none_or(|held| held.is_expired_at(now))
        })
        .cloned()
        .collect()
}
