use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::users::identity::{UserId, UserIdentity};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write. `field` names the offending column.
    #[error("{field} already exists")]
    Conflict { field: &'static str },
    /// Timeouts, dropped connections, and other infrastructure failures.
    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of the conditional swap used by refresh-token rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The old token was present and has been replaced by the new one.
    Rotated,
    /// The identity exists but no longer holds the old token.
    TokenNotPresent,
    IdentityMissing,
}

/// Persistence port for identity records.
///
/// Implementations must enforce email and username uniqueness themselves, and
/// must execute every refresh-token mutation as a single atomic operation per
/// identity. The session manager never reads a token set, edits it locally,
/// and writes it back.
///
/// Token arguments are the stored entries described by
/// [`HeldRefreshToken`](crate::domain::users::identity::HeldRefreshToken),
/// never raw tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<UserIdentity>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserIdentity>>;

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserIdentity>>;

    /// Insert a new identity, including its initial refresh tokens.
    async fn create(&self, identity: UserIdentity) -> StoreResult<UserIdentity>;

    /// Remove `old` and append `new` only if `old` is currently held.
    async fn rotate_refresh_token(
        &self,
        id: UserId,
        old: &str,
        new: &str,
    ) -> StoreResult<RotationOutcome>;

    /// Drop every token in `evict`, keep at most the newest `max_held - 1` of
    /// the rest, then append `token`, all in one atomic step. Returns `false`
    /// when the identity does not exist.
    async fn push_refresh_token(
        &self,
        id: UserId,
        token: &str,
        evict: &[String],
        max_held: usize,
    ) -> StoreResult<bool>;

    /// Returns `true` if the token was held and has been removed.
    async fn remove_refresh_token(&self, id: UserId, token: &str) -> StoreResult<bool>;

    /// Set `last_login_at` (and `updated_at`) without touching any other
    /// field. Returns `false` when the identity does not exist.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Persist profile fields. The refresh-token set is left untouched.
    async fn save(&self, identity: &UserIdentity) -> StoreResult<()>;
}
