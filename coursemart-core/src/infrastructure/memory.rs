use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::users::auth::store::{
    CredentialStore, RotationOutcome, StoreError, StoreResult,
};
use crate::domain::users::identity::{UserId, UserIdentity};

#[derive(Debug, Default)]
struct Collection {
    users: HashMap<UserId, UserIdentity>,
    by_email: HashMap<String, UserId>,
    by_username: HashMap<String, UserId>,
}

/// Process-local credential store.
///
/// Every mutation runs under one write lock, so uniqueness checks and
/// refresh-token swaps are atomic with respect to each other. Used for
/// development without a database and in tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Collection>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<UserIdentity>> {
        let guard = self.inner.read().await;
        let id = guard
            .by_email
            .get(email)
            .or_else(|| guard.by_username.get(username));
        Ok(id.and_then(|id| guard.users.get(id)).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserIdentity>> {
        let guard = self.inner.read().await;
        Ok(guard
            .by_email
            .get(email)
            .and_then(|id| guard.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserIdentity>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create(&self, identity: UserIdentity) -> StoreResult<UserIdentity> {
        let mut guard = self.inner.write().await;
        if guard.by_email.contains_key(&identity.email) {
            return Err(StoreError::Conflict { field: "email" });
        }
        if guard.by_username.contains_key(&identity.username) {
            return Err(StoreError::Conflict { field: "username" });
        }
        if guard.users.contains_key(&identity.id) {
            return Err(StoreError::Conflict { field: "id" });
        }

        guard.by_email.insert(identity.email.clone(), identity.id);
        guard.by_username.insert(identity.username.clone(), identity.id);
        guard.users.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn rotate_refresh_token(
        &self,
        id: UserId,
        old: &str,
        new: &str,
    ) -> StoreResult<RotationOutcome> {
        let mut guard = self.inner.write().await;
        let Some(identity) = guard.users.get_mut(&id) else {
            return Ok(RotationOutcome::IdentityMissing);
        };

        let Some(position) = identity.refresh_tokens.iter().position(|t| t == old) else {
            return Ok(RotationOutcome::TokenNotPresent);
        };

        identity.refresh_tokens.remove(position);
        identity.refresh_tokens.push(new.to_string());
        identity.updated_at = Utc::now();
        Ok(RotationOutcome::Rotated)
    }

    async fn push_refresh_token(
        &self,
        id: UserId,
        token: &str,
        evict: &[String],
        max_held: usize,
    ) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        let Some(identity) = guard.users.get_mut(&id) else {
            return Ok(false);
        };

        identity.refresh_tokens.retain(|held| !evict.contains(held));
        let keep = max_held.saturating_sub(1);
        if identity.refresh_tokens.len() > keep {
            let excess = identity.refresh_tokens.len() - keep;
            identity.refresh_tokens.drain(..excess);
        }
        identity.refresh_tokens.push(token.to_string());
        identity.updated_at = Utc::now();
        Ok(true)
    }

    async fn remove_refresh_token(&self, id: UserId, token: &str) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        let Some(identity) = guard.users.get_mut(&id) else {
            return Ok(false);
        };

        let before = identity.refresh_tokens.len();
        identity.refresh_tokens.retain(|held| held != token);
        let removed = identity.refresh_tokens.len() != before;
        if removed {
            identity.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        let Some(identity) = guard.users.get_mut(&id) else {
            return Ok(false);
        };

        identity.last_login_at = Some(at);
        identity.updated_at = at;
        Ok(true)
    }

    async fn save(&self, identity: &UserIdentity) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        if let Some(stored) = guard.users.get_mut(&identity.id) {
            stored.enrolled_courses = identity.enrolled_courses.clone();
            stored.is_admin = identity.is_admin;
            stored.last_login_at = identity.last_login_at;
            stored.updated_at = identity.updated_at;
        }
        Ok(())
    }
}
