//! Shared harness for session integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursemart_core::domain::users::auth::session_manager::DEFAULT_MAX_REFRESH_TOKENS;
use coursemart_core::domain::users::auth::tokens::IssuedToken;
use coursemart_core::domain::users::auth::{
    AuthCrypto, CredentialStore, RegisterRequest, RotationOutcome, SessionManager, StoreResult,
    TokenKind, TokenService, TokenSettings,
};
use coursemart_core::domain::users::identity::{
    CourseId, HeldRefreshToken, UserId, UserIdentity,
};
use coursemart_core::infrastructure::InMemoryCredentialStore;

pub const ACCESS_SECRET: &str = "test-access-secret-test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret-test-refresh-secret";
pub const TEST_PASSWORD: &str = "secret1";

/// Session manager wired to an in-memory store, with handles to the store,
/// token service and crypto for assertions.
pub struct Harness {
    pub manager: Arc<SessionManager>,
    pub store: Arc<InMemoryCredentialStore>,
    pub tokens: Arc<TokenService>,
    pub crypto: Arc<AuthCrypto>,
}

impl Harness {
    pub fn new() -> Result<Self> {
        Self::with_max_refresh_tokens(DEFAULT_MAX_REFRESH_TOKENS)
    }

    pub fn with_max_refresh_tokens(max: usize) -> Result<Self> {
        let store = Arc::new(InMemoryCredentialStore::new());
        Self::build(store.clone(), store, max)
    }

    /// Like [`Harness::with_max_refresh_tokens`], but the manager talks to the
    /// store through an [`InterleavingStore`]. `store` stays the backing store.
    pub fn interleaved(max: usize) -> Result<(Self, Arc<InterleavingStore>)> {
        let store = Arc::new(InMemoryCredentialStore::new());
        let interleaving = Arc::new(InterleavingStore::new(store.clone()));
        let harness = Self::build(store, interleaving.clone(), max)?;
        Ok((harness, interleaving))
    }

    fn build(
        store: Arc<InMemoryCredentialStore>,
        backing: Arc<dyn CredentialStore>,
        max: usize,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenService::new(TokenSettings::new(
            ACCESS_SECRET,
            REFRESH_SECRET,
        ))?);
        let crypto = Arc::new(AuthCrypto::for_tests("test-pepper", "test-token-hmac-key")?);
        let manager = SessionManager::new(backing, tokens.clone(), crypto.clone())
            .with_max_refresh_tokens(max);

        Ok(Self {
            manager: Arc::new(manager),
            store,
            tokens,
            crypto,
        })
    }

    /// The entry a live refresh token is held under.
    pub fn held(&self, token: &str) -> Result<String> {
        let claims = self.tokens.verify(token, TokenKind::Refresh)?;
        self.entry(token, claims.expires_at)
    }

    /// The entry an issued token is held under, whether or not it still
    /// verifies.
    pub fn held_issued(&self, issued: &IssuedToken) -> Result<String> {
        self.entry(&issued.value, issued.expires_at)
    }

    fn entry(&self, token: &str, expires_at: DateTime<Utc>) -> Result<String> {
        Ok(HeldRefreshToken::new(self.crypto.hash_token(token)?, expires_at).to_string())
    }
}

/// A write another request lands between a lookup and the write that follows.
#[derive(Debug, Clone)]
pub enum Interleave {
    EnrollOnEmailLookup(CourseId),
    RotateOnEmailLookup { old: String, new: String },
    RotateOnIdLookup { old: String, new: String },
}

/// Store wrapper that returns the snapshot it read, then applies one armed
/// [`Interleave`] to the backing store before the caller sees the snapshot.
pub struct InterleavingStore {
    inner: Arc<InMemoryCredentialStore>,
    armed: Mutex<Option<Interleave>>,
}

impl InterleavingStore {
    pub fn new(inner: Arc<InMemoryCredentialStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
        }
    }

    pub fn arm(&self, interleave: Interleave) {
        *self.armed.lock().unwrap() = Some(interleave);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().unwrap().is_some()
    }

    fn take_if(&self, on_email: bool) -> Option<Interleave> {
        let mut armed = self.armed.lock().unwrap();
        let fires = match armed.as_ref()? {
            Interleave::EnrollOnEmailLookup(_) | Interleave::RotateOnEmailLookup { .. } => on_email,
            Interleave::RotateOnIdLookup { .. } => !on_email,
        };
        if fires { armed.take() } else { None }
    }

    async fn apply(&self, id: UserId, interleave: Interleave) -> StoreResult<()> {
        match interleave {
            Interleave::EnrollOnEmailLookup(course) => {
                if let Some(mut fresh) = self.inner.find_by_id(id).await? {
                    fresh.enrolled_courses.push(course);
                    self.inner.save(&fresh).await?;
                }
            }
            Interleave::RotateOnEmailLookup { old, new } | Interleave::RotateOnIdLookup { old, new } => {
                let outcome = self.inner.rotate_refresh_token(id, &old, &new).await?;
                assert_eq!(outcome, RotationOutcome::Rotated, "interleaved rotation must land");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InterleavingStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<UserIdentity>> {
        self.inner.find_by_email_or_username(email, username).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserIdentity>> {
        let snapshot = self.inner.find_by_email(email).await?;
        if let (Some(identity), Some(interleave)) = (&snapshot, self.take_if(true)) {
            self.apply(identity.id, interleave).await?;
        }
        Ok(snapshot)
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserIdentity>> {
        let snapshot = self.inner.find_by_id(id).await?;
        if let (Some(identity), Some(interleave)) = (&snapshot, self.take_if(false)) {
            self.apply(identity.id, interleave).await?;
        }
        Ok(snapshot)
    }

    async fn create(&self, identity: UserIdentity) -> StoreResult<UserIdentity> {
        self.inner.create(identity).await
    }

    async fn rotate_refresh_token(
        &self,
        id: UserId,
        old: &str,
        new: &str,
    ) -> StoreResult<RotationOutcome> {
        self.inner.rotate_refresh_token(id, old, new).await
    }

    async fn push_refresh_token(
        &self,
        id: UserId,
        token: &str,
        evict: &[String],
        max_held: usize,
    ) -> StoreResult<bool> {
        self.inner
            .push_refresh_token(id, token, evict, max_held)
            .await
    }

    async fn remove_refresh_token(&self, id: UserId, token: &str) -> StoreResult<bool> {
        self.inner.remove_refresh_token(id, token).await
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.record_login(id, at).await
    }

    async fn save(&self, identity: &UserIdentity) -> StoreResult<()> {
        self.inner.save(identity).await
    }
}

pub fn register_request(email: &str, username: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        username: username.to_string(),
        password: TEST_PASSWORD.to_string(),
    }
}
