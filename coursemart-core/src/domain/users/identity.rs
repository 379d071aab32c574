//! Identity records held by the credential store.
//!
//! A [`UserIdentity`] is created once at registration and never deleted. Its
//! password hash and refresh-token set stay on the server: callers only ever
//! see the [`PublicUser`] projection.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a registered user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Weak reference to a catalog course. The identity does not own the course.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CourseId(Uuid);

impl CourseId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for CourseId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored form of an issued refresh token: `"<exp>.<digest>"`, the token's
/// expiry as a Unix timestamp followed by its keyed HMAC digest.
///
/// The raw token never reaches the store. The expiry prefix lets stale
/// entries be recognised without the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldRefreshToken {
    expires_at: i64,
    digest: String,
}

impl HeldRefreshToken {
    pub fn new(digest: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: expires_at.timestamp(),
            digest: digest.into(),
        }
    }

    pub fn parse(entry: &str) -> Option<Self> {
        let (expires_at, digest) = entry.split_once('.')?;
        if digest.is_empty() {
            return None;
        }
        Some(Self {
            expires_at: expires_at.parse().ok()?,
            digest: digest.to_string(),
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for HeldRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.expires_at, self.digest)
    }
}

/// Server-side user record.
///
/// `refresh_tokens` holds [`HeldRefreshToken`] entries, oldest first, for
/// tokens minted for this identity that have not been rotated out, revoked,
/// or evicted.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    pub refresh_tokens: Vec<String>,
    #[serde(default)]
    pub enrolled_courses: Vec<CourseId>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("refresh_tokens", &self.refresh_tokens.len())
            .field("enrolled_courses", &self.enrolled_courses)
            .field("is_admin", &self.is_admin)
            .finish_non_exhaustive()
    }
}

impl UserIdentity {
    /// Build a new identity. Email and username are expected to already be
    /// normalized (see [`normalize_email`] and [`normalize_username`]).
    pub fn new(
        id: UserId,
        email: String,
        username: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            username,
            password_hash,
            refresh_tokens: Vec::new(),
            enrolled_courses: Vec::new(),
            is_admin: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub fn holds_refresh_token(&self, entry: &str) -> bool {
        self.refresh_tokens.iter().any(|held| held == entry)
    }

    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login_at = Some(at);
        self.updated_at = at;
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

/// Sanitized view of an identity returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub enrolled_courses: Vec<CourseId>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&UserIdentity> for PublicUser {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            enrolled_courses: identity.enrolled_courses.clone(),
            is_admin: identity.is_admin,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
            last_login_at: identity.last_login_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> UserIdentity {
        let mut identity = UserIdentity::new(
            UserId::new(),
            "a@x.com".into(),
            "alice".into(),
            "$argon2id$v=19$m=8,t=1,p=1$c2FsdA$aGFzaA".into(),
        );
        identity.refresh_tokens.push("refresh-1".into());
        identity
    }

    #[test]
    fn serialization_omits_secrets() {
        let json = serde_json::to_string(&identity()).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("refresh-1"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn debug_redacts_password_hash() {
        let rendered = format!("{:?}", identity());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("argon2id"));
        assert!(!rendered.contains("refresh-1"));
    }

    #[test]
    fn public_projection_uses_camel_case() {
        let value = serde_json::to_value(identity().to_public()).unwrap();
        assert_eq!(value["username"], "alice");
        assert!(value.get("enrolledCourses").is_some());
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("refreshTokens").is_none());
    }

    #[test]
    fn held_tokens_round_trip_and_expire() {
        let expires_at = Utc::now() + chrono::Duration::minutes(5);
        let held = HeldRefreshToken::new("ab12", expires_at);
        let entry = held.to_string();
        assert_eq!(entry, format!("{}.ab12", expires_at.timestamp()));
        assert_eq!(HeldRefreshToken::parse(&entry), Some(held.clone()));
        assert!(!held.is_expired_at(Utc::now()));
        assert!(held.is_expired_at(expires_at));

        assert_eq!(HeldRefreshToken::parse("eyJhbGciOi.payload.sig"), None);
        assert_eq!(HeldRefreshToken::parse("123."), None);
        assert_eq!(HeldRefreshToken::parse("no-separator"), None);
    }

    #[test]
    fn normalizes_identifiers() {
        assert_eq!(normalize_username("  Alice "), "alice");
        assert_eq!(normalize_email(" A@X.com"), "a@x.com");
    }
}
