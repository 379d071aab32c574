//! Signed access and refresh tokens.
//!
//! Both kinds are HS256 JWTs with the same claim shape. They are signed with
//! different secrets and carry their kind, so an access token never verifies
//! as a refresh token and the other way around. Validity of an access token is
//! decided here alone; a refresh token must additionally be held in its
//! identity's refresh-token set (see the session manager).

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::users::identity::UserId;

pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token key configuration error: {0}")]
    KeyConfig(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

/// A freshly minted token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Claims of a token that passed signature, kind, and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: UserId,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenSettings {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSettings {
    pub fn new(
        access_secret: impl AsRef<[u8]>,
        refresh_secret: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            access_secret: access_secret.as_ref().to_vec(),
            refresh_secret: refresh_secret.as_ref().to_vec(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn from_secret(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

/// Stateless issuer and verifier for both token kinds.
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access.ttl)
            .field("refresh_ttl", &self.refresh.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(settings: TokenSettings) -> Result<Self, TokenError> {
        if settings.access_secret.is_empty() {
            return Err(TokenError::KeyConfig("access token secret must not be empty"));
        }
        if settings.refresh_secret.is_empty() {
            return Err(TokenError::KeyConfig("refresh token secret must not be empty"));
        }
        if settings.access_secret == settings.refresh_secret {
            return Err(TokenError::KeyConfig(
                "access and refresh token secrets must differ",
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            access: KeyPair::from_secret(&settings.access_secret, settings.access_ttl),
            refresh: KeyPair::from_secret(&settings.refresh_secret, settings.refresh_ttl),
            validation,
        })
    }

    pub fn issue_access_token(&self, user_id: UserId) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, TokenKind::Access, Utc::now())
    }

    pub fn issue_refresh_token(&self, user_id: UserId) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, TokenKind::Refresh, Utc::now())
    }

    /// Mint a token as if the current time were `issued_at`.
    pub fn issue(
        &self,
        user_id: UserId,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let keys = self.keys(kind);
        let expires_at = issued_at + keys.ttl;
        let claims = Claims {
            sub: user_id.as_uuid(),
            kind,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let value = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))?;

        Ok(IssuedToken { value, expires_at })
    }

    /// Check signature, kind, and expiry.
    ///
    /// A token signed with the other kind's secret fails the signature check
    /// and is reported as [`TokenError::Invalid`].
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<VerifiedToken, TokenError> {
        let keys = self.keys(expected);
        let data = decode::<Claims>(token, &keys.decoding, &self.validation).map_err(
            |err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            },
        )?;

        let claims = data.claims;
        if claims.kind != expected {
            return Err(TokenError::Invalid);
        }

        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or(TokenError::Invalid)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::Invalid)?;

        Ok(VerifiedToken {
            user_id: UserId::from(claims.sub),
            kind: claims.kind,
            issued_at,
            expires_at,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access.ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}
