use thiserror::Error;

use crate::domain::users::auth::{
    crypto::AuthCryptoError, store::StoreError, tokens::TokenError,
};

/// Failures surfaced by the session manager.
///
/// Business-rule variants carry the exact message returned to clients. The
/// infrastructure variants (`Unavailable`, `Internal`) keep their cause for
/// logging; the HTTP boundary replaces their message with a generic one.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// HTTP status code the boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
            Self::Unavailable(_) => 503,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::Conflict(
                crate::domain::users::auth::session_manager::messages::USER_EXISTS
                    .to_string(),
            ),
            StoreError::Unavailable(source) => Self::Unavailable(source),
        }
    }
}

impl From<AuthCryptoError> for SessionError {
    fn from(err: AuthCryptoError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(SessionError::validation("x").status_code(), 400);
        assert_eq!(SessionError::unauthorized("x").status_code(), 401);
        assert_eq!(SessionError::not_found("x").status_code(), 404);
        assert_eq!(SessionError::conflict("x").status_code(), 409);
        assert_eq!(SessionError::Internal("x".into()).status_code(), 500);
        assert!(
            SessionError::Unavailable(anyhow::anyhow!("timeout")).is_server_error()
        );
    }

    #[test]
    fn store_conflict_uses_registration_message() {
        let err: SessionError = StoreError::Conflict { field: "email" }.into();
        assert_eq!(
            err.to_string(),
            "User already exists with this email or username"
        );
        assert_eq!(err.status_code(), 409);
    }
}
