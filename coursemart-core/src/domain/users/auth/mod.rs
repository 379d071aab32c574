//! Authentication: password hashing, token issuance, and session rotation.
//!
//! - [`crypto::AuthCrypto`]: Argon2id password hashing with a pepper
//! - [`tokens::TokenService`]: signed access and refresh tokens
//! - [`store::CredentialStore`]: persistence port for identities
//! - [`session_manager::SessionManager`]: register, login, refresh, logout

pub mod crypto;
pub mod session_manager;
pub mod store;
pub mod tokens;

pub use crypto::{AuthCrypto, AuthCryptoError};
pub use session_manager::{
    AuthSession, LoginRequest, RegisterRequest, SessionManager, TokenPair,
};
pub use store::{CredentialStore, RotationOutcome, StoreError, StoreResult};
pub use tokens::{TokenError, TokenKind, TokenService, TokenSettings};
