//! # Coursemart Core
//!
//! Identity and session-token lifecycle for the Coursemart course marketplace.
//!
//! - [`domain::users::identity`]: the stored identity record and its public
//!   projection
//! - [`domain::users::auth`]: password hashing, JWT issuance and verification,
//!   the credential store port, and the [`SessionManager`] that drives
//!   register, login, refresh, and logout
//! - [`infrastructure`]: in-memory and PostgreSQL credential stores
//! - [`api_types`]: the JSON envelope used at the HTTP boundary
//!
//! ## Feature Flags
//!
//! - `database` (default): PostgreSQL store and embedded migrations via SQLx
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use coursemart_core::domain::users::auth::{
//!     AuthCrypto, RegisterRequest, SessionManager, TokenService, TokenSettings,
//! };
//! use coursemart_core::infrastructure::InMemoryCredentialStore;
//!
//! async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//!     let tokens = TokenService::new(TokenSettings::new(
//!         "access-secret-access-secret-0000",
//!         "refresh-secret-refresh-secret-00",
//!     ))?;
//!     let manager = SessionManager::new(
//!         Arc::new(InMemoryCredentialStore::new()),
//!         Arc::new(tokens),
//!         Arc::new(AuthCrypto::new("pepper", "token-hmac-key")?),
//!     );
//!
//!     let session = manager
//!         .register(RegisterRequest {
//!             email: "a@x.com".into(),
//!             username: "Alice".into(),
//!             password: "secret1".into(),
//!         })
//!         .await?;
//!     let rotated = manager.refresh(Some(&session.refresh_token)).await?;
//!     println!("{}", rotated.access_token);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api_types;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::users::auth::SessionManager;
pub use error::{Result, SessionError};

/// Embedded schema migrations for the PostgreSQL credential store.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
