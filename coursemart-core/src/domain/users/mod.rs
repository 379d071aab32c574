//! User-domain boundary.
//!
//! Groups identity records and the authentication flows that mint, rotate,
//! and revoke their session tokens.

pub mod auth;
pub mod identity;
