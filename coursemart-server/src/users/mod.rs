//! User-facing HTTP handlers.

pub mod auth;
