//! Credential store adapters.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::InMemoryCredentialStore;
#[cfg(feature = "database")]
pub use postgres::{PostgresCredentialStore, PostgresStoreOptions};
