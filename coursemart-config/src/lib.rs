//! Configuration loading for Coursemart.
//!
//! Values are layered as built-in defaults, then an optional TOML file, then
//! environment variables (after `.env` is loaded). Guard rails run once the
//! layers are merged: some problems are fatal, the rest come back as
//! [`ConfigWarnings`] for the caller to log.

pub mod constants;
pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::{
    AuthConfig, Config, ConfigMetadata, DatabaseConfig, Environment, ServerConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
