//! Domain layer entry modules.

pub mod users;
