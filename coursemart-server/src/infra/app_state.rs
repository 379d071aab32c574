use std::{fmt, sync::Arc};

use coursemart_config::Config;
use coursemart_core::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, config: Arc<Config>) -> Self {
        Self { sessions, config }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cookies carry the `Secure` attribute only in production.
    pub fn secure_cookies(&self) -> bool {
        self.config.is_production()
    }
}
