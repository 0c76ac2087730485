//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor. Cloning is cheap: every field is a handle.

use std::sync::Arc;

use fwends_engine::{Authenticator, Engine, SessionManager};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Pack lifecycle engine.
    pub engine: Engine,
    /// Identity-token exchange for `POST /api/auth`.
    pub authenticator: Authenticator,
    /// Service configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Assemble state from its parts.
    pub fn new(engine: Engine, authenticator: Authenticator, config: AppConfig) -> Self {
        Self {
            engine,
            authenticator,
            config: Arc::new(config),
        }
    }

    /// Session manager shared with the authenticator.
    pub fn sessions(&self) -> &SessionManager {
        self.authenticator.sessions()
    }
}
