//! # Session Primitive
//!
//! Sessions are random tokens whose only state is their existence in the
//! session cache under `{prefix}{token}`. They expire with the cache TTL and
//! are never revoked explicitly.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fwends_store::SessionCache;
use rand_core::{OsRng, RngCore};

use crate::error::EngineError;

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Random bytes per token, before base64 encoding.
    pub id_size: usize,
    /// Session lifetime; also the cookie max-age.
    pub ttl: Duration,
    /// Cache key prefix.
    pub key_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_size: 32,
            ttl: Duration::from_secs(24 * 60 * 60),
            key_prefix: "session/".to_string(),
        }
    }
}

/// A freshly minted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Base64 token handed to the client.
    pub token: String,
    /// Lifetime of the token.
    pub ttl: Duration,
}

/// Creates and verifies sessions against a [`SessionCache`].
#[derive(Clone)]
pub struct SessionManager {
    cache: Arc<dyn SessionCache>,
    config: SessionConfig,
}

impl SessionManager {
    /// Build a manager over the given cache.
    pub fn new(cache: Arc<dyn SessionCache>, config: SessionConfig) -> Self {
        Self { cache, config }
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backing cache.
    pub fn cache(&self) -> &Arc<dyn SessionCache> {
        &self.cache
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.config.key_prefix, token)
    }

    /// Mint a new session.
    ///
    /// A token that already exists in the cache is treated as a fatal id
    /// generation failure rather than retried.
    pub async fn create(&self) -> Result<Session, EngineError> {
        let mut raw = vec![0u8; self.config.id_size];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| EngineError::Internal(format!("session id generation failed: {e}")))?;
        let token = STANDARD.encode(&raw);

        if !self.cache.set_nx(&self.key(&token), self.config.ttl).await? {
            tracing::error!("session id collision");
            return Err(EngineError::Internal("session id collision".into()));
        }
        Ok(Session {
            token,
            ttl: self.config.ttl,
        })
    }

    /// Whether `token` names a live session. A missing token is simply not
    /// authenticated; cache failures are errors.
    pub async fn verify(&self, token: Option<&str>) -> Result<bool, EngineError> {
        match token {
            None => Ok(false),
            Some(token) => Ok(self.cache.exists(&self.key(token)).await?),
        }
    }
}
