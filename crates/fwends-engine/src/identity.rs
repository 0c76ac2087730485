//! # Identity Providers and Authentication
//!
//! An identity provider turns an opaque bearer token into a verified email
//! address. [`Authenticator`] dispatches to the named provider, checks the
//! email against the admin allow-list, and mints a session.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use fwends_store::PackCatalog;
use subtle::ConstantTimeEq;

use crate::error::EngineError;
use crate::session::{Session, SessionManager};

/// Identity verification failures.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The token was not accepted.
    #[error("identity token rejected")]
    Rejected,

    /// The provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies bearer tokens issued by an external identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Service name clients use to select this provider.
    fn name(&self) -> &str;

    /// Return the verified email the token belongs to.
    async fn verify(&self, token: &str) -> Result<String, IdentityError>;
}

/// Constant-time comparison of tokens.
///
/// When lengths differ, performs a dummy comparison to avoid leaking length
/// information through timing variance.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Provider backed by a fixed `token -> email` table.
#[derive(Clone)]
pub struct StaticIdentityProvider {
    name: String,
    identities: Vec<(String, String)>,
}

impl StaticIdentityProvider {
    /// Build a provider from `(token, email)` pairs.
    pub fn new(name: impl Into<String>, identities: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            identities,
        }
    }
}

impl std::fmt::Debug for StaticIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticIdentityProvider")
            .field("name", &self.name)
            .field("identities", &format!("[{} REDACTED]", self.identities.len()))
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self, token: &str) -> Result<String, IdentityError> {
        // Compare against every entry so timing does not reveal the match.
        let mut found = None;
        for (expected, email) in &self.identities {
            if constant_time_token_eq(token, expected) && found.is_none() {
                found = Some(email.clone());
            }
        }
        found.ok_or(IdentityError::Rejected)
    }
}

/// Exchanges identity tokens for sessions.
#[derive(Clone)]
pub struct Authenticator {
    providers: BTreeMap<String, Arc<dyn IdentityProvider>>,
    catalog: Arc<dyn PackCatalog>,
    sessions: SessionManager,
}

impl Authenticator {
    /// Build an authenticator over the given providers.
    pub fn new(
        providers: Vec<Arc<dyn IdentityProvider>>,
        catalog: Arc<dyn PackCatalog>,
        sessions: SessionManager,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self {
            providers,
            catalog,
            sessions,
        }
    }

    /// Names of the configured identity services.
    pub fn services(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// The session manager new sessions are minted by.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Verify `token` with `service`, require an admin email, and mint a
    /// session.
    pub async fn authenticate(&self, service: &str, token: &str) -> Result<Session, EngineError> {
        let provider = self
            .providers
            .get(service)
            .ok_or_else(|| EngineError::Unauthorized(format!("unknown identity service: {service}")))?;

        let email = provider.verify(token).await.map_err(|e| match e {
            IdentityError::Rejected => EngineError::Unauthorized(e.to_string()),
            IdentityError::Unavailable(_) => EngineError::Internal(e.to_string()),
        })?;

        if !self.catalog.is_admin(&email).await? {
            tracing::warn!(service, "authenticated user is not an admin");
            return Err(EngineError::Unauthorized(format!("{email} is not an admin")));
        }

        let session = self.sessions.create().await?;
        tracing::info!(service, "session created");
        Ok(session)
    }
}
