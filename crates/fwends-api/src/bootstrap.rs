//! # Service Bootstrap
//!
//! Turns an [`AppConfig`] into a running [`AppState`].
//!
//! ## Bootstrap Sequence
//!
//! 1. **Catalog**: PostgreSQL when `DATABASE_URL` is set (migrations run on
//!    connect), otherwise the in-memory catalog seeded with `FWENDS_ADMINS`.
//! 2. **Blob store**: filesystem under `FWENDS_BLOB_DIR`, otherwise in-memory.
//! 3. **Id generator**: machine index from config, else the hostname ordinal,
//!    else 0.
//! 4. **Engine**: starts the prune queue and sweeps the pruned-marker backlog.
//! 5. **Authentication**: session cache and identity providers.

use std::sync::Arc;

use fwends_core::{machine_index_from_hostname, SnowflakeError, SnowflakeGenerator};
use fwends_engine::{
    Authenticator, Engine, IdentityProvider, SessionManager, StaticIdentityProvider,
};
use fwends_store::{
    init_pool, BlobStore, FsBlobStore, MemoryBlobStore, MemoryCatalog, MemorySessionCache,
    PackCatalog, PgCatalog, StoreError,
};

use crate::config::AppConfig;
use crate::state::AppState;

/// Name under which the static identity provider is registered.
pub const STATIC_IDENTITY_SERVICE: &str = "static";

/// Errors during bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Connecting to PostgreSQL or running migrations failed.
    #[error("database initialization failed: {0}")]
    Database(#[from] sqlx::Error),

    /// A storage backend could not be opened.
    #[error("storage initialization failed: {0}")]
    Store(#[from] StoreError),

    /// The machine index is out of range.
    #[error("id generator: {0}")]
    Snowflake(#[from] SnowflakeError),
}

/// Pick the Snowflake machine index: explicit config first, then the
/// hostname ordinal, then 0.
pub fn resolve_machine_index(config: &AppConfig, hostname: Option<&str>) -> u16 {
    if let Some(index) = config.machine_index {
        return index;
    }
    match hostname.map(|h| machine_index_from_hostname(h.trim(), &config.hostname_prefix)) {
        Some(Ok(index)) => index,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "could not derive machine index from hostname; using 0");
            0
        }
        None => 0,
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .filter(|h| !h.trim().is_empty())
}

async fn build_catalog(config: &AppConfig) -> Result<Arc<dyn PackCatalog>, BootstrapError> {
    match &config.database_url {
        Some(url) => {
            let pool = init_pool(url, &config.pool_settings()).await?;
            if !config.admins.is_empty() {
                tracing::warn!("FWENDS_ADMINS is ignored with a database; manage the admins table directly");
            }
            Ok(Arc::new(PgCatalog::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory catalog");
            let catalog = MemoryCatalog::new();
            for email in &config.admins {
                catalog.add_admin(email.clone());
            }
            Ok(Arc::new(catalog))
        }
    }
}

fn build_blobs(config: &AppConfig) -> Result<Arc<dyn BlobStore>, BootstrapError> {
    match &config.blob_dir {
        Some(dir) => {
            tracing::info!(path = %dir.display(), "using filesystem blob store");
            Ok(Arc::new(FsBlobStore::open(dir)?))
        }
        None => {
            tracing::warn!("FWENDS_BLOB_DIR not set; using in-memory blob store");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
    }
}

/// Assemble state around an already-built catalog and blob store.
///
/// Used by [`bootstrap`] and by tests that need direct access to the
/// backends.
pub fn assemble(
    config: AppConfig,
    catalog: Arc<dyn PackCatalog>,
    blobs: Arc<dyn BlobStore>,
    ids: SnowflakeGenerator,
) -> AppState {
    let engine = Engine::start(
        Arc::clone(&catalog),
        blobs,
        Arc::new(ids),
        config.engine_config(),
    );

    let sessions = SessionManager::new(Arc::new(MemorySessionCache::new()), config.session_config());
    let mut providers: Vec<Arc<dyn IdentityProvider>> = Vec::new();
    if !config.static_identities.is_empty() {
        providers.push(Arc::new(StaticIdentityProvider::new(
            STATIC_IDENTITY_SERVICE,
            config.static_identities.clone(),
        )));
    }
    let authenticator = Authenticator::new(providers, catalog, sessions);

    AppState::new(engine, authenticator, config)
}

/// Build every backend named by `config` and start the engine.
pub async fn bootstrap(config: AppConfig) -> Result<AppState, BootstrapError> {
    let catalog = build_catalog(&config).await?;
    let blobs = build_blobs(&config)?;

    let machine = resolve_machine_index(&config, hostname().as_deref());
    let ids = SnowflakeGenerator::new(machine)?;
    tracing::info!(machine_index = machine, "id generator ready");

    let state = assemble(config, catalog, blobs, ids);

    if let Err(e) = state.engine.pruner().sweep_backlog().await {
        tracing::warn!(error = %e, "pruned-marker backlog sweep failed");
    }

    tracing::info!(
        auth_enable = state.config.auth_enable,
        services = ?state.authenticator.services(),
        "bootstrap complete"
    );
    Ok(state)
}
