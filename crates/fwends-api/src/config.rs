//! Service configuration.
//!
//! Read once at startup from environment variables. Every variable has a
//! default; a variable that is set but malformed is a [`ConfigError`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fwends_engine::{EngineConfig, RetryPolicy, SessionConfig};
use fwends_store::PoolSettings;

/// Typed service configuration.
///
/// Custom `Debug` redacts the database URL and the static identity tokens.
#[derive(Clone)]
pub struct AppConfig {
    /// `FWENDS_HTTP_PORT`
    pub port: u16,
    /// `FWENDS_HTTP_DEBUG`: include internal error detail in responses.
    pub http_debug: bool,
    /// `FWENDS_LOG_JSON`
    pub log_json: bool,
    /// `DATABASE_URL`; `None` selects the in-memory catalog.
    pub database_url: Option<String>,
    /// `FWENDS_DB_MAX_CONNECTIONS`
    pub db_max_connections: u32,
    /// `FWENDS_BLOB_DIR`; `None` selects the in-memory blob store.
    pub blob_dir: Option<PathBuf>,
    /// `FWENDS_MACHINE_INDEX`; `None` derives it from the hostname.
    pub machine_index: Option<u16>,
    /// `FWENDS_HOSTNAME_PREFIX`
    pub hostname_prefix: String,
    /// `FWENDS_AUTH_ENABLE`
    pub auth_enable: bool,
    /// `FWENDS_SESSION_ID_SIZE`
    pub session_id_size: usize,
    /// `FWENDS_SESSION_TTL_SECS`
    pub session_ttl: Duration,
    /// `FWENDS_SESSION_COOKIE`
    pub session_cookie: String,
    /// `FWENDS_SESSION_PREFIX`
    pub session_prefix: String,
    /// `FWENDS_STATIC_IDENTITIES`: `(token, email)` pairs.
    pub static_identities: Vec<(String, String)>,
    /// `FWENDS_ADMINS`: emails seeded into the in-memory catalog.
    pub admins: Vec<String>,
    /// `FWENDS_RETRY_MAX_ATTEMPTS`
    pub retry_max_attempts: u32,
    /// `FWENDS_PRUNE_CONCURRENCY`
    pub prune_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            http_debug: false,
            log_json: false,
            database_url: None,
            db_max_connections: 20,
            blob_dir: None,
            machine_index: None,
            hostname_prefix: "fwends-backend".to_string(),
            auth_enable: true,
            session_id_size: 32,
            session_ttl: Duration::from_secs(86_400),
            session_cookie: "fwends_session".to_string(),
            session_prefix: "session/".to_string(),
            static_identities: Vec::new(),
            admins: Vec::new(),
            retry_max_attempts: 32,
            prune_concurrency: 8,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("http_debug", &self.http_debug)
            .field("log_json", &self.log_json)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("db_max_connections", &self.db_max_connections)
            .field("blob_dir", &self.blob_dir)
            .field("machine_index", &self.machine_index)
            .field("hostname_prefix", &self.hostname_prefix)
            .field("auth_enable", &self.auth_enable)
            .field("session_id_size", &self.session_id_size)
            .field("session_ttl", &self.session_ttl)
            .field("session_cookie", &self.session_cookie)
            .field("session_prefix", &self.session_prefix)
            .field(
                "static_identities",
                &format!("[{} REDACTED]", self.static_identities.len()),
            )
            .field("admins", &self.admins)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("prune_concurrency", &self.prune_concurrency)
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: parse_var(&get, "FWENDS_HTTP_PORT", defaults.port)?,
            http_debug: parse_bool(&get, "FWENDS_HTTP_DEBUG", defaults.http_debug)?,
            log_json: parse_bool(&get, "FWENDS_LOG_JSON", defaults.log_json)?,
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_var(
                &get,
                "FWENDS_DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            )?,
            blob_dir: get("FWENDS_BLOB_DIR").map(PathBuf::from),
            machine_index: get("FWENDS_MACHINE_INDEX")
                .map(|raw| parse_value("FWENDS_MACHINE_INDEX", &raw))
                .transpose()?,
            hostname_prefix: get("FWENDS_HOSTNAME_PREFIX").unwrap_or(defaults.hostname_prefix),
            auth_enable: parse_bool(&get, "FWENDS_AUTH_ENABLE", defaults.auth_enable)?,
            session_id_size: parse_var(&get, "FWENDS_SESSION_ID_SIZE", defaults.session_id_size)?,
            session_ttl: Duration::from_secs(parse_var(
                &get,
                "FWENDS_SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )?),
            session_cookie: get("FWENDS_SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            session_prefix: get("FWENDS_SESSION_PREFIX").unwrap_or(defaults.session_prefix),
            static_identities: get("FWENDS_STATIC_IDENTITIES")
                .map(|raw| parse_identities(&raw))
                .transpose()?
                .unwrap_or_default(),
            admins: get("FWENDS_ADMINS")
                .map(|raw| split_list(&raw).map(str::to_string).collect())
                .unwrap_or_default(),
            retry_max_attempts: parse_var(
                &get,
                "FWENDS_RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            )?,
            prune_concurrency: parse_var(
                &get,
                "FWENDS_PRUNE_CONCURRENCY",
                defaults.prune_concurrency,
            )?,
        })
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                ..RetryPolicy::default()
            },
            prune_concurrency: self.prune_concurrency,
        }
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            id_size: self.session_id_size,
            ttl: self.session_ttl,
            key_prefix: self.session_prefix.clone(),
        }
    }

    /// Connection pool settings derived from this configuration.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            ..PoolSettings::default()
        }
    }
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: format!("{raw:?}: {e}"),
    })
}

fn parse_var<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => parse_value(var, &raw),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("{raw:?} is not a boolean"),
        }),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_identities(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    split_list(raw)
        .map(|entry| match entry.split_once('=') {
            Some((token, email)) if !token.is_empty() && !email.is_empty() => {
                Ok((token.to_string(), email.to_string()))
            }
            // never echo the entry, it holds a token
            _ => Err(ConfigError::Invalid {
                var: "FWENDS_STATIC_IDENTITIES",
                reason: "expected comma-separated token=email pairs".to_string(),
            }),
        })
        .collect()
}
