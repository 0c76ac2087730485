//! Errors from the catalog, blob store and session cache.

use fwends_core::{PackId, ValidationError};

/// SQLSTATE for `serialization_failure`.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for `deadlock_detected`.
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The transaction lost a serializable-isolation conflict and may be
    /// retried from the beginning.
    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    /// The target pack does not exist (or vanished inside the transaction).
    #[error("pack {0} not found")]
    PackNotFound(PackId),

    /// A scoped delete matched no slot rows.
    #[error("no resources found")]
    NoResources,

    /// A statement affected an unexpected number of rows.
    #[error("inconsistent row count: {0}")]
    Inconsistent(String),

    /// A stored value failed domain validation on read.
    #[error("corrupt row: {0}")]
    Corrupt(#[from] ValidationError),

    /// Relational store failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Failure from a blob or cache backend.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the filesystem blob backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob metadata could not be encoded or decoded.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the surrounding transaction should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SerializationFailure(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if matches!(
                db.code().as_deref(),
                Some(SQLSTATE_SERIALIZATION_FAILURE) | Some(SQLSTATE_DEADLOCK_DETECTED)
            ) {
                return Self::SerializationFailure(db.message().to_string());
            }
        }
        Self::Database(err)
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
