//! Engine error taxonomy.
//!
//! Serialization conflicts never appear here: the retry loop absorbs them,
//! and running out of attempts is reported as [`EngineError::Internal`].

use fwends_core::ValidationError;
use fwends_store::StoreError;

use crate::lifecycle::TransitionError;

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad identifier, empty title, or unsupported content type.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing pack, role, string or slot.
    #[error("{0}")]
    NotFound(String),

    /// Session or identity check failed.
    #[error("{0}")]
    Unauthorized(String),

    /// Store failure, inconsistent row count, id collision, or retries
    /// exhausted.
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PackNotFound(id) => Self::NotFound(format!("pack {id} not found")),
            StoreError::NoResources => Self::NotFound("no resources found".into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(err: TransitionError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("store task failed: {err}"))
    }
}
