//! # Error Types
//!
//! Validation failures for domain newtypes and construction failures for the
//! Snowflake generator. Both carry the offending input so that a 4xx response
//! or a startup log line says exactly what was rejected.

use thiserror::Error;

/// Validation errors for domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Role identifier does not match `^[a-z0-9_]{1,63}$`.
    #[error("invalid role id: \"{0}\" (expected 1-63 characters of a-z, 0-9 or _)")]
    InvalidRoleId(String),

    /// String identifier does not match `^[a-z0-9_]{1,63}$`.
    #[error("invalid string id: \"{0}\" (expected 1-63 characters of a-z, 0-9 or _)")]
    InvalidStringId(String),

    /// Pack id is not a non-negative 63-bit integer.
    #[error("invalid pack id: \"{0}\"")]
    InvalidPackId(String),

    /// Resource id is not a non-negative 63-bit integer.
    #[error("invalid resource id: \"{0}\"")]
    InvalidResourceId(String),

    /// Pack titles must contain at least one character.
    #[error("empty pack title is not allowed")]
    EmptyTitle,

    /// The content type is not in the image/audio table.
    #[error("unsupported pack resource content type: \"{0}\"")]
    UnsupportedContentType(String),

    /// Resource class name is neither `image` nor `audio`.
    #[error("unknown resource class: \"{0}\" (expected image or audio)")]
    UnknownResourceClass(String),

    /// A stored digest does not have the 32-byte SHA-256 length.
    #[error("invalid pack digest length: {0} bytes (expected 32)")]
    InvalidDigestLength(usize),
}

/// Errors raised while configuring a [`SnowflakeGenerator`](crate::SnowflakeGenerator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnowflakeError {
    /// The machine index does not fit in the machine bit field.
    #[error("snowflake machine index {index} out of range (must be < {limit})")]
    MachineIndexOutOfRange {
        /// The rejected index.
        index: u64,
        /// Exclusive upper bound.
        limit: u64,
    },

    /// The hostname does not carry a `<prefix>-<ordinal>` suffix.
    #[error("hostname \"{hostname}\" does not match \"{prefix}-<ordinal>\"")]
    HostnameMismatch {
        /// The hostname that was inspected.
        hostname: String,
        /// The expected prefix.
        prefix: String,
    },
}
