#![deny(missing_docs)]

//! # fwends-core: Foundational Types for fwends
//!
//! A pack is a titled collection of media resources addressed by a
//! `(role, string)` coordinate pair. This crate holds the pieces of that model
//! that need no I/O: identifiers, the slot naming rules, the content-type
//! table, the Snowflake id generator, and the pack content hash.
//!
//! ## Design Principles
//!
//! 1. **Newtypes validated at construction.** A [`RoleId`] or [`StringId`]
//!    that exists has already matched `^[a-z0-9_]{1,63}$`; nothing downstream
//!    re-checks it.
//!
//! 2. **One hash algorithm.** [`PackHasher`] is the only way a [`PackDigest`]
//!    is produced, whether the caller is the in-memory catalog, the Postgres
//!    catalog, or a test re-deriving the digest.
//!
//! 3. **Numeric ids travel as strings.** [`PackId`] and [`ResourceId`]
//!    serialize as decimal strings so 63-bit values survive clients that only
//!    have double-precision numbers.

pub mod digest;
pub mod error;
pub mod identity;
pub mod resource;
pub mod snowflake;

pub use digest::{pack_digest, PackDigest, PackHasher};
pub use error::{SnowflakeError, ValidationError};
pub use identity::{PackId, PackTitle, ResourceId, RoleId, SlotKey, StringId};
pub use resource::ResourceClass;
pub use snowflake::{machine_index_from_hostname, SnowflakeGenerator};
