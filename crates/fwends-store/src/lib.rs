//! # fwends-store: Storage Seams
//!
//! The three external collaborators of the pack lifecycle engine, each as an
//! async trait with pluggable backends:
//!
//! | Seam | Backends |
//! |---|---|
//! | [`PackCatalog`] | [`PgCatalog`] (PostgreSQL via SQLx), [`MemoryCatalog`] |
//! | [`BlobStore`] | [`FsBlobStore`], [`MemoryBlobStore`] |
//! | [`SessionCache`] | [`MemorySessionCache`] |
//!
//! The in-memory backends support failure injection so the engine's retry
//! and pruning paths can be driven deterministically in tests.

pub mod blob;
pub mod catalog;
pub mod error;
pub mod session;

pub use blob::{Blob, BlobStore, FsBlobStore, MemoryBlobStore};
pub use catalog::postgres::{init_pool, PoolSettings};
pub use catalog::{
    MemoryCatalog, PackCatalog, PackContents, PackSummary, PgCatalog, SlotEntry, SlotScope,
};
pub use error::{StoreError, StoreResult};
pub use session::{MemorySessionCache, SessionCache};
