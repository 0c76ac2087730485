//! # Pack Catalog
//!
//! The relational source of truth: packs, their resource slots, and the two
//! marker tables that track which resource ids may still own a blob.
//!
//! Each mutating method is one transaction attempt. Methods documented as
//! serializable may fail with [`StoreError::SerializationFailure`]; the
//! caller owns the retry loop.
//!
//! [`StoreError::SerializationFailure`]: crate::StoreError::SerializationFailure

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use fwends_core::{PackDigest, PackId, PackTitle, ResourceClass, ResourceId, RoleId, SlotKey, StringId};
use serde::Serialize;

use crate::error::StoreResult;

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

/// One row of the pack listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackSummary {
    /// Pack id.
    pub id: PackId,
    /// Pack title.
    pub title: String,
    /// Current content hash.
    pub hash: PackDigest,
    /// Number of distinct roles with at least one slot.
    pub role_count: i64,
    /// Number of distinct `(role, string)` pairs with at least one slot.
    pub string_count: i64,
}

/// A single occupied slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    /// Role coordinate.
    pub role: RoleId,
    /// String coordinate.
    pub string: StringId,
    /// Media class.
    pub class: ResourceClass,
    /// Resource currently held by the slot.
    pub resource: ResourceId,
}

/// A consistent snapshot of one pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackContents {
    /// Pack title.
    pub title: String,
    /// Content hash at the snapshot.
    pub hash: PackDigest,
    /// Slots ordered by `(role, string, class)`.
    pub slots: Vec<SlotEntry>,
}

/// How much of a slot key a delete pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotScope {
    /// Every slot of the pack, and the pack row itself.
    Pack,
    /// Every slot under one role.
    Role(RoleId),
    /// Every class under one `(role, string)` pair.
    Pair(RoleId, StringId),
}

/// Relational metadata store.
#[async_trait]
pub trait PackCatalog: Send + Sync + 'static {
    /// Insert a new pack with the empty digest.
    async fn create_pack(&self, id: PackId, title: &PackTitle) -> StoreResult<()>;

    /// Change a pack's title. Returns `false` if the pack does not exist.
    async fn rename_pack(&self, id: PackId, title: &PackTitle) -> StoreResult<bool>;

    /// Summaries of every pack, ordered by id.
    async fn list_packs(&self) -> StoreResult<Vec<PackSummary>>;

    /// Read title, digest and slots in one repeatable-read snapshot.
    async fn load_pack(&self, id: PackId) -> StoreResult<Option<PackContents>>;

    /// Read-only existence check.
    async fn pack_exists(&self, id: PackId) -> StoreResult<bool>;

    /// Resource currently held by a slot.
    async fn slot_resource(&self, key: &SlotKey) -> StoreResult<Option<ResourceId>>;

    /// Insert the "may exist in the object store" marker for a resource.
    /// Runs outside any slot transaction.
    async fn record_resource(&self, id: ResourceId) -> StoreResult<()>;

    /// Point a slot at `resource` in one serializable transaction.
    ///
    /// Updates the row in place when the slot exists, inserts it otherwise.
    /// When the `(role, string)` pair had no slot of any class, the pack
    /// digest is recomputed in the same transaction. Returns the resource the
    /// slot held before, if any.
    ///
    /// Fails with `PackNotFound` if the pack is gone at transaction time.
    async fn swap_slot(&self, key: &SlotKey, resource: ResourceId) -> StoreResult<Option<ResourceId>>;

    /// Delete the slots matching `scope` in one serializable transaction,
    /// returning what was removed.
    ///
    /// [`SlotScope::Pack`] also deletes the pack row (zero slots is fine; a
    /// missing pack is `PackNotFound`). The narrower scopes fail with
    /// `NoResources` when nothing matched and otherwise recompute the digest.
    async fn remove_slots(&self, pack: PackId, scope: &SlotScope) -> StoreResult<Vec<SlotEntry>>;

    /// Move a resource from the live marker table to the pruned marker table.
    /// Returns `false` if it was not in the live table.
    async fn mark_pruned(&self, id: ResourceId) -> StoreResult<bool>;

    /// Drop the pruned marker once the blob is gone. Absent rows are fine.
    async fn forget_pruned(&self, id: ResourceId) -> StoreResult<()>;

    /// Ids still in the pruned marker table.
    async fn pruned_backlog(&self) -> StoreResult<Vec<ResourceId>>;

    /// Whether the email is on the admin allow-list.
    async fn is_admin(&self, email: &str) -> StoreResult<bool>;

    /// Connectivity probe.
    async fn ping(&self) -> StoreResult<()>;
}
