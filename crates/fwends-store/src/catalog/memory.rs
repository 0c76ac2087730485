//! In-memory pack catalog.
//!
//! Every method takes one lock for its whole body, so each call is trivially
//! serializable. Conflicts can be injected to exercise the caller's retry
//! loop.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use fwends_core::{PackDigest, PackHasher, PackId, PackTitle, ResourceId, SlotKey};
use parking_lot::Mutex;

use super::{PackCatalog, PackContents, PackSummary, SlotEntry, SlotScope};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct PackRow {
    title: String,
    hash: PackDigest,
}

#[derive(Debug, Default)]
struct Inner {
    packs: BTreeMap<PackId, PackRow>,
    // SlotKey orders by (pack, role, string, class).
    slots: BTreeMap<SlotKey, ResourceId>,
    resources: BTreeSet<ResourceId>,
    pruned: BTreeSet<ResourceId>,
    admins: BTreeSet<String>,
    pending_conflicts: usize,
    conflicts_raised: usize,
}

impl Inner {
    fn take_conflict(&mut self) -> StoreResult<()> {
        if self.pending_conflicts > 0 {
            self.pending_conflicts -= 1;
            self.conflicts_raised += 1;
            return Err(StoreError::SerializationFailure(
                "could not serialize access due to concurrent update".into(),
            ));
        }
        Ok(())
    }

    fn pack_slots(&self, pack: PackId) -> impl Iterator<Item = (&SlotKey, &ResourceId)> + '_ {
        self.slots
            .range(SlotKey::first_in(pack)..)
            .take_while(move |(k, _)| k.pack == pack)
    }

    fn rehash(&mut self, pack: PackId) {
        let mut hasher = PackHasher::new();
        for (key, _) in self.pack_slots(pack) {
            hasher.push(key.role.as_str(), key.string.as_str());
        }
        let digest = hasher.finish();
        if let Some(row) = self.packs.get_mut(&pack) {
            row.hash = digest;
        }
    }
}

/// Catalog backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: Mutex<Inner>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an email to the admin allow-list.
    pub fn add_admin(&self, email: impl Into<String>) {
        self.inner.lock().admins.insert(email.into());
    }

    /// Make the next `n` serializable transactions fail with a
    /// serialization failure before touching any state.
    pub fn inject_conflicts(&self, n: usize) {
        self.inner.lock().pending_conflicts += n;
    }

    /// Number of injected conflicts that have been raised so far.
    pub fn conflicts_raised(&self) -> usize {
        self.inner.lock().conflicts_raised
    }

    /// Ids in the live marker table.
    pub fn recorded_resources(&self) -> Vec<ResourceId> {
        self.inner.lock().resources.iter().copied().collect()
    }

    /// Ids in the pruned marker table.
    pub fn pruned_resources(&self) -> Vec<ResourceId> {
        self.inner.lock().pruned.iter().copied().collect()
    }

    /// Seed the pruned marker table directly, as if a previous process
    /// crashed between the marker move and the blob delete.
    pub fn seed_pruned(&self, id: ResourceId) {
        self.inner.lock().pruned.insert(id);
    }
}

#[async_trait]
impl PackCatalog for MemoryCatalog {
    async fn create_pack(&self, id: PackId, title: &PackTitle) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.packs.contains_key(&id) {
            return Err(StoreError::Inconsistent(format!("pack {id} already exists")));
        }
        inner.packs.insert(
            id,
            PackRow {
                title: title.as_str().to_string(),
                hash: PackDigest::EMPTY,
            },
        );
        Ok(())
    }

    async fn rename_pack(&self, id: PackId, title: &PackTitle) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        match inner.packs.get_mut(&id) {
            Some(row) => {
                row.title = title.as_str().to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_packs(&self) -> StoreResult<Vec<PackSummary>> {
        let inner = self.inner.lock();
        let summaries = inner
            .packs
            .iter()
            .map(|(id, row)| {
                let mut roles = BTreeSet::new();
                let mut pairs = BTreeSet::new();
                for (key, _) in inner.pack_slots(*id) {
                    roles.insert(key.role.as_str());
                    pairs.insert((key.role.as_str(), key.string.as_str()));
                }
                PackSummary {
                    id: *id,
                    title: row.title.clone(),
                    hash: row.hash,
                    role_count: roles.len() as i64,
                    string_count: pairs.len() as i64,
                }
            })
            .collect();
        Ok(summaries)
    }

    async fn load_pack(&self, id: PackId) -> StoreResult<Option<PackContents>> {
        let inner = self.inner.lock();
        let Some(row) = inner.packs.get(&id) else {
            return Ok(None);
        };
        let slots = inner
            .pack_slots(id)
            .map(|(key, resource)| SlotEntry {
                role: key.role.clone(),
                string: key.string.clone(),
                class: key.class,
                resource: *resource,
            })
            .collect();
        Ok(Some(PackContents {
            title: row.title.clone(),
            hash: row.hash,
            slots,
        }))
    }

    async fn pack_exists(&self, id: PackId) -> StoreResult<bool> {
        Ok(self.inner.lock().packs.contains_key(&id))
    }

    async fn slot_resource(&self, key: &SlotKey) -> StoreResult<Option<ResourceId>> {
        Ok(self.inner.lock().slots.get(key).copied())
    }

    async fn record_resource(&self, id: ResourceId) -> StoreResult<()> {
        if !self.inner.lock().resources.insert(id) {
            return Err(StoreError::Inconsistent(format!(
                "resource {id} already recorded"
            )));
        }
        Ok(())
    }

    async fn swap_slot(&self, key: &SlotKey, resource: ResourceId) -> StoreResult<Option<ResourceId>> {
        let mut inner = self.inner.lock();
        inner.take_conflict()?;
        if !inner.packs.contains_key(&key.pack) {
            return Err(StoreError::PackNotFound(key.pack));
        }
        let pair_present = inner
            .pack_slots(key.pack)
            .any(|(k, _)| k.role == key.role && k.string == key.string);
        let previous = inner.slots.insert(key.clone(), resource);
        if !pair_present {
            inner.rehash(key.pack);
        }
        Ok(previous)
    }

    async fn remove_slots(&self, pack: PackId, scope: &SlotScope) -> StoreResult<Vec<SlotEntry>> {
        let mut inner = self.inner.lock();
        inner.take_conflict()?;
        if matches!(scope, SlotScope::Pack) && !inner.packs.contains_key(&pack) {
            return Err(StoreError::PackNotFound(pack));
        }
        let matching: Vec<SlotKey> = inner
            .pack_slots(pack)
            .map(|(k, _)| k)
            .filter(|k| match scope {
                SlotScope::Pack => true,
                SlotScope::Role(role) => &k.role == role,
                SlotScope::Pair(role, string) => &k.role == role && &k.string == string,
            })
            .cloned()
            .collect();
        if matching.is_empty() && !matches!(scope, SlotScope::Pack) {
            return Err(StoreError::NoResources);
        }
        let mut removed = Vec::with_capacity(matching.len());
        for key in matching {
            if let Some(resource) = inner.slots.remove(&key) {
                removed.push(SlotEntry {
                    role: key.role,
                    string: key.string,
                    class: key.class,
                    resource,
                });
            }
        }
        match scope {
            SlotScope::Pack => {
                inner.packs.remove(&pack);
            }
            _ => inner.rehash(pack),
        }
        Ok(removed)
    }

    async fn mark_pruned(&self, id: ResourceId) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        inner.take_conflict()?;
        if !inner.resources.remove(&id) {
            return Ok(false);
        }
        inner.pruned.insert(id);
        Ok(true)
    }

    async fn forget_pruned(&self, id: ResourceId) -> StoreResult<()> {
        self.inner.lock().pruned.remove(&id);
        Ok(())
    }

    async fn pruned_backlog(&self) -> StoreResult<Vec<ResourceId>> {
        Ok(self.inner.lock().pruned.iter().copied().collect())
    }

    async fn is_admin(&self, email: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().admins.contains(email))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwends_core::{pack_digest, ResourceClass, RoleId, StringId};

    fn pack(n: i64) -> PackId {
        PackId::new(n).unwrap()
    }

    fn res(n: i64) -> ResourceId {
        ResourceId::new(n).unwrap()
    }

    fn key(p: i64, role: &str, string: &str, class: ResourceClass) -> SlotKey {
        SlotKey {
            pack: pack(p),
            role: RoleId::new(role).unwrap(),
            string: StringId::new(string).unwrap(),
            class,
        }
    }

    async fn catalog_with_pack() -> MemoryCatalog {
        let cat = MemoryCatalog::new();
        cat.create_pack(pack(1), &PackTitle::new("Test Pack").unwrap())
            .await
            .unwrap();
        cat
    }

    async fn stored_hash(cat: &MemoryCatalog, p: i64) -> PackDigest {
        cat.load_pack(pack(p)).await.unwrap().unwrap().hash
    }

    #[tokio::test]
    async fn new_pack_has_empty_digest() {
        let cat = catalog_with_pack().await;
        assert_eq!(stored_hash(&cat, 1).await, PackDigest::EMPTY);
    }

    #[tokio::test]
    async fn swap_inserts_then_updates_in_place() {
        let cat = catalog_with_pack().await;
        let k = key(1, "greeting", "hello", ResourceClass::Image);

        assert_eq!(cat.swap_slot(&k, res(10)).await.unwrap(), None);
        let after_insert = stored_hash(&cat, 1).await;
        assert_eq!(after_insert, pack_digest([("greeting", "hello")]));

        assert_eq!(cat.swap_slot(&k, res(11)).await.unwrap(), Some(res(10)));
        assert_eq!(cat.slot_resource(&k).await.unwrap(), Some(res(11)));
        assert_eq!(stored_hash(&cat, 1).await, after_insert);
    }

    #[tokio::test]
    async fn second_class_for_pair_keeps_digest() {
        let cat = catalog_with_pack().await;
        cat.swap_slot(&key(1, "greeting", "hello", ResourceClass::Image), res(1))
            .await
            .unwrap();
        let before = stored_hash(&cat, 1).await;
        cat.swap_slot(&key(1, "greeting", "hello", ResourceClass::Audio), res(2))
            .await
            .unwrap();
        assert_eq!(stored_hash(&cat, 1).await, before);
    }

    #[tokio::test]
    async fn swap_on_missing_pack_is_not_found() {
        let cat = MemoryCatalog::new();
        let err = cat
            .swap_slot(&key(9, "a", "b", ResourceClass::Audio), res(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PackNotFound(p) if p == pack(9)));
    }

    #[tokio::test]
    async fn injected_conflicts_leave_state_untouched() {
        let cat = catalog_with_pack().await;
        let k = key(1, "greeting", "hello", ResourceClass::Image);
        cat.inject_conflicts(2);
        assert!(cat.swap_slot(&k, res(1)).await.unwrap_err().is_retryable());
        assert!(cat.swap_slot(&k, res(1)).await.unwrap_err().is_retryable());
        assert_eq!(cat.slot_resource(&k).await.unwrap(), None);
        assert_eq!(cat.swap_slot(&k, res(1)).await.unwrap(), None);
        assert_eq!(cat.conflicts_raised(), 2);
    }

    #[tokio::test]
    async fn pair_delete_reverts_digest() {
        let cat = catalog_with_pack().await;
        cat.swap_slot(&key(1, "greeting", "hello", ResourceClass::Image), res(1))
            .await
            .unwrap();
        cat.swap_slot(&key(1, "greeting", "hello", ResourceClass::Audio), res(2))
            .await
            .unwrap();
        let removed = cat
            .remove_slots(
                pack(1),
                &SlotScope::Pair(RoleId::new("greeting").unwrap(), StringId::new("hello").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(stored_hash(&cat, 1).await, PackDigest::EMPTY);
    }

    #[tokio::test]
    async fn role_delete_without_match_is_no_resources() {
        let cat = catalog_with_pack().await;
        let err = cat
            .remove_slots(pack(1), &SlotScope::Role(RoleId::new("missing").unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoResources));
    }

    #[tokio::test]
    async fn pack_delete_tolerates_empty_and_rejects_missing() {
        let cat = catalog_with_pack().await;
        assert!(cat.remove_slots(pack(1), &SlotScope::Pack).await.unwrap().is_empty());
        assert!(!cat.pack_exists(pack(1)).await.unwrap());
        let err = cat.remove_slots(pack(1), &SlotScope::Pack).await.unwrap_err();
        assert!(matches!(err, StoreError::PackNotFound(_)));
    }

    #[tokio::test]
    async fn listing_counts_distinct_roles_and_pairs() {
        let cat = catalog_with_pack().await;
        cat.swap_slot(&key(1, "a", "x", ResourceClass::Image), res(1)).await.unwrap();
        cat.swap_slot(&key(1, "a", "x", ResourceClass::Audio), res(2)).await.unwrap();
        cat.swap_slot(&key(1, "a", "y", ResourceClass::Image), res(3)).await.unwrap();
        cat.swap_slot(&key(1, "b", "x", ResourceClass::Image), res(4)).await.unwrap();
        let list = cat.list_packs().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].role_count, 2);
        assert_eq!(list[0].string_count, 3);
        assert_eq!(list[0].hash, pack_digest([("a", "x"), ("a", "y"), ("b", "x")]));
    }

    #[tokio::test]
    async fn marker_tables_move_once() {
        let cat = MemoryCatalog::new();
        cat.record_resource(res(5)).await.unwrap();
        assert!(cat.mark_pruned(res(5)).await.unwrap());
        assert!(!cat.mark_pruned(res(5)).await.unwrap());
        assert_eq!(cat.pruned_backlog().await.unwrap(), vec![res(5)]);
        cat.forget_pruned(res(5)).await.unwrap();
        cat.forget_pruned(res(5)).await.unwrap();
        assert!(cat.pruned_backlog().await.unwrap().is_empty());
        assert!(cat.recorded_resources().is_empty());
    }

    #[tokio::test]
    async fn neighbouring_packs_stay_separate() {
        let cat = MemoryCatalog::new();
        for p in [1, 2, 3] {
            cat.create_pack(pack(p), &PackTitle::new("Pack").unwrap())
                .await
                .unwrap();
        }
        cat.swap_slot(&key(1, "zz", "z", ResourceClass::Audio), res(10)).await.unwrap();
        cat.swap_slot(&key(2, "0", "0", ResourceClass::Image), res(20)).await.unwrap();
        cat.swap_slot(&key(2, "hero", "hi", ResourceClass::Audio), res(21)).await.unwrap();
        cat.swap_slot(&key(3, "0", "0", ResourceClass::Image), res(30)).await.unwrap();

        let contents = cat.load_pack(pack(2)).await.unwrap().unwrap();
        let held: Vec<_> = contents.slots.iter().map(|s| s.resource).collect();
        assert_eq!(held, vec![res(20), res(21)]);
        assert_eq!(contents.hash, pack_digest([("0", "0"), ("hero", "hi")]));

        let removed = cat.remove_slots(pack(2), &SlotScope::Pack).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(stored_hash(&cat, 1).await, pack_digest([("zz", "z")]));
        assert_eq!(stored_hash(&cat, 3).await, pack_digest([("0", "0")]));
    }
}
