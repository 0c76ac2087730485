//! Pack CRUD and the media read path.

use fwends_core::{
    PackDigest, PackId, PackTitle, ResourceClass, ResourceId, RoleId, SlotKey, StringId,
};
use fwends_store::{Blob, PackSummary, SlotEntry};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::EngineError;

/// Result of creating a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPack {
    /// The minted pack id.
    pub id: PackId,
    /// Initial content hash (always the empty digest).
    pub hash: PackDigest,
}

/// One string of a role, with whichever classes it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringView {
    /// String id.
    pub id: StringId,
    /// Image resource, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ResourceId>,
    /// Audio resource, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<ResourceId>,
}

/// One role of a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleView {
    /// Role id.
    pub id: RoleId,
    /// Strings ordered by id.
    pub strings: Vec<StringView>,
}

/// A pack as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackView {
    /// Pack title.
    pub title: String,
    /// Content hash.
    pub hash: PackDigest,
    /// Roles ordered by id.
    pub roles: Vec<RoleView>,
}

impl PackView {
    /// Group ordered slot rows into roles and strings.
    fn from_slots(title: String, hash: PackDigest, slots: Vec<SlotEntry>) -> Self {
        let mut roles: Vec<RoleView> = Vec::new();
        for slot in slots {
            if roles.last().map(|r| &r.id) != Some(&slot.role) {
                roles.push(RoleView {
                    id: slot.role.clone(),
                    strings: Vec::new(),
                });
            }
            let Some(role) = roles.last_mut() else {
                continue;
            };
            if role.strings.last().map(|s| &s.id) != Some(&slot.string) {
                role.strings.push(StringView {
                    id: slot.string.clone(),
                    image: None,
                    audio: None,
                });
            }
            if let Some(string) = role.strings.last_mut() {
                match slot.class {
                    ResourceClass::Image => string.image = Some(slot.resource),
                    ResourceClass::Audio => string.audio = Some(slot.resource),
                }
            }
        }
        Self { title, hash, roles }
    }
}

impl Engine {
    /// Create a pack with a non-empty title.
    pub async fn create_pack(&self, title: &str) -> Result<CreatedPack, EngineError> {
        let title = PackTitle::new(title)?;
        let id = self.ids.next_pack_id();
        self.catalog.create_pack(id, &title).await?;
        tracing::info!(pack_id = %id, "pack created");
        Ok(CreatedPack {
            id,
            hash: PackDigest::EMPTY,
        })
    }

    /// Change a pack's title.
    pub async fn rename_pack(&self, id: PackId, title: &str) -> Result<(), EngineError> {
        let title = PackTitle::new(title)?;
        if !self.catalog.rename_pack(id, &title).await? {
            return Err(EngineError::NotFound(format!("pack {id} not found")));
        }
        Ok(())
    }

    /// Summaries of all packs.
    pub async fn list_packs(&self) -> Result<Vec<PackSummary>, EngineError> {
        Ok(self.catalog.list_packs().await?)
    }

    /// A pack's title, hash and slot tree.
    pub async fn get_pack(&self, id: PackId) -> Result<PackView, EngineError> {
        let contents = self
            .catalog
            .load_pack(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("pack {id} not found")))?;
        Ok(PackView::from_slots(
            contents.title,
            contents.hash,
            contents.slots,
        ))
    }

    /// The blob currently held by a slot.
    pub async fn read_media(
        &self,
        pack: PackId,
        role: &str,
        string: &str,
        class: &str,
    ) -> Result<Blob, EngineError> {
        let key = SlotKey {
            pack,
            role: RoleId::new(role)?,
            string: StringId::new(string)?,
            class: class.parse()?,
        };
        let resource = self
            .catalog
            .slot_resource(&key)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("slot {key} is empty")))?;
        self.blobs.get(resource).await?.ok_or_else(|| {
            tracing::warn!(resource_id = %resource, slot = %key, "slot references missing blob");
            EngineError::NotFound(format!("resource {resource} not found"))
        })
    }
}
