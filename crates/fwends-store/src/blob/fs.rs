//! Filesystem-backed blob store.
//!
//! Each object is written as `{root}/{id}` with a JSON sidecar
//! `{root}/{id}.meta.json` carrying the content type. Writes go to a
//! temporary file first and are renamed into place, so a reader never sees
//! a partial payload.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fwends_core::ResourceId;
use serde::{Deserialize, Serialize};

use super::{Blob, BlobStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Serialize, Deserialize)]
struct BlobMeta {
    content_type: String,
    size: u64,
}

/// Blob store rooted at a local directory.
///
/// `FsBlobStore` is `Clone` and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: Arc<PathBuf>,
}

impl FsBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, id: ResourceId) -> PathBuf {
        self.root.join(id.object_key())
    }

    fn meta_path(&self, id: ResourceId) -> PathBuf {
        self.root.join(format!("{}.meta.json", id.object_key()))
    }

    fn write_atomic(target: &Path, contents: &[u8]) -> StoreResult<()> {
        let mut tmp = target.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, target)?;
        Ok(())
    }

    fn remove_if_present(path: &Path) -> StoreResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn put_sync(&self, id: ResourceId, blob: &Blob) -> StoreResult<()> {
        let meta = BlobMeta {
            content_type: blob.content_type.clone(),
            size: blob.bytes.len() as u64,
        };
        Self::write_atomic(&self.data_path(id), &blob.bytes)?;
        Self::write_atomic(&self.meta_path(id), &serde_json::to_vec(&meta)?)?;
        Ok(())
    }

    fn get_sync(&self, id: ResourceId) -> StoreResult<Option<Blob>> {
        let data = match fs::read(self.data_path(id)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match fs::read(self.meta_path(id)) {
            Ok(raw) => serde_json::from_slice::<BlobMeta>(&raw)?.content_type,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(resource_id = %id, "blob has no metadata sidecar");
                "application/octet-stream".to_string()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Blob {
            content_type,
            bytes: Bytes::from(data),
        }))
    }

    fn delete_sync(&self, id: ResourceId) -> StoreResult<()> {
        Self::remove_if_present(&self.data_path(id))?;
        Self::remove_if_present(&self.meta_path(id))
    }
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Unavailable(format!("blob task join error: {e}")))?
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, id: ResourceId, blob: Blob) -> StoreResult<()> {
        let store = self.clone();
        blocking(move || store.put_sync(id, &blob)).await
    }

    async fn get(&self, id: ResourceId) -> StoreResult<Option<Blob>> {
        let store = self.clone();
        blocking(move || store.get_sync(id)).await
    }

    async fn delete(&self, id: ResourceId) -> StoreResult<()> {
        let store = self.clone();
        blocking(move || store.delete_sync(id)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        let store = self.clone();
        blocking(move || {
            let meta = fs::metadata(store.root())?;
            if meta.is_dir() {
                Ok(())
            } else {
                Err(StoreError::Unavailable(format!(
                    "{} is not a directory",
                    store.root().display()
                )))
            }
        })
        .await
    }
}
