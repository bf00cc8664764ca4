//! Composite chunk store: bundle base, disk overlay.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bundle::{Bundle, ManifestOverrides};

use super::{
    BundleStore, Chunk, ChunkSource, ChunkStore, FsStore, StorageError, StorageKey,
};

/// Layers an immutable [`BundleStore`] under a mutable [`FsStore`].
///
/// Reads prefer the disk overlay (it reflects every write since the bundle
/// was created); writes go to disk only. Write failures are logged and
/// swallowed — the replication engine treats this store as an
/// eventually-consistent cache and retries at a higher layer, so degrading
/// a write beats crashing a read path.
#[derive(Debug, Clone)]
pub struct CompositeStore {
    bundle: BundleStore,
    disk: FsStore,
}

impl CompositeStore {
    pub fn new(bundle: BundleStore, disk: FsStore) -> Self {
        Self { bundle, disk }
    }

    pub fn bundle(&self) -> &BundleStore {
        &self.bundle
    }

    pub fn disk(&self) -> &FsStore {
        &self.disk
    }

    pub fn root_id(&self) -> Result<String, StorageError> {
        self.bundle.root_id()
    }

    pub fn slim_bundle(
        &self,
        overrides: Option<ManifestOverrides>,
    ) -> Result<Bundle, StorageError> {
        self.bundle.slim_bundle(overrides)
    }
}

#[async_trait]
impl ChunkSource for CompositeStore {
    async fn load(&self, key: &StorageKey) -> Result<Option<Bytes>, StorageError> {
        if let Some(data) = self.disk.load(key).await? {
            return Ok(Some(data));
        }
        self.bundle.load(key).await
    }

    /// Query both layers and merge by key, disk entries applied last.
    async fn load_range(&self, prefix: &StorageKey) -> Result<Vec<Chunk>, StorageError> {
        let mut merged: BTreeMap<StorageKey, Chunk> = BTreeMap::new();
        for chunk in self.bundle.load_range(prefix).await? {
            merged.insert(chunk.key.clone(), chunk);
        }
        for chunk in self.disk.load_range(prefix).await? {
            merged.insert(chunk.key.clone(), chunk);
        }
        Ok(merged.into_values().collect())
    }
}

#[async_trait]
impl ChunkStore for CompositeStore {
    async fn save(&self, key: &StorageKey, data: Bytes) -> Result<(), StorageError> {
        if let Err(e) = self.disk.save(key, data).await {
            tracing::warn!(key = %key, error = %e, "chunk save failed, dropping write");
        }
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError> {
        if let Err(e) = self.disk.remove(key).await {
            tracing::warn!(key = %key, error = %e, "chunk remove failed, ignoring");
        }
        Ok(())
    }

    async fn remove_range(&self, prefix: &StorageKey) -> Result<(), StorageError> {
        if let Err(e) = self.disk.remove_range(prefix).await {
            tracing::warn!(prefix = %prefix, error = %e, "range remove failed, ignoring");
        }
        Ok(())
    }
}
