//! Bundle-backed chunk source.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bundle::{Bundle, ManifestOverrides, STORAGE_PREFIX};

use super::{Chunk, ChunkSource, StorageError, StorageKey};

/// Read-only chunk source over a parsed bundle's `storage/` namespace.
///
/// This is the bootstrap layer: a fresh client seeds from a (slim) bundle
/// and immediately upgrades to live replication for everything newer. It
/// implements [`ChunkSource`] only — the type system carries the
/// "never written" guarantee.
#[derive(Debug, Clone)]
pub struct BundleStore {
    bundle: Arc<Bundle>,
}

impl BundleStore {
    pub fn new(bundle: Bundle) -> Self {
        Self {
            bundle: Arc::new(bundle),
        }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// The manifest's root id, the partition this store bootstraps.
    pub fn root_id(&self) -> Result<String, StorageError> {
        self.bundle
            .root_id()
            .map(str::to_string)
            .ok_or(StorageError::MissingRootId)
    }

    /// Derive the minimal bootstrap bundle for this store's root document.
    pub fn slim_bundle(
        &self,
        overrides: Option<ManifestOverrides>,
    ) -> Result<Bundle, StorageError> {
        let root_id = self.root_id()?;
        Ok(self.bundle.slim(&root_id, overrides)?)
    }

    /// Keys of every chunk entry in the bundle.
    fn keys(&self) -> Vec<StorageKey> {
        self.bundle
            .container()
            .paths()
            .filter_map(|path| {
                let relative = path.strip_prefix(STORAGE_PREFIX)?;
                StorageKey::from_shard_segments(relative.split('/'))
            })
            .collect()
    }
}

#[async_trait]
impl ChunkSource for BundleStore {
    async fn load(&self, key: &StorageKey) -> Result<Option<Bytes>, StorageError> {
        Ok(self.bundle.container().get(&key.storage_path()).await?)
    }

    async fn load_range(&self, prefix: &StorageKey) -> Result<Vec<Chunk>, StorageError> {
        let mut chunks = Vec::new();
        for key in self.keys() {
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(data) = self.load(&key).await? {
                chunks.push(Chunk { key, data });
            }
        }
        chunks.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleOptions;

    async fn seeded() -> BundleStore {
        let mut bundle = Bundle::new(BundleOptions::default());
        bundle.set_root_id("ab12cd");
        for (key, data) in [
            (&["ab12cd", "snapshot"][..], "root"),
            (&["ab12cd", "incremental", "1"][..], "delta"),
            (&["ff00aa", "snapshot"][..], "other"),
        ] {
            let key = StorageKey::new(key.iter().copied()).unwrap();
            bundle.put_chunk(&key, Bytes::from(data)).await.unwrap();
        }
        BundleStore::new(bundle)
    }

    #[tokio::test]
    async fn test_load_maps_to_storage_namespace() {
        let store = seeded().await;
        let key = StorageKey::new(["ab12cd", "snapshot"]).unwrap();
        assert_eq!(store.load(&key).await.unwrap().unwrap().as_ref(), b"root");

        let missing = StorageKey::new(["ab12cd", "nope"]).unwrap();
        assert!(store.load(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_range_filters_by_key_prefix() {
        let store = seeded().await;
        let prefix = StorageKey::new(["ab12cd"]).unwrap();
        let chunks = store.load_range(&prefix).await.unwrap();
        let keys: Vec<String> = chunks.iter().map(|c| c.key.to_string()).collect();
        assert_eq!(keys, ["ab12cd/incremental/1", "ab12cd/snapshot"]);
    }

    #[tokio::test]
    async fn test_root_id_required() {
        let store = seeded().await;
        assert_eq!(store.root_id().unwrap(), "ab12cd");

        let bare = BundleStore::new(Bundle::new(BundleOptions::default()));
        assert!(matches!(bare.root_id(), Err(StorageError::MissingRootId)));
    }

    #[tokio::test]
    async fn test_slim_bundle_delegates_to_root_shard() {
        let store = seeded().await;
        let slim = store.slim_bundle(None).unwrap();
        let paths: Vec<&str> = slim.container().paths().collect();
        assert_eq!(
            paths,
            ["storage/ab/12cd/incremental/1", "storage/ab/12cd/snapshot"]
        );
    }
}
