//! Bundle tier: whole-bundle persistence keyed by content root id.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{Result, TierError};
use crate::storage::{Storage, TierConfig};

/// Attempts per operation before a transient failure is surfaced.
const MAX_ATTEMPTS: u32 = 3;
/// First retry delay; doubles per attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Transient failures worth retrying: expired/failed authentication and
/// generic backend hiccups. Everything else surfaces immediately.
fn is_transient(error: &TierError) -> bool {
    matches!(
        error,
        TierError::Backend(
            object_store::Error::Unauthenticated { .. } | object_store::Error::Generic { .. }
        )
    )
}

/// Stores serialized bundles in object storage, addressed by root id.
///
/// Uploads overwrite by key; there is no versioning. The root id is derived
/// from a bundle's manifest by the caller — a tier never invents one.
#[derive(Debug, Clone)]
pub struct BundleTier {
    storage: Storage,
}

impl BundleTier {
    /// Create a tier from backend configuration.
    pub async fn new(config: TierConfig) -> Result<Self> {
        let storage = Storage::new(config).await?;
        Ok(Self { storage })
    }

    /// Fully ephemeral tier (in-memory backend). Useful for testing.
    pub async fn memory() -> Result<Self> {
        Self::new(TierConfig::Memory).await
    }

    /// Tier backed by a local directory.
    pub async fn local(path: &Path) -> Result<Self> {
        Self::new(TierConfig::Local {
            path: path.to_path_buf(),
        })
        .await
    }

    /// Persist bundle bytes under `root_id`, overwriting any previous
    /// upload for the same id.
    pub async fn upload(&self, root_id: &str, data: Bytes) -> Result<()> {
        let size = data.len();
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.storage.put(root_id, data.clone()).await {
                Ok(()) => {
                    info!(root_id = %root_id, size = size, "bundle uploaded");
                    return Ok(());
                }
                Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                    warn!(
                        root_id = %root_id,
                        attempt = attempt,
                        error = %e,
                        "bundle upload failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch the bundle stored under `root_id`.
    pub async fn download(&self, root_id: &str) -> Result<Bytes> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        let data = loop {
            match self.storage.get(root_id).await {
                Ok(data) => break data,
                Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                    warn!(
                        root_id = %root_id,
                        attempt = attempt,
                        error = %e,
                        "bundle download failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        match data {
            Some(data) => {
                debug!(root_id = %root_id, size = data.len(), "bundle downloaded");
                Ok(data)
            }
            None => Err(TierError::NotFound(root_id.to_string())),
        }
    }

    /// Whether a bundle is stored under `root_id`.
    pub async fn exists(&self, root_id: &str) -> Result<bool> {
        self.storage.head(root_id).await
    }

    /// Drop the bundle stored under `root_id`. Absent ids are fine.
    pub async fn delete(&self, root_id: &str) -> Result<()> {
        self.storage.delete(root_id).await?;
        info!(root_id = %root_id, "bundle deleted");
        Ok(())
    }

    /// Root ids of every stored bundle.
    pub async fn list(&self) -> Result<Vec<String>> {
        self.storage.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let tier = BundleTier::memory().await.unwrap();
        let data = Bytes::from("serialized bundle");

        tier.upload("ab12cd", data.clone()).await.unwrap();
        let downloaded = tier.download("ab12cd").await.unwrap();
        assert_eq!(downloaded, data);
    }

    #[tokio::test]
    async fn test_download_absent_fails_not_found() {
        let tier = BundleTier::memory().await.unwrap();
        let err = tier.download("missing-root").await.unwrap_err();
        match err {
            TierError::NotFound(id) => assert_eq!(id, "missing-root"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_overwrites_by_key() {
        let tier = BundleTier::memory().await.unwrap();
        tier.upload("ab12cd", Bytes::from("v1")).await.unwrap();
        tier.upload("ab12cd", Bytes::from("v2")).await.unwrap();

        assert_eq!(tier.download("ab12cd").await.unwrap().as_ref(), b"v2");
        assert_eq!(tier.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let tier = BundleTier::memory().await.unwrap();
        assert!(!tier.exists("ab12cd").await.unwrap());

        tier.upload("ab12cd", Bytes::from("data")).await.unwrap();
        assert!(tier.exists("ab12cd").await.unwrap());

        tier.delete("ab12cd").await.unwrap();
        assert!(!tier.exists("ab12cd").await.unwrap());
        tier.delete("ab12cd").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_backend_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tier = BundleTier::local(temp_dir.path()).await.unwrap();

        tier.upload("ff00aa", Bytes::from("on disk")).await.unwrap();
        assert_eq!(tier.download("ff00aa").await.unwrap().as_ref(), b"on disk");
        assert!(temp_dir.path().join("ff00aa").exists());
    }
}
