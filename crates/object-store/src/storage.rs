//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TierError};

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TierConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// Wrapper around different object storage backends.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    inner: Arc<dyn ObjectStore>,
}

impl Storage {
    /// Create a new storage backend from configuration.
    pub async fn new(config: TierConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            TierConfig::Memory => Arc::new(InMemory::new()),

            TierConfig::Local { path } => {
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| TierError::InvalidConfig(e.to_string()))?,
                )
            }

            TierConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| TierError::InvalidConfig(e.to_string()))?,
                );

                // Verify the bucket exists by listing; fails fast otherwise
                {
                    use futures::TryStreamExt;
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(TierError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(TierError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        Ok(Self { inner })
    }

    /// Object key for a bundle: the root id string, exact match.
    fn bundle_path(root_id: &str) -> ObjectPath {
        ObjectPath::from(root_id)
    }

    /// Put bundle bytes into storage.
    pub async fn put(&self, root_id: &str, data: Bytes) -> Result<()> {
        let path = Self::bundle_path(root_id);
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    /// Get bundle bytes from storage.
    pub async fn get(&self, root_id: &str) -> Result<Option<Bytes>> {
        let path = Self::bundle_path(root_id);
        match self.inner.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a bundle exists.
    pub async fn head(&self, root_id: &str) -> Result<bool> {
        let path = Self::bundle_path(root_id);
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a bundle from storage. Absent keys are fine.
    pub async fn delete(&self, root_id: &str) -> Result<()> {
        let path = Self::bundle_path(root_id);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List all stored root ids.
    pub async fn list(&self) -> Result<Vec<String>> {
        use futures::TryStreamExt;

        let stream = self.inner.list(None);
        let items: Vec<_> = stream.try_collect().await?;
        Ok(items
            .into_iter()
            .map(|meta| meta.location.as_ref().to_string())
            .collect())
    }
}
