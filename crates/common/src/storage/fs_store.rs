//! Filesystem-backed chunk store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{Chunk, ChunkSource, ChunkStore, StorageError, StorageKey};

/// Read-write chunk store over a local directory, laid out with the
/// sharding convention of [`StorageKey::shard_segments`].
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &StorageKey) -> PathBuf {
        let mut path = self.root.clone();
        for component in key.shard_segments() {
            path.push(component);
        }
        path
    }

    /// Reconstruct the logical key for a file under the store root.
    fn path_key(&self, path: &Path) -> Option<StorageKey> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let components: Vec<String> = relative
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect();
        StorageKey::from_shard_segments(components)
    }

    /// Collect every file under `base`, depth-first.
    async fn walk_files(&self, base: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let mut files = Vec::new();
        let mut pending = vec![base.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    files.push(entry.path());
                }
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl ChunkSource for FsStore {
    async fn load(&self, key: &StorageKey) -> Result<Option<Bytes>, StorageError> {
        match fs::read(self.key_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_range(&self, prefix: &StorageKey) -> Result<Vec<Chunk>, StorageError> {
        let base = self.key_path(prefix);

        // the prefix may itself denote a single stored chunk
        match fs::metadata(&base).await {
            Ok(metadata) if metadata.is_file() => {
                let data = Bytes::from(fs::read(&base).await?);
                return Ok(vec![Chunk {
                    key: prefix.clone(),
                    data,
                }]);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut chunks = Vec::new();
        for path in self.walk_files(&base).await? {
            let Some(key) = self.path_key(&path) else {
                tracing::warn!(path = %path.display(), "skipping unmappable storage path");
                continue;
            };
            let data = Bytes::from(fs::read(&path).await?);
            chunks.push(Chunk { key, data });
        }
        chunks.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(chunks)
    }
}

#[async_trait]
impl ChunkStore for FsStore {
    async fn save(&self, key: &StorageKey, data: Bytes) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        tracing::debug!(key = %key, bytes = data.len(), "chunk saved");
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError> {
        let path = self.key_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                // the target may be a directory of chunks
                match fs::metadata(&path).await {
                    Ok(metadata) if metadata.is_dir() => {
                        fs::remove_dir_all(&path).await?;
                        Ok(())
                    }
                    _ => Err(e.into()),
                }
            }
        }
    }

    async fn remove_range(&self, prefix: &StorageKey) -> Result<(), StorageError> {
        let base = self.key_path(prefix);
        let result = match fs::metadata(&base).await {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&base).await,
            Ok(_) => fs::remove_file(&base).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
