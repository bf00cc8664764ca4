//! Chunk storage adapters.
//!
//! The replication engine persists documents as chunks addressed by
//! hierarchical [`StorageKey`]s. This module defines that contract as two
//! capability sets — a read-only [`ChunkSource`] and a read-write
//! [`ChunkStore`] — plus the three adapters Satchel ships:
//!
//! - [`BundleStore`]: read-only source over a parsed bundle's `storage/`
//!   namespace (bootstrap seed)
//! - [`FsStore`]: read-write store over a local directory
//! - [`CompositeStore`]: an immutable bundle base layered under a mutable
//!   disk overlay, disk winning on conflicts
//!
//! A source has no write surface at all, so "writes to the bootstrap layer
//! are silently dropped" cannot happen by construction.

mod bundle_store;
mod composite;
mod fs_store;
mod key;

pub use bundle_store::BundleStore;
pub use composite::CompositeStore;
pub use fs_store::FsStore;
pub use key::StorageKey;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bundle::BundleError;
use crate::container::ContainerError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),
    #[error("container error: {0}")]
    Container(#[from] ContainerError),
    #[error("bundle manifest has no root id")]
    MissingRootId,
}

/// One stored chunk of replicated document data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub key: StorageKey,
    pub data: Bytes,
}

/// Read capability over a chunk keyspace.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Load one chunk, `None` when absent.
    async fn load(&self, key: &StorageKey) -> Result<Option<Bytes>, StorageError>;

    /// Load every chunk whose key starts with `prefix` (the prefix key
    /// itself included).
    async fn load_range(&self, prefix: &StorageKey) -> Result<Vec<Chunk>, StorageError>;
}

/// Full read-write capability over a chunk keyspace.
#[async_trait]
pub trait ChunkStore: ChunkSource {
    async fn save(&self, key: &StorageKey, data: Bytes) -> Result<(), StorageError>;

    /// Idempotent: removing an absent key succeeds.
    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError>;

    /// Remove every chunk whose key starts with `prefix`.
    async fn remove_range(&self, prefix: &StorageKey) -> Result<(), StorageError>;
}
