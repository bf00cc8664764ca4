//! Bundle container codec.
//!
//! A container is an ordered set of named byte entries packed into a single
//! tar stream. Entries may be individually gzip-compressed; the compression
//! flag and original size travel in PAX extension records so that a
//! serialized container round-trips exactly.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// PAX record marking an entry as gzip-compressed.
const PAX_COMPRESSED: &str = "SATCHEL.compressed";
/// PAX record carrying the uncompressed payload size.
const PAX_UNCOMPRESSED_SIZE: &str = "SATCHEL.size";

/// Default gzip level for compressed entries.
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("corrupt container: {0}")]
    Corrupt(String),
    #[error("container i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive generation failed: {0}")]
    Generation(String),
}

/// A stored entry. Payload bytes are kept exactly as they will appear in
/// the archive; compressed entries hold the gzip stream.
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    pub(crate) data: Bytes,
    pub(crate) compressed: bool,
    pub(crate) uncompressed_size: u64,
}

/// Descriptive view of an entry, as returned by [`Container::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub path: String,
    /// Stored (possibly compressed) size in the archive.
    pub size: u64,
    pub compressed: bool,
    pub uncompressed_size: u64,
}

/// Options for [`Container::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Gzip the payload before storing it.
    pub compress: bool,
    /// Gzip level, 0-9. Defaults to 6.
    pub level: Option<u32>,
}

/// Options for [`Container::serialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    /// Modification time stamped on every entry, unix seconds.
    /// Zero keeps output deterministic for identical contents.
    pub mtime: u64,
}

/// In-memory bundle container.
#[derive(Debug, Clone, Default)]
pub struct Container {
    entries: BTreeMap<String, StoredEntry>,
}

/// Entry paths are stored without a leading slash.
fn clean_path(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a container from archive bytes.
    ///
    /// Directory entries are skipped. Fails with [`ContainerError::Corrupt`]
    /// on truncated input or non-UTF-8 entry paths.
    pub fn load(bytes: &[u8]) -> Result<Self, ContainerError> {
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        let mut entries = BTreeMap::new();

        let iter = archive
            .entries()
            .map_err(|e| ContainerError::Corrupt(e.to_string()))?;
        for entry in iter {
            let mut entry = entry.map_err(|e| ContainerError::Corrupt(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = {
                let raw = entry
                    .path()
                    .map_err(|e| ContainerError::Corrupt(e.to_string()))?;
                let utf8 = raw
                    .to_str()
                    .ok_or_else(|| ContainerError::Corrupt("non-utf8 entry path".into()))?;
                clean_path(utf8)
            };

            let mut compressed = false;
            let mut uncompressed_size = None;
            if let Some(extensions) = entry
                .pax_extensions()
                .map_err(|e| ContainerError::Corrupt(e.to_string()))?
            {
                for extension in extensions {
                    let extension =
                        extension.map_err(|e| ContainerError::Corrupt(e.to_string()))?;
                    match extension.key() {
                        Ok(PAX_COMPRESSED) => {
                            compressed = extension.value() == Ok("1");
                        }
                        Ok(PAX_UNCOMPRESSED_SIZE) => {
                            uncompressed_size = extension
                                .value()
                                .ok()
                                .and_then(|v| v.parse::<u64>().ok());
                        }
                        _ => {}
                    }
                }
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| ContainerError::Corrupt(e.to_string()))?;

            let uncompressed_size = uncompressed_size.unwrap_or(data.len() as u64);
            entries.insert(
                path,
                StoredEntry {
                    data: Bytes::from(data),
                    compressed,
                    uncompressed_size,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Get an entry's payload, decompressing if necessary.
    pub async fn get(&self, path: &str) -> Result<Option<Bytes>, ContainerError> {
        let entry = match self.entries.get(&clean_path(path)) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if !entry.compressed {
            return Ok(Some(entry.data.clone()));
        }

        let mut decoder = GzDecoder::new(&entry.data[..]);
        let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| ContainerError::Corrupt(format!("gzip entry {path}: {e}")))?;
        Ok(Some(Bytes::from(out)))
    }

    /// Insert or replace an entry.
    pub async fn set(
        &mut self,
        path: &str,
        data: Bytes,
        options: SetOptions,
    ) -> Result<(), ContainerError> {
        let path = clean_path(path);
        let entry = if options.compress {
            let level = options.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
            encoder
                .write_all(&data)
                .map_err(|e| ContainerError::Generation(e.to_string()))?;
            let stored = encoder
                .finish()
                .map_err(|e| ContainerError::Generation(e.to_string()))?;
            StoredEntry {
                uncompressed_size: data.len() as u64,
                data: Bytes::from(stored),
                compressed: true,
            }
        } else {
            StoredEntry {
                uncompressed_size: data.len() as u64,
                data,
                compressed: false,
            }
        };

        tracing::debug!(path = %path, compressed = entry.compressed, "container set");
        self.entries.insert(path, entry);
        Ok(())
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.remove(&clean_path(path)).is_some()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&clean_path(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry paths in archive order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Describe all entries.
    pub fn list(&self) -> Vec<EntryInfo> {
        self.entries
            .iter()
            .map(|(path, entry)| EntryInfo {
                path: path.clone(),
                size: entry.data.len() as u64,
                compressed: entry.compressed,
                uncompressed_size: entry.uncompressed_size,
            })
            .collect()
    }

    /// Stored entry as it will appear in the archive, compression intact.
    pub(crate) fn raw(&self, path: &str) -> Option<&StoredEntry> {
        self.entries.get(&clean_path(path))
    }

    /// Insert a stored entry verbatim, bypassing recompression.
    pub(crate) fn insert_raw(&mut self, path: &str, entry: StoredEntry) {
        self.entries.insert(clean_path(path), entry);
    }

    /// Serialize to archive bytes.
    pub async fn serialize(&self, options: SerializeOptions) -> Result<Bytes, ContainerError> {
        let mut builder = tar::Builder::new(Vec::new());

        for (path, entry) in &self.entries {
            if entry.compressed {
                let size = entry.uncompressed_size.to_string();
                builder
                    .append_pax_extensions([
                        (PAX_COMPRESSED, b"1".as_slice()),
                        (PAX_UNCOMPRESSED_SIZE, size.as_bytes()),
                    ])
                    .map_err(|e| ContainerError::Generation(e.to_string()))?;
            }

            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(entry.data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(options.mtime);
            builder
                .append_data(&mut header, path, &entry.data[..])
                .map_err(|e| ContainerError::Generation(e.to_string()))?;
        }

        let data = builder
            .into_inner()
            .map_err(|e| ContainerError::Generation(e.to_string()))?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let mut container = Container::new();
        container
            .set("/a.txt", Bytes::from("hello"), SetOptions::default())
            .await
            .unwrap();

        let data = container.get("a.txt").await.unwrap().unwrap();
        assert_eq!(data.as_ref(), b"hello");
        // leading slash is normalized away
        assert!(container.contains("/a.txt"));
        assert!(container.contains("a.txt"));
    }

    #[tokio::test]
    async fn test_compressed_entry_roundtrip() {
        let payload = Bytes::from(vec![7u8; 4096]);
        let mut container = Container::new();
        container
            .set(
                "blob.bin",
                payload.clone(),
                SetOptions {
                    compress: true,
                    level: None,
                },
            )
            .await
            .unwrap();

        let info = &container.list()[0];
        assert!(info.compressed);
        assert_eq!(info.uncompressed_size, 4096);
        assert!(info.size < 4096);

        let bytes = container.serialize(SerializeOptions::default()).await.unwrap();
        let reloaded = Container::load(&bytes).unwrap();
        let data = reloaded.get("blob.bin").await.unwrap().unwrap();
        assert_eq!(data, payload);

        let info = &reloaded.list()[0];
        assert!(info.compressed);
        assert_eq!(info.uncompressed_size, 4096);
    }

    #[tokio::test]
    async fn test_serialize_load_preserves_all_entries() {
        let mut container = Container::new();
        for i in 0..10 {
            container
                .set(
                    &format!("dir/file-{i}.txt"),
                    Bytes::from(format!("contents {i}")),
                    SetOptions::default(),
                )
                .await
                .unwrap();
        }

        let bytes = container.serialize(SerializeOptions::default()).await.unwrap();
        let reloaded = Container::load(&bytes).unwrap();
        assert_eq!(reloaded.len(), 10);
        for i in 0..10 {
            let data = reloaded.get(&format!("dir/file-{i}.txt")).await.unwrap();
            assert_eq!(data.unwrap().as_ref(), format!("contents {i}").as_bytes());
        }
    }

    #[tokio::test]
    async fn test_remove_is_reported() {
        let mut container = Container::new();
        container
            .set("x", Bytes::from("y"), SetOptions::default())
            .await
            .unwrap();
        assert!(container.remove("x"));
        assert!(!container.remove("x"));
        assert!(container.is_empty());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let result = Container::load(&[0xde, 0xad, 0xbe, 0xef, 0x01]);
        assert!(matches!(result, Err(ContainerError::Corrupt(_))));
    }

    #[test]
    fn test_load_empty_input_is_empty_container() {
        // An empty byte stream is a valid, entry-less tar archive.
        let container = Container::load(&[]).unwrap();
        assert!(container.is_empty());
    }
}
