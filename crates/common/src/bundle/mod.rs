//! Bundle data structures and operations
//!
//! This module defines the core types for Satchel's content-addressed
//! application bundles:
//!
//! - **[`Manifest`]**: bundle metadata — version, file entries, entrypoints,
//!   root id
//! - **[`Bundle`]**: in-memory representation of a bundle with file and
//!   entrypoint CRUD, parsing, and serialization
//! - **[`Validator`]**: severity-bucketed validation pipeline over a parsed
//!   manifest/container pair
//! - slim extraction: a minimal bootstrap bundle holding the manifest plus
//!   one document's chunk shard
//!
//! # Architecture
//!
//! A bundle is a single portable archive:
//! ```text
//! bundle.tar
//! ├── manifest.json          <- Manifest, UTF-8 JSON
//! ├── index.html             <- named files (entrypoints alias into these)
//! ├── app.js
//! └── storage/               <- replicated document chunks, sharded by the
//!     └── ab/12cd…/…            first two characters of the document id
//! ```
//!
//! File and entrypoint mutations update the container and the manifest
//! together; every fallible check happens before the first mutation, so no
//! intermediate inconsistent state is observable.

mod manifest;
mod slim;
mod validation;

pub use manifest::{
    FileEntry, Manifest, ManifestError, CURRENT_VERSION, MANIFEST_PATH, MAX_SUPPORTED_VERSION,
};
pub use slim::ManifestOverrides;
pub use validation::{
    find_entrypoint_cycles, Severity, ValidationMessage, ValidationOptions, ValidationReport,
    ValidationRule, Validator, DEFAULT_MAX_FILE_COUNT, DEFAULT_MAX_TOTAL_SIZE, STORAGE_PREFIX,
};

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::container::{Container, ContainerError, SerializeOptions, SetOptions};
use crate::storage::StorageKey;

/// Fixed serialization overhead assumed by [`Bundle::estimated_size`]:
/// archive headers, padding, and the manifest entry.
pub const BUNDLE_OVERHEAD: u64 = 4 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("container error: {0}")]
    Container(#[from] ContainerError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("bundle has no manifest.json entry")]
    MissingManifest,
    #[error("bundle is {actual} bytes, maximum is {max}")]
    TooLarge { actual: u64, max: u64 },
    #[error("file already exists: {0}")]
    DuplicatePath(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("entrypoint not found: {0}")]
    EntrypointNotFound(String),
    #[error("manifest file {0} has no container entry")]
    MissingFileData(String),
    #[error("root id `{0}` is too short for shard extraction")]
    BadRootId(String),
}

/// Options for creating a bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Manifest schema version. Defaults to [`CURRENT_VERSION`].
    pub version: Option<u32>,
    /// Content-type overrides by path, consulted before extension
    /// detection in [`Bundle::from_files`].
    pub content_types: BTreeMap<String, String>,
}

/// Options for [`Bundle::parse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Reject archives larger than this many bytes.
    pub max_size: Option<u64>,
    /// Cross-check that every manifest file has a container entry.
    pub validate_files: bool,
}

/// Descriptor for a file being added.
#[derive(Debug, Clone, Default)]
pub struct NewFile {
    pub path: String,
    /// Detected from the path's extension when unset.
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl NewFile {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Options for [`Bundle::add_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    /// Overwrite an existing entry instead of failing.
    pub replace: bool,
    /// Gzip the payload inside the container.
    pub compress: bool,
}

/// Summary view returned by [`Bundle::info`].
#[derive(Debug, Clone, PartialEq)]
pub struct BundleInfo {
    pub version: u32,
    pub file_count: usize,
    pub total_size: u64,
    pub compressed_files: usize,
    pub entrypoints: Vec<String>,
    pub uncompressed_size: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// File paths in the manifest are absolute.
fn absolute(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn detect_content_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// A bundle: one container plus its parsed manifest.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    container: Container,
    manifest: Manifest,
}

impl Bundle {
    /// Create an empty bundle. Version defaults to 1.
    pub fn new(options: BundleOptions) -> Self {
        let manifest = Manifest {
            version: options.version.unwrap_or(CURRENT_VERSION),
            name: options.name,
            description: options.description,
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        Self {
            container: Container::new(),
            manifest,
        }
    }

    /// Create a bundle from a path -> bytes mapping, one file entry per
    /// input. Content types come from `options.content_types`, falling back
    /// to extension detection.
    pub async fn from_files(
        files: BTreeMap<String, Bytes>,
        options: BundleOptions,
    ) -> Result<Self, BundleError> {
        let content_types = options.content_types.clone();
        let mut bundle = Self::new(options);
        for (path, data) in files {
            let content_type = content_types.get(&path).cloned();
            bundle
                .add_file(
                    NewFile {
                        path,
                        content_type,
                        last_modified: None,
                    },
                    data,
                    AddOptions::default(),
                )
                .await?;
        }
        Ok(bundle)
    }

    /// Parse a bundle from archive bytes.
    ///
    /// The size ceiling is enforced before anything is decoded; a missing
    /// or schema-invalid `manifest.json` is an error. With
    /// `validate_files`, manifest file references are cross-checked against
    /// container entries.
    pub async fn parse(bytes: &[u8], options: ParseOptions) -> Result<Self, BundleError> {
        if let Some(max) = options.max_size {
            let actual = bytes.len() as u64;
            if actual > max {
                return Err(BundleError::TooLarge { actual, max });
            }
        }

        let container = Container::load(bytes)?;
        let manifest_bytes = container
            .get(MANIFEST_PATH)
            .await?
            .ok_or(BundleError::MissingManifest)?;
        let manifest = Manifest::from_slice(&manifest_bytes)?;

        if options.validate_files {
            for file in &manifest.files {
                if !container.contains(&file.path) {
                    return Err(BundleError::MissingFileData(file.path.clone()));
                }
            }
        }

        Ok(Self {
            container,
            manifest,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.manifest.files
    }

    pub fn entrypoints(&self) -> &BTreeMap<String, String> {
        &self.manifest.entrypoints
    }

    pub fn root_id(&self) -> Option<&str> {
        self.manifest.root_id.as_deref()
    }

    pub fn set_root_id(&mut self, root_id: impl Into<String>) {
        self.manifest.root_id = Some(root_id.into());
    }

    /// Add a file to the container and the manifest.
    ///
    /// Fails with [`BundleError::DuplicatePath`] when the path exists and
    /// `replace` is unset; in that case nothing is mutated.
    pub async fn add_file(
        &mut self,
        file: NewFile,
        data: Bytes,
        options: AddOptions,
    ) -> Result<(), BundleError> {
        let path = absolute(&file.path);
        if self.manifest.has_file(&path) && !options.replace {
            return Err(BundleError::DuplicatePath(path));
        }

        let entry = FileEntry {
            length: data.len() as u64,
            content_type: file
                .content_type
                .unwrap_or_else(|| detect_content_type(&path)),
            compressed: options.compress.then_some(true),
            uncompressed_size: options.compress.then_some(data.len() as u64),
            last_modified: file.last_modified.or_else(|| Some(Utc::now())),
            path: path.clone(),
        };

        self.container
            .set(
                &path,
                data,
                SetOptions {
                    compress: options.compress,
                    level: None,
                },
            )
            .await?;
        self.manifest.files.retain(|f| f.path != path);
        self.manifest.files.push(entry);
        Ok(())
    }

    /// Replace an existing file's contents, preserving its compression.
    pub async fn update_file(&mut self, path: &str, data: Bytes) -> Result<(), BundleError> {
        let path = absolute(path);
        let compress = {
            let entry = self
                .manifest
                .file(&path)
                .ok_or_else(|| BundleError::FileNotFound(path.clone()))?;
            entry.compressed.unwrap_or(false)
        };

        self.container
            .set(
                &path,
                data.clone(),
                SetOptions {
                    compress,
                    level: None,
                },
            )
            .await?;

        // lookup above guarantees the entry exists
        if let Some(entry) = self.manifest.files.iter_mut().find(|f| f.path == path) {
            entry.length = data.len() as u64;
            entry.uncompressed_size = compress.then_some(data.len() as u64);
            entry.last_modified = Some(Utc::now());
        }
        Ok(())
    }

    /// Remove a file from the container and the manifest.
    pub fn remove_file(&mut self, path: &str) -> Result<(), BundleError> {
        let path = absolute(path);
        if !self.manifest.has_file(&path) {
            return Err(BundleError::FileNotFound(path));
        }
        self.container.remove(&path);
        self.manifest.files.retain(|f| f.path != path);
        Ok(())
    }

    /// Read a file's (decompressed) contents.
    pub async fn read_file(&self, path: &str) -> Result<Bytes, BundleError> {
        let path = absolute(path);
        self.container
            .get(&path)
            .await?
            .ok_or(BundleError::FileNotFound(path))
    }

    /// Point an entrypoint name at a file path. The file must exist.
    pub fn set_entrypoint(&mut self, name: &str, path: &str) -> Result<(), BundleError> {
        let path = absolute(path);
        if !self.manifest.has_file(&path) {
            return Err(BundleError::FileNotFound(path));
        }
        self.manifest.entrypoints.insert(name.to_string(), path);
        Ok(())
    }

    pub fn remove_entrypoint(&mut self, name: &str) -> Result<(), BundleError> {
        self.manifest
            .entrypoints
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BundleError::EntrypointNotFound(name.to_string()))
    }

    /// Insert a replicated-document chunk under the reserved `storage/`
    /// namespace. Chunks are container entries only; they are not listed in
    /// the manifest's file table.
    pub async fn put_chunk(
        &mut self,
        key: &StorageKey,
        data: Bytes,
    ) -> Result<(), BundleError> {
        self.container
            .set(&key.storage_path(), data, SetOptions::default())
            .await?;
        Ok(())
    }

    /// Serialize to archive bytes, refreshing `manifest.json` first.
    pub async fn to_bytes(&self) -> Result<Bytes, BundleError> {
        let mut container = self.container.clone();
        container
            .set(
                MANIFEST_PATH,
                Bytes::from(self.manifest.to_vec()?),
                SetOptions::default(),
            )
            .await?;
        Ok(container.serialize(SerializeOptions::default()).await?)
    }

    /// Fast pre-serialization size estimate: declared lengths plus a fixed
    /// overhead constant. Not exact.
    pub fn estimated_size(&self) -> u64 {
        self.manifest.total_size() + BUNDLE_OVERHEAD
    }

    pub fn info(&self) -> BundleInfo {
        let files = &self.manifest.files;
        BundleInfo {
            version: self.manifest.version,
            file_count: files.len(),
            total_size: self.manifest.total_size(),
            compressed_files: files
                .iter()
                .filter(|f| f.compressed.unwrap_or(false))
                .count(),
            entrypoints: self.manifest.entrypoints.keys().cloned().collect(),
            uncompressed_size: files
                .iter()
                .map(|f| f.uncompressed_size.unwrap_or(f.length))
                .sum(),
            created_at: self.manifest.created_at,
        }
    }

    /// Run the validation pipeline over this bundle.
    pub fn validate(&self, validator: &Validator) -> ValidationReport {
        validator.validate(&self.manifest, &self.container)
    }
}
