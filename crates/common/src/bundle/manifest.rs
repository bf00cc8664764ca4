//! # Manifest
//!
//! The manifest is the root metadata structure for a bundle. It describes:
//!
//! - **Identity**: schema version, optional name/description, creation time
//! - **Content**: one [`FileEntry`] per named file in the container
//! - **Entrypoints**: named aliases to file paths, used as launch targets
//! - **Root id**: the content identifier the storage layer and the
//!   object-storage tier key on
//!
//! ## Wire format
//!
//! Manifests are serialized as UTF-8 JSON with camelCase field names and
//! stored as the `manifest.json` entry at the container root. The format is
//! shared with non-Rust tooling on the platform, so the strict parser
//! validates the raw JSON structure before deserializing and reports the
//! first failing field path together with the total issue count.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Container path of the manifest entry.
pub const MANIFEST_PATH: &str = "manifest.json";

/// Manifest schema version written by this crate.
pub const CURRENT_VERSION: u32 = 1;

/// Highest manifest schema version this crate understands.
pub const MAX_SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest schema violation at `{path}` ({issues} issue(s))")]
    Schema { path: String, issues: usize },
    #[error("unsupported manifest version {0} (supported: 1..={MAX_SUPPORTED_VERSION})")]
    UnsupportedVersion(u64),
}

/// Metadata for one named file in the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Absolute path of the file inside the bundle.
    pub path: String,
    /// Uncompressed length in bytes.
    pub length: u64,
    /// MIME content type.
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncompressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// The root metadata structure for a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version.
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Content identifier of the root document in the storage namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    /// One entry per named file. Paths are unique.
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Named aliases to file paths. Every value equals some file's path.
    #[serde(default)]
    pub entrypoints: BTreeMap<String, String>,
    /// Open key-value bag for application use.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            name: None,
            description: None,
            created_at: None,
            root_id: None,
            files: Vec::new(),
            entrypoints: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// Strict parse from `manifest.json` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Strict parse from a JSON value.
    ///
    /// Structural problems fail with [`ManifestError::Schema`] carrying the
    /// first failing field path and the total number of issues found.
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        let issues = schema_issues(&value);
        if let Some(first) = issues.first() {
            return Err(ManifestError::Schema {
                path: first.clone(),
                issues: issues.len(),
            });
        }

        // schema_issues guarantees version is an unsigned integer
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        if version == 0 || version > MAX_SUPPORTED_VERSION as u64 {
            return Err(ManifestError::UnsupportedVersion(version));
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Serialize to `manifest.json` bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Look up a file entry by path.
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.file(path).is_some()
    }

    /// Sum of declared file lengths.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }
}

/// Collect structural schema violations as field paths, document order.
fn schema_issues(value: &Value) -> Vec<String> {
    let mut issues = Vec::new();

    let Some(object) = value.as_object() else {
        return vec!["$".to_string()];
    };

    match object.get("version") {
        Some(v) if v.as_u64().is_some() => {}
        _ => issues.push("version".to_string()),
    }

    for field in ["name", "description", "createdAt", "rootId"] {
        if let Some(v) = object.get(field) {
            if !v.is_string() && !v.is_null() {
                issues.push(field.to_string());
            }
        }
    }

    match object.get("files") {
        None => {}
        Some(Value::Array(files)) => {
            for (index, file) in files.iter().enumerate() {
                let Some(file) = file.as_object() else {
                    issues.push(format!("files[{index}]"));
                    continue;
                };
                match file.get("path") {
                    Some(Value::String(path)) if !path.is_empty() => {}
                    _ => issues.push(format!("files[{index}].path")),
                }
                match file.get("length") {
                    Some(v) if v.as_u64().is_some() => {}
                    _ => issues.push(format!("files[{index}].length")),
                }
                match file.get("contentType") {
                    Some(Value::String(_)) => {}
                    _ => issues.push(format!("files[{index}].contentType")),
                }
            }
        }
        Some(_) => issues.push("files".to_string()),
    }

    match object.get("entrypoints") {
        None => {}
        Some(Value::Object(entrypoints)) => {
            for (name, target) in entrypoints {
                if !target.is_string() {
                    issues.push(format!("entrypoints.{name}"));
                }
            }
        }
        Some(_) => issues.push("entrypoints".to_string()),
    }

    if let Some(metadata) = object.get("metadata") {
        if !metadata.is_object() && !metadata.is_null() {
            issues.push("metadata".to_string());
        }
    }

    issues
}
