//! Slim bundle extraction.
//!
//! A slim bundle is the minimal bootstrap artifact for one document: the
//! manifest plus every container entry in the document's storage shard.
//! Clients seed a read-only chunk source from it and fetch the remainder
//! incrementally over live replication.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::container::Container;

use super::validation::STORAGE_PREFIX;
use super::{Bundle, BundleError};

/// Caller-supplied manifest fields merged into the slim bundle's manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestOverrides {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Merged over the existing metadata bag, key by key.
    pub metadata: BTreeMap<String, Value>,
}

impl Bundle {
    /// Derive a slim bundle for `root_id`.
    ///
    /// The result carries this bundle's manifest (merged with `overrides`)
    /// plus every container entry whose path starts with
    /// `storage/<first two characters of root_id>` — exactly the shard
    /// holding the root document's chunks, selected without a full scan of
    /// the keyspace.
    pub fn slim(
        &self,
        root_id: &str,
        overrides: Option<ManifestOverrides>,
    ) -> Result<Bundle, BundleError> {
        let shard = root_id
            .get(..2)
            .ok_or_else(|| BundleError::BadRootId(root_id.to_string()))?;
        let prefix = format!("{STORAGE_PREFIX}{shard}");

        let mut manifest = self.manifest.clone();
        if let Some(overrides) = overrides {
            if overrides.name.is_some() {
                manifest.name = overrides.name;
            }
            if overrides.description.is_some() {
                manifest.description = overrides.description;
            }
            manifest.metadata.extend(overrides.metadata);
        }

        let mut container = Container::new();
        let retained: Vec<String> = self
            .container
            .paths()
            .filter(|path| path.starts_with(&prefix))
            .map(str::to_string)
            .collect();
        for path in &retained {
            // raw copy keeps per-entry compression intact
            if let Some(entry) = self.container.raw(path) {
                container.insert_raw(path, entry.clone());
            }
        }

        tracing::debug!(
            root_id = %root_id,
            shard = %shard,
            chunks = retained.len(),
            "derived slim bundle"
        );

        Ok(Bundle {
            container,
            manifest,
        })
    }
}
