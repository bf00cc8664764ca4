//! Shared test utilities for bundle integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;

use bytes::Bytes;
use tempfile::TempDir;

use ::common::bundle::{AddOptions, Bundle, BundleOptions, NewFile};
use ::common::storage::{BundleStore, CompositeStore, FsStore, StorageKey};

pub fn key(segments: &[&str]) -> StorageKey {
    StorageKey::new(segments.iter().copied()).unwrap()
}

/// Build a bundle with a couple of app files, entrypoints, and chunk
/// entries for two documents, rooted at `ab12cd`.
pub async fn seeded_bundle() -> Bundle {
    let mut files = BTreeMap::new();
    files.insert("/index.html".to_string(), Bytes::from("<html>app</html>"));
    files.insert("/app.js".to_string(), Bytes::from("console.log('hi')"));

    let mut bundle = Bundle::from_files(
        files,
        BundleOptions {
            name: Some("seeded".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    bundle.set_root_id("ab12cd");
    bundle.set_entrypoint("main", "/index.html").unwrap();

    for (segments, data) in [
        (&["ab12cd", "snapshot"][..], "root-snapshot"),
        (&["ab12cd", "incremental", "1"][..], "root-delta"),
        (&["ff00aa", "snapshot"][..], "other-doc"),
    ] {
        bundle
            .put_chunk(&key(segments), Bytes::from(data))
            .await
            .unwrap();
    }
    bundle
}

/// Set up a composite store over the seeded bundle and a fresh temp dir.
pub async fn setup_composite() -> (CompositeStore, TempDir) {
    let bundle = seeded_bundle().await;
    let temp = TempDir::new().unwrap();
    let disk = FsStore::new(temp.path().join("storage")).await.unwrap();
    (CompositeStore::new(BundleStore::new(bundle), disk), temp)
}

/// Add one plain file to a bundle.
pub async fn add(bundle: &mut Bundle, path: &str, data: &str) {
    bundle
        .add_file(
            NewFile::at(path),
            Bytes::from(data.to_string()),
            AddOptions::default(),
        )
        .await
        .unwrap();
}
