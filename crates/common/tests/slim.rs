//! Integration tests for slim-bundle extraction

mod common;

use ::common::bundle::{Bundle, ParseOptions};
use ::common::storage::{BundleStore, ChunkSource};

#[tokio::test]
async fn test_slim_contains_exactly_the_root_shard() {
    let bundle = common::seeded_bundle().await;
    let root_id = bundle.root_id().unwrap().to_string();

    let slim = bundle.slim(&root_id, None).unwrap();
    let bytes = slim.to_bytes().await.unwrap();
    let parsed = Bundle::parse(&bytes, ParseOptions::default()).await.unwrap();

    // every full-bundle chunk under the shard appears in the slim bundle
    let full_store = BundleStore::new(bundle);
    let slim_store = BundleStore::new(parsed);
    let prefix = common::key(&[&root_id]);
    let full_chunks = full_store.load_range(&prefix).await.unwrap();
    let slim_chunks = slim_store.load_range(&prefix).await.unwrap();
    assert!(!full_chunks.is_empty());
    assert_eq!(full_chunks, slim_chunks);

    // and nothing from any other shard does
    let foreign = slim_store
        .load_range(&common::key(&["ff00aa"]))
        .await
        .unwrap();
    assert!(foreign.is_empty(), "foreign-shard chunk leaked: {foreign:?}");
}

#[tokio::test]
async fn test_slim_bootstraps_a_chunk_source() {
    let bundle = common::seeded_bundle().await;
    let store = BundleStore::new(bundle);

    let slim = store.slim_bundle(None).unwrap();
    let seeded = BundleStore::new(slim);

    let snapshot = seeded
        .load(&common::key(&["ab12cd", "snapshot"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.as_ref(), b"root-snapshot");
    // app files are not part of the bootstrap artifact
    assert!(seeded.bundle().read_file("/index.html").await.is_err());
}
