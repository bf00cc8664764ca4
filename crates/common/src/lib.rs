/**
 * Bundle value type, manifest schema, validation
 *  pipeline, and slim-bundle extraction.
 * Represents the contents of a bundle at a given
 *  point in time.
 */
pub mod bundle;
/**
 * Container codec: the tar-backed archive format a
 *  bundle serializes to and parses from.
 */
pub mod container;
/**
 * Chunk storage adapters consumed by the external
 *  replication engine: bundle-backed source,
 *  filesystem store, and the layered composite.
 */
pub mod storage;
/**
 * Concurrency helpers.
 *  Per-key async mutex serializing read-modify-write
 *  sequences against a single document id.
 */
pub mod sync;

pub mod prelude {
    pub use crate::bundle::{Bundle, BundleError, BundleOptions, Manifest, ParseOptions};
    pub use crate::container::Container;
    pub use crate::storage::{
        BundleStore, Chunk, ChunkSource, ChunkStore, CompositeStore, FsStore, StorageKey,
    };
    pub use crate::sync::KeyedMutex;
}
