//! Object-storage tier for Satchel bundles.
//!
//! Persists whole serialized bundles keyed by their content root id, over
//! pluggable backends (memory, local filesystem, S3-compatible). Transient
//! auth failures retry with bounded exponential backoff before surfacing.

mod error;
mod storage;
mod tier;

pub use error::{Result, TierError};
pub use storage::TierConfig;
pub use tier::BundleTier;
