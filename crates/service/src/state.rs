use common::sync::KeyedMutex;
use object_store::BundleTier;

/// Shared state for the bundle API.
#[derive(Debug, Clone)]
pub struct ServiceState {
    tier: BundleTier,
    locks: KeyedMutex,
}

impl ServiceState {
    pub fn new(tier: BundleTier) -> Self {
        Self {
            tier,
            locks: KeyedMutex::new(),
        }
    }

    pub fn tier(&self) -> &BundleTier {
        &self.tier
    }

    /// Per-root-id locks serializing mutating tier operations.
    pub fn locks(&self) -> &KeyedMutex {
        &self.locks
    }
}
