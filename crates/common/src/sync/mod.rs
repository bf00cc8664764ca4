//! Concurrency primitives.

mod key_mutex;

pub use key_mutex::{KeyedGuard, KeyedMutex};
