//! Per-key async mutex.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Serializes async critical sections per string key.
///
/// Operations queued for the same key run FIFO and never overlap (tokio's
/// mutex is fair); distinct keys proceed fully concurrently. Used to guard
/// read-modify-write sequences against a shared per-document cache.
#[derive(Debug, Clone, Default)]
pub struct KeyedMutex {
    locks: Arc<LockMap>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting behind earlier holders.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.clone().lock_owned().await;
        KeyedGuard {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            lock,
            guard: Some(guard),
        }
    }

    /// Number of keys with a live lock entry.
    pub fn active_keys(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Held lock for one key; releasing it happens on drop.
#[derive(Debug)]
pub struct KeyedGuard {
    key: String,
    locks: Arc<LockMap>,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        // release before inspecting waiters
        self.guard.take();

        let mut locks = self.locks.lock();
        if let Some(existing) = locks.get(&self.key) {
            // two strong refs (map + ours) means nobody is waiting
            if Arc::ptr_eq(existing, &self.lock) && Arc::strong_count(&self.lock) == 2 {
                locks.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_runs_in_queue_order() {
        let mutex = KeyedMutex::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        // hold the lock so every task below queues behind it
        let gate = mutex.lock("doc").await;
        let mut handles = Vec::new();
        for i in 0..8u64 {
            let mutex = mutex.clone();
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                let _guard = mutex.lock("doc").await;
                // slower early tasks must still finish first
                tokio::time::sleep(Duration::from_millis(8 - i)).await;
                log.lock().push(i);
            }));
            // let the task enqueue before spawning the next one
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        drop(gate);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*log.lock(), (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_critical_sections_never_overlap() {
        let mutex = KeyedMutex::new();
        let inside = Arc::new(Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let mutex = mutex.clone();
            let inside = Arc::clone(&inside);
            handles.push(tokio::spawn(async move {
                let _guard = mutex.lock("doc").await;
                {
                    let mut count = inside.lock();
                    assert_eq!(*count, 0, "overlapping critical sections");
                    *count = 1;
                }
                tokio::task::yield_now().await;
                *inside.lock() = 0;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_distinct_keys_are_concurrent() {
        let mutex = KeyedMutex::new();
        let _a = mutex.lock("a").await;
        // must not deadlock waiting on "a"
        let _b = mutex.lock("b").await;
        assert_eq!(mutex.active_keys(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_pruned_after_release() {
        let mutex = KeyedMutex::new();
        {
            let _guard = mutex.lock("doc").await;
            assert_eq!(mutex.active_keys(), 1);
        }
        assert_eq!(mutex.active_keys(), 0);

        // reacquiring after prune works
        let _guard = mutex.lock("doc").await;
        assert_eq!(mutex.active_keys(), 1);
    }
}
