//! Per-prototype serialization.
//!
//! Concurrent ingest calls, or a submit racing an ingest, for the same
//! prototype must not interleave commits on one branch. Each prototype id
//! gets its own async mutex; operations on different prototypes proceed
//! independently with no global lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

/// Registry of per-prototype async locks.
#[derive(Default)]
pub struct PrototypeLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PrototypeLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `prototype_id`, waiting if another operation on
    /// the same prototype is in flight. The guard is owned so it can be
    /// held across awaits.
    pub async fn acquire(&self, prototype_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            map.entry(prototype_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }

    /// Drop the entry for `prototype_id` if no guard is held and no waiter
    /// is queued. Callers invoke this after a terminal transition so the
    /// registry does not grow with every archived or merged prototype.
    pub fn discard(&self, prototype_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // `acquire` clones the Arc under this same map lock, and every
        // outstanding guard owns a clone, so a strong count of 1 means the
        // map holds the only reference.
        if map
            .get(prototype_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            map.remove(prototype_id);
        }
    }

    /// Number of prototypes with a registered lock entry.
    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_prototype_operations_are_serialized() {
        let locks = Arc::new(PrototypeLocks::new());
        let running = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("proto-1").await;
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(1)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }
    }

    #[tokio::test]
    async fn different_prototypes_do_not_block_each_other() {
        let locks = PrototypeLocks::new();
        let _a = locks.acquire("proto-a").await;
        // Must not deadlock.
        let _b = locks.acquire("proto-b").await;
    }

    #[tokio::test]
    async fn discard_removes_only_idle_entries() {
        let locks = PrototypeLocks::new();
        let guard = locks.acquire("proto-1").await;

        // Held: the entry must survive a discard.
        locks.discard("proto-1");
        assert_eq!(locks.tracked(), 1);

        drop(guard);
        locks.discard("proto-1");
        assert_eq!(locks.tracked(), 0);

        // Discarding an unknown id is a no-op.
        locks.discard("proto-unknown");
    }
}
