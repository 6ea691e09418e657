//! Keyed async mutex serializing mutations of one instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use fleet_core::types::InstanceId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per instance id, created on demand.
///
/// Operations on different ids never contend. Entries are dropped once no
/// task holds or waits on them, so the map only grows with concurrency,
/// not with the number of instances ever touched.
#[derive(Default)]
pub struct InstanceLocks {
    entries: Mutex<HashMap<InstanceId, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one mutating operation.
pub struct InstanceGuard<'a> {
    locks: &'a InstanceLocks,
    id: InstanceId,
    _guard: OwnedMutexGuard<()>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<InstanceId, Arc<AsyncMutex<()>>>> {
        // The map stays consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait until no other task holds `id`, then hold it.
    pub async fn acquire(&self, id: InstanceId) -> InstanceGuard<'_> {
        let mutex = self.entries().entry(id).or_default().clone();
        let guard = mutex.lock_owned().await;
        InstanceGuard {
            locks: self,
            id,
            _guard: guard,
        }
    }

    /// Number of ids currently held or awaited.
    pub fn active(&self) -> usize {
        self.entries().len()
    }
}

impl Drop for InstanceGuard<'_> {
    fn drop(&mut self) {
        let mut entries = self.locks.entries();
        // One reference lives in the map and one in this guard; anything
        // more is a waiter that still needs the entry.
        if entries
            .get(&self.id)
            .is_some_and(|m| Arc::strong_count(m) <= 2)
        {
            entries.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn entries_are_dropped_after_release() {
        let locks = InstanceLocks::new();
        let id = uuid::Uuid::now_v7();
        {
            let _guard = locks.acquire(id).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn same_id_is_serialized() {
        let locks = Arc::new(InstanceLocks::new());
        let id = uuid::Uuid::now_v7();
        let guard = locks.acquire(id).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender acquires after release")
            .unwrap();
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn different_ids_do_not_contend() {
        let locks = InstanceLocks::new();
        let _a = locks.acquire(uuid::Uuid::now_v7()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(uuid::Uuid::now_v7()))
            .await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }
}
