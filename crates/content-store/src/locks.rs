//! Per-key reader/writer locks.
//!
//! Every key maps to its own `tokio::sync::RwLock<()>`. The table only holds
//! weak references, so a lock lives exactly as long as someone holds or waits
//! on it; dead entries are swept when the table grows.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Default, Clone)]
pub struct KeyedLocks {
    table: Arc<Mutex<HashMap<String, Weak<RwLock<()>>>>>,
}

impl KeyedLocks {
    fn lock_for(&self, key: &str) -> Arc<RwLock<()>> {
        let mut table = self.table.lock();

        if let Some(lock) = table.get(key).and_then(Weak::upgrade) {
            return lock;
        }

        if table.len() >= SWEEP_THRESHOLD {
            table.retain(|_, weak| weak.strong_count() > 0);
        }

        let lock = Arc::new(RwLock::new(()));
        table.insert(key.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Shared access to `key`; any number of readers, no writer.
    pub async fn read(&self, key: &str) -> OwnedRwLockReadGuard<()> {
        self.lock_for(key).read_owned().await
    }

    /// Exclusive access to `key`.
    pub async fn write(&self, key: &str) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(key).write_owned().await
    }

    /// Number of keys with a live lock.
    pub fn active(&self) -> usize {
        self.table
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_writer_excludes_readers_on_same_key() {
        let locks = KeyedLocks::default();
        let guard = locks.write("a").await;

        let pending = tokio::time::timeout(Duration::from_millis(50), locks.read("a")).await;
        assert!(pending.is_err(), "reader got in while writer held the lock");

        drop(guard);
        let _reader = locks.read("a").await;
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let locks = KeyedLocks::default();
        let _a = locks.write("a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.write("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_dropped() {
        let locks = KeyedLocks::default();
        {
            let _a = locks.write("a").await;
            let _b = locks.read("b").await;
            assert_eq!(locks.active(), 2);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_the_table() {
        let locks = KeyedLocks::default();
        let other = locks.clone();
        let _guard = locks.write("a").await;
        let pending = tokio::time::timeout(Duration::from_millis(50), other.write("a")).await;
        assert!(pending.is_err());
    }
}
