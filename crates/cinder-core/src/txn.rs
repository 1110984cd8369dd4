//! Per-key transaction locks.
//!
//! Shards serialize everything they execute, so a single request is
//! already atomic. What needs coordination is the multi-hop case:
//! ZUNIONSTORE / ZINTERSTORE gather on several shards, combine, and
//! then write — and nothing may touch the involved keys between those
//! phases. The engine takes one [`KeyGuard`] per key for the duration
//! of a command, which gives every command a total order per key and
//! makes multi-key transactions opaque to observers.
//!
//! Multi-key acquisition always locks in sorted, deduplicated key
//! order, which rules out lock-order deadlocks between transactions.
//!
//! The table is self-cleaning: when the last guard for a key is
//! dropped, its slot is removed, so the table only ever holds keys
//! with live traffic.

use std::sync::{Arc, Mutex as StdMutex};

use ahash::AHashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = AHashMap<Box<str>, Arc<AsyncMutex<()>>>;

/// A table of per-key async mutexes.
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    table: Arc<StdMutex<LockTable>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches (or creates) the lock cell for a key.
    fn cell(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().expect("key-lock table poisoned");
        table
            .entry(Box::from(key))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Locks a single key.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let cell = self.cell(key);
        let guard = cell.lock_owned().await;
        KeyGuard {
            key: Box::from(key),
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    /// Locks a set of keys as a unit, in sorted deduplicated order.
    ///
    /// Holding the returned guards pins every key for the caller; drop
    /// them (in any order) to release.
    pub async fn lock_many(&self, keys: &[&str]) -> Vec<KeyGuard> {
        let mut ordered: Vec<&str> = keys.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            guards.push(self.lock(key).await);
        }
        guards
    }

    #[cfg(test)]
    fn table_len(&self) -> usize {
        self.table.lock().expect("key-lock table poisoned").len()
    }
}

/// Exclusive hold on one key. Releases on drop and retires the lock
/// cell when no other task is using it.
#[derive(Debug)]
pub struct KeyGuard {
    key: Box<str>,
    table: Arc<StdMutex<LockTable>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // release the mutex before inspecting the cell's refcount
        self.guard.take();

        let mut table = self.table.lock().expect("key-lock table poisoned");
        if let Some(cell) = table.get(&self.key) {
            // count == 1 means only the table itself holds the cell:
            // no guard, no waiter, no caller between cell() and lock()
            if Arc::strong_count(cell) == 1 {
                table.remove(&self.key);
            }
        }
    }
}
