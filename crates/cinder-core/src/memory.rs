//! Memory tracking for the keyspace.
//!
//! Provides byte-level accounting of memory used by entries. Updated
//! on every mutation so a shard can enforce its memory share and
//! report stats without scanning the entire keyspace.
//!
//! Overhead constants are empirical estimates for 64-bit platforms.
//! Overestimating is fine (writes are rejected a little early);
//! underestimating could let memory creep past the configured limit,
//! so the constants lean high.

use crate::types::Value;

/// Percentage of the configured `max_memory` used as the effective
/// write limit. The headroom absorbs allocator overhead, internal
/// fragmentation, and estimation error in the per-entry constants.
pub const MEMORY_SAFETY_MARGIN_PERCENT: usize = 90;

/// Computes the effective memory limit after applying the safety margin.
pub fn effective_limit(max_bytes: usize) -> usize {
    // u128 intermediate avoids overflow on large limits
    ((max_bytes as u128) * (MEMORY_SAFETY_MARGIN_PERCENT as u128) / 100) as usize
}

/// Estimated overhead per keyspace entry: the `Box<str>` key struct,
/// the `Entry` struct, and hashbrown's per-slot bookkeeping at its
/// typical load factor.
pub(crate) const ENTRY_OVERHEAD: usize = 96;

/// Estimates the full memory cost of one entry.
pub(crate) fn entry_size(key: &str, value: &Value) -> usize {
    ENTRY_OVERHEAD + key.len() + value_size(value)
}

fn value_size(value: &Value) -> usize {
    match value {
        Value::String(data) => data.len(),
        Value::SortedSet(set) => set.memory_usage(),
    }
}

/// Tracks memory usage for a single keyspace.
///
/// All updates are explicit — callers must account for every mutation.
/// This avoids any hidden scanning cost.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    used_bytes: usize,
    key_count: usize,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current estimated memory usage in bytes.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Returns the number of tracked keys.
    pub fn key_count(&self) -> usize {
        self.key_count
    }

    /// Records the addition of a new entry.
    pub fn add(&mut self, key: &str, value: &Value) {
        self.used_bytes += entry_size(key, value);
        self.key_count += 1;
    }

    /// Records the removal of an entry whose size is already known.
    pub fn remove_with_size(&mut self, size: usize) {
        self.used_bytes = self.used_bytes.saturating_sub(size);
        self.key_count = self.key_count.saturating_sub(1);
    }

    /// Adjusts usage after an in-place mutation changed an entry's size.
    pub fn adjust(&mut self, old_size: usize, new_size: usize) {
        self.used_bytes = self.used_bytes.saturating_sub(old_size) + new_size;
    }

    /// Re-baselines after a value was overwritten in place.
    pub fn replace(&mut self, key: &str, old_value: &Value, new_value: &Value) {
        self.adjust(entry_size(key, old_value), entry_size(key, new_value));
    }
}
