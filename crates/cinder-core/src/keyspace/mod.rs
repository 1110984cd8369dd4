//! The keyspace: a shard's private slice of the key/value store.
//!
//! A `Keyspace` owns a flat `AHashMap<Box<str>, Value>` and is only
//! ever touched by its shard task, so there is no locking anywhere in
//! here. Memory usage is tracked on every mutation so the shard can
//! enforce its share of the configured limit and report stats without
//! scanning.

use ahash::AHashMap;

use crate::error::{WriteError, WrongType};
use crate::memory::{self, MemoryTracker};
use crate::types::{self, Value};

mod string;
mod zset;

pub use string::SetResult;
pub use zset::{ZAddReply, SCAN_PAGE};

/// Configuration for a single keyspace / shard.
#[derive(Debug, Clone, Default)]
pub struct ShardConfig {
    /// Maximum memory in bytes for this shard. `None` means unlimited.
    pub max_memory: Option<usize>,
    /// Numeric identifier, used in log events.
    pub shard_id: u16,
}

/// Aggregated statistics for a keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceStats {
    /// Number of live keys.
    pub key_count: usize,
    /// Estimated memory usage in bytes.
    pub used_bytes: usize,
}

/// The core key-value store for one shard.
pub struct Keyspace {
    entries: AHashMap<Box<str>, Value>,
    memory: MemoryTracker,
    config: ShardConfig,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyspace {
    /// Creates a new, empty keyspace with default config (no memory limit).
    pub fn new() -> Self {
        Self::with_config(ShardConfig::default())
    }

    /// Creates a new, empty keyspace with the given config.
    pub fn with_config(config: ShardConfig) -> Self {
        Self {
            entries: AHashMap::new(),
            memory: MemoryTracker::new(),
            config,
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> KeyspaceStats {
        KeyspaceStats {
            key_count: self.entries.len(),
            used_bytes: self.memory.used_bytes(),
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes a key of any type. Returns `true` if it existed.
    pub fn del(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(value) => {
                self.memory.remove_with_size(memory::entry_size(key, &value));
                true
            }
            None => false,
        }
    }

    /// Type name for the TYPE command; "none" for missing keys.
    pub fn value_type(&self, key: &str) -> &'static str {
        match self.entries.get(key) {
            Some(value) => types::type_name(value),
            None => "none",
        }
    }

    /// True when `estimated_increase` more bytes fit under this shard's
    /// memory share.
    fn can_grow(&self, estimated_increase: usize) -> bool {
        match self.config.max_memory {
            Some(max) => {
                self.memory.used_bytes() + estimated_increase <= memory::effective_limit(max)
            }
            None => true,
        }
    }

    /// Checks whether a key either doesn't exist or holds the expected
    /// collection type. Returns `Ok(true)` if the key is new,
    /// `Ok(false)` if it exists with the right type, or
    /// `Err(WrongType)` otherwise.
    fn ensure_collection_type(
        &self,
        key: &str,
        type_check: fn(&Value) -> bool,
    ) -> Result<bool, WriteError> {
        match self.entries.get(key) {
            None => Ok(true),
            Some(v) if type_check(v) => Ok(false),
            Some(_) => Err(WriteError::WrongType),
        }
    }

    /// Estimates the memory cost of a collection write and enforces the
    /// limit. `base_overhead` is the fixed cost of a new collection.
    fn reserve_memory(
        &mut self,
        is_new: bool,
        key: &str,
        base_overhead: usize,
        element_increase: usize,
    ) -> Result<(), WriteError> {
        let estimated_increase = if is_new {
            memory::ENTRY_OVERHEAD + key.len() + base_overhead + element_increase
        } else {
            element_increase
        };
        if self.can_grow(estimated_increase) {
            Ok(())
        } else {
            Err(WriteError::OutOfMemory)
        }
    }

    /// Inserts a new key with an empty collection value. Used by
    /// collection-write methods after type-checking and memory
    /// reservation.
    fn insert_empty(&mut self, key: &str, value: Value) {
        self.memory.add(key, &value);
        self.entries.insert(Box::from(key), value);
    }

    /// Measures entry size before and after a mutation, adjusting the
    /// memory tracker for the difference.
    fn track_size<T>(&mut self, key: &str, f: impl FnOnce(&mut Value) -> T) -> Option<T> {
        let value = self.entries.get_mut(key)?;
        let old_size = memory::entry_size(key, value);
        let result = f(value);
        let value = self.entries.get(key)?;
        let new_size = memory::entry_size(key, value);
        self.memory.adjust(old_size, new_size);
        Some(result)
    }
}
