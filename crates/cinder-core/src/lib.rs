//! cinder-core: the storage engine.
//!
//! Owns the keyspace, the sorted-set encodings, and the shard /
//! transaction model. Designed around a thread-per-core,
//! shared-nothing architecture: every key belongs to exactly one
//! shard, each shard is a single tokio task with exclusive ownership
//! of its keyspace slice, and multi-key commands coordinate through
//! per-key transaction locks plus a two-phase gather/store flow.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod keyspace;
pub mod memory;
pub mod shard;
pub mod txn;
pub mod types;

pub use aggregate::{Aggregate, ScoredMap, SetOp};
pub use engine::{Engine, EngineConfig};
pub use error::{ShardError, WriteError, WrongType};
pub use keyspace::{Keyspace, KeyspaceStats, SetResult, ShardConfig, ZAddReply};
pub use shard::{ShardHandle, ShardRequest, ShardResponse};
pub use types::sorted_set::range::{
    Interval, LexBound, LexInterval, RangeParams, RangeSpec, ScoreBound, ScoreInterval,
};
pub use types::sorted_set::{SortedSet, ZAddFlags};
pub use types::Value;
