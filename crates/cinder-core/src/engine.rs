//! The engine: coordinator for the sharded keyspace.
//!
//! Routes single-key operations to the correct shard based on a hash
//! of the key. Each shard is an independent tokio task — no locks on
//! the hot path beyond the per-key transaction guard.
//!
//! Multi-key set algebra (ZUNIONSTORE / ZINTERSTORE) runs as a
//! two-phase transaction: gather on every shard that owns input keys,
//! combine on the coordinator, then store on the destination shard.
//! All involved keys stay locked across both phases, so other commands
//! observe either the pre- or the post-transaction state.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ahash::AHashMap;

use crate::aggregate::{self, Aggregate, ScoredMap, SetOp};
use crate::error::ShardError;
use crate::keyspace::ShardConfig;
use crate::shard::{self, ShardHandle, ShardRequest, ShardResponse};
use crate::txn::KeyLocks;

/// Requests that may queue per shard before senders are pushed back.
/// Deep enough to ride out pipelined bursts; shallow enough that an
/// overloaded shard can't hoard unbounded work.
const SHARD_QUEUE_DEPTH: usize = 256;

/// Engine-wide settings: the template each shard's config is stamped
/// from.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Per-shard configuration (memory limit).
    pub shard: ShardConfig,
}

/// The sharded engine. Owns handles to all shard tasks and routes
/// requests by key hash.
///
/// Cloning an engine copies channel senders and an `Arc`, nothing
/// more, so every connection gets its own handle.
#[derive(Debug, Clone)]
pub struct Engine {
    shards: Vec<ShardHandle>,
    locks: KeyLocks,
}

impl Engine {
    /// Spawns `shard_count` shards with default settings.
    pub fn new(shard_count: usize) -> Self {
        Self::with_config(shard_count, EngineConfig::default())
    }

    /// Spawns `shard_count` shard tasks, stamping each with its id.
    ///
    /// A zero shard count is a configuration bug, not a runtime
    /// condition, so it panics.
    pub fn with_config(shard_count: usize, config: EngineConfig) -> Self {
        assert!(shard_count > 0, "engine needs at least one shard");

        let mut shards = Vec::with_capacity(shard_count);
        for id in 0..shard_count {
            let mut shard_config = config.shard.clone();
            shard_config.shard_id = id as u16;
            shards.push(shard::spawn_shard(SHARD_QUEUE_DEPTH, shard_config));
        }

        Self {
            shards,
            locks: KeyLocks::new(),
        }
    }

    /// Number of shards this engine runs.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Runs a single-key command as a single-hop transaction: the key
    /// is locked, the request runs on its shard, the lock drops.
    pub async fn single_hop(
        &self,
        key: &str,
        request: ShardRequest,
    ) -> Result<ShardResponse, ShardError> {
        let _guard = self.locks.lock(key).await;
        let idx = self.shard_for_key(key);
        self.shards[idx].send(request).await
    }

    /// Runs one single-key request per key, locking all keys up front
    /// and dispatching to their shards concurrently. Responses come
    /// back in key order.
    ///
    /// Used by DEL / EXISTS over several keys.
    pub async fn multi_key<F>(
        &self,
        keys: &[String],
        make_req: F,
    ) -> Result<Vec<ShardResponse>, ShardError>
    where
        F: Fn(String) -> ShardRequest,
    {
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let _guards = self.locks.lock_many(&refs).await;

        let mut pending = Vec::with_capacity(keys.len());
        for key in keys {
            let idx = self.shard_for_key(key);
            pending.push(self.shards[idx].enqueue(make_req(key.clone())).await?);
        }

        let mut responses = Vec::with_capacity(pending.len());
        for rx in pending {
            responses.push(rx.await.map_err(|_| ShardError::Unavailable)?);
        }
        Ok(responses)
    }

    /// Sends a request to every shard and collects all responses.
    ///
    /// Used for commands like DBSIZE that need data from all shards.
    /// The request factory `make_req` is called once per shard.
    pub async fn broadcast<F>(&self, make_req: F) -> Result<Vec<ShardResponse>, ShardError>
    where
        F: Fn() -> ShardRequest,
    {
        let mut pending = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            pending.push(shard.enqueue(make_req()).await?);
        }

        let mut responses = Vec::with_capacity(pending.len());
        for rx in pending {
            responses.push(rx.await.map_err(|_| ShardError::Unavailable)?);
        }
        Ok(responses)
    }

    /// ZUNIONSTORE / ZINTERSTORE: the two-phase fold-and-store
    /// transaction described in the module docs.
    ///
    /// On success returns `Count(stored_cardinality)`. A wrong-typed
    /// input key or a NaN produced by the algebra aborts before the
    /// store leg and surfaces as the corresponding response.
    pub async fn zset_fold_store(
        &self,
        dest: &str,
        keys: &[String],
        weights: &[f64],
        op: SetOp,
        agg: Aggregate,
    ) -> Result<ShardResponse, ShardError> {
        debug_assert_eq!(keys.len(), weights.len());

        // lock the whole key set (dest included) for both phases
        let mut lock_keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        lock_keys.push(dest);
        let _guards = self.locks.lock_many(&lock_keys).await;

        // phase A: gather — one request per shard owning input keys
        let mut per_shard: AHashMap<usize, Vec<(String, f64)>> = AHashMap::new();
        for (key, weight) in keys.iter().zip(weights) {
            per_shard
                .entry(self.shard_for_key(key))
                .or_default()
                .push((key.clone(), *weight));
        }

        let mut pending = Vec::with_capacity(per_shard.len());
        for (idx, shard_keys) in per_shard {
            let req = ShardRequest::ZGather {
                keys: shard_keys,
                op,
                agg,
            };
            pending.push(self.shards[idx].enqueue(req).await?);
        }

        // combine shard contributions with the same merge primitives
        let mut result: Option<ScoredMap> = None;
        let mut inter_empty = false;
        for rx in pending {
            let mut map = match rx.await.map_err(|_| ShardError::Unavailable)? {
                ShardResponse::Map(map) => map,
                // WrongType / ScoreNan abort the transaction: no store leg
                other => return Ok(other),
            };

            if op == SetOp::Inter && map.is_empty() {
                inter_empty = true;
                continue;
            }

            match result.as_mut() {
                None => result = Some(map),
                Some(dest_map) => {
                    let merged = match op {
                        SetOp::Union => aggregate::union_into(dest_map, &mut map, agg),
                        SetOp::Inter => aggregate::inter_into(dest_map, &mut map, agg),
                    };
                    if merged.is_err() {
                        return Ok(ShardResponse::ScoreNan);
                    }
                }
            }
        }

        let merged = if inter_empty {
            ScoredMap::new()
        } else {
            result.unwrap_or_default()
        };

        // phase B: store on the destination shard
        let members: Vec<(f64, String)> = merged.into_iter().map(|(m, s)| (s, m)).collect();
        let idx = self.shard_for_key(dest);
        self.shards[idx]
            .send(ShardRequest::ZStore {
                key: dest.to_owned(),
                members,
            })
            .await
    }

    /// Maps a key to its owning shard.
    fn shard_for_key(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::ZAddReply;
    use crate::types::sorted_set::ZAddFlags;

    fn zadd_req(key: &str, members: &[(f64, &str)]) -> ShardRequest {
        ShardRequest::ZAdd {
            key: key.into(),
            flags: ZAddFlags::default(),
            members: members.iter().map(|(s, m)| (*s, m.to_string())).collect(),
        }
    }

    async fn zadd(engine: &Engine, key: &str, members: &[(f64, &str)]) {
        let resp = engine.single_hop(key, zadd_req(key, members)).await.unwrap();
        assert!(matches!(resp, ShardResponse::ZAdd(ZAddReply::Count(_))));
    }

    async fn card(engine: &Engine, key: &str) -> usize {
        match engine
            .single_hop(key, ShardRequest::ZCard { key: key.into() })
            .await
            .unwrap()
        {
            ShardResponse::Count(n) => n,
            other => panic!("expected Count, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn routes_to_consistent_shard() {
        let engine = Engine::new(4);
        zadd(&engine, "key", &[(1.0, "a")]).await;
        assert_eq!(card(&engine, "key").await, 1);
    }

    #[tokio::test]
    async fn union_store_across_shards() {
        let engine = Engine::new(4);
        zadd(&engine, "k1", &[(1.0, "a"), (2.0, "b")]).await;
        zadd(&engine, "k2", &[(10.0, "b"), (20.0, "c")]).await;

        let resp = engine
            .zset_fold_store(
                "out",
                &["k1".into(), "k2".into()],
                &[1.0, 1.0],
                SetOp::Union,
                Aggregate::Sum,
            )
            .await
            .unwrap();
        assert!(matches!(resp, ShardResponse::Count(3)));

        let resp = engine
            .single_hop(
                "out",
                ShardRequest::ZScore {
                    key: "out".into(),
                    member: "b".into(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(resp, ShardResponse::Score(Some(s)) if s == 12.0));
    }

    #[tokio::test]
    async fn inter_store_with_missing_key_clears_dest() {
        let engine = Engine::new(2);
        zadd(&engine, "k1", &[(1.0, "a")]).await;
        zadd(&engine, "dest", &[(5.0, "old")]).await;

        let resp = engine
            .zset_fold_store(
                "dest",
                &["k1".into(), "missing".into()],
                &[1.0, 1.0],
                SetOp::Inter,
                Aggregate::Sum,
            )
            .await
            .unwrap();
        assert!(matches!(resp, ShardResponse::Count(0)));
        // the old destination value is gone
        assert_eq!(card(&engine, "dest").await, 0);
    }

    #[tokio::test]
    async fn inter_store_combines_across_shards() {
        let engine = Engine::new(4);
        zadd(&engine, "k1", &[(1.0, "a"), (2.0, "b"), (3.0, "c")]).await;
        zadd(&engine, "k2", &[(10.0, "b"), (20.0, "c"), (30.0, "d")]).await;

        let resp = engine
            .zset_fold_store(
                "out",
                &["k1".into(), "k2".into()],
                &[1.0, 1.0],
                SetOp::Inter,
                Aggregate::Max,
            )
            .await
            .unwrap();
        assert!(matches!(resp, ShardResponse::Count(2)));

        let resp = engine
            .single_hop(
                "out",
                ShardRequest::ZScore {
                    key: "out".into(),
                    member: "c".into(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(resp, ShardResponse::Score(Some(s)) if s == 20.0));
    }

    #[tokio::test]
    async fn union_wrongtype_aborts_store() {
        let engine = Engine::new(2);
        let resp = engine
            .single_hop(
                "str",
                ShardRequest::Set {
                    key: "str".into(),
                    value: bytes::Bytes::from("v"),
                },
            )
            .await
            .unwrap();
        assert!(matches!(resp, ShardResponse::Ok));
        zadd(&engine, "dest", &[(1.0, "keep")]).await;

        let resp = engine
            .zset_fold_store(
                "dest",
                &["str".into()],
                &[1.0],
                SetOp::Union,
                Aggregate::Sum,
            )
            .await
            .unwrap();
        assert!(matches!(resp, ShardResponse::WrongType));
        // aborted before the store leg — dest untouched
        assert_eq!(card(&engine, "dest").await, 1);
    }

    #[tokio::test]
    async fn multi_key_del() {
        let engine = Engine::new(4);
        zadd(&engine, "a", &[(1.0, "m")]).await;
        zadd(&engine, "b", &[(1.0, "m")]).await;

        let responses = engine
            .multi_key(&["a".into(), "b".into(), "c".into()], |key| {
                ShardRequest::Del { key }
            })
            .await
            .unwrap();
        let deleted = responses
            .iter()
            .filter(|r| matches!(r, ShardResponse::Bool(true)))
            .count();
        assert_eq!(deleted, 2);
    }

    #[tokio::test]
    async fn broadcast_dbsize() {
        let engine = Engine::new(4);
        for key in ["a", "b", "c", "d", "e"] {
            zadd(&engine, key, &[(1.0, "m")]).await;
        }
        let responses = engine.broadcast(|| ShardRequest::DbSize).await.unwrap();
        let total: usize = responses
            .iter()
            .map(|r| match r {
                ShardResponse::Count(n) => *n,
                _ => 0,
            })
            .sum();
        assert_eq!(total, 5);
    }
}
