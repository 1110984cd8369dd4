//! Shard: an independent partition of the keyspace.
//!
//! Each shard runs as its own tokio task, owning a [`Keyspace`] with no
//! internal locking. Commands arrive over an mpsc channel and responses
//! go back on a per-request oneshot. Because every request runs to
//! completion before the next is taken, a shard callback is atomic with
//! respect to all other traffic on that shard.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::aggregate::{self, Aggregate, ScoredMap, SetOp};
use crate::error::{ShardError, WriteError, WrongType};
use crate::keyspace::{Keyspace, KeyspaceStats, SetResult, ShardConfig, ZAddReply};
use crate::types::sorted_set::range::{Interval, LexInterval, RangeSpec, ScoreInterval};
use crate::types::sorted_set::ZAddFlags;

/// A protocol-agnostic command sent to a shard.
#[derive(Debug)]
pub enum ShardRequest {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Bytes,
    },
    Del {
        key: String,
    },
    Exists {
        key: String,
    },
    /// Returns the key count for this shard.
    DbSize,
    /// Returns keyspace stats for this shard.
    Stats,
    /// Returns the TYPE name for a key.
    ValueType {
        key: String,
    },
    ZAdd {
        key: String,
        flags: ZAddFlags,
        members: Vec<(f64, String)>,
    },
    ZRem {
        key: String,
        members: Vec<String>,
    },
    ZScore {
        key: String,
        member: String,
    },
    ZRank {
        key: String,
        member: String,
        reverse: bool,
    },
    ZCard {
        key: String,
    },
    ZCount {
        key: String,
        interval: ScoreInterval,
    },
    ZLexCount {
        key: String,
        interval: LexInterval,
    },
    ZRange {
        key: String,
        spec: RangeSpec,
    },
    ZRemRange {
        key: String,
        interval: Interval,
    },
    ZScan {
        key: String,
        cursor: u64,
    },
    /// Gather leg of ZUNIONSTORE / ZINTERSTORE: fold this shard's
    /// subset of the input keys into one weighted scored map.
    ZGather {
        keys: Vec<(String, f64)>,
        op: SetOp,
        agg: Aggregate,
    },
    /// Store leg: replace `key` with a sorted set built from `members`.
    ZStore {
        key: String,
        members: Vec<(f64, String)>,
    },
}

/// The shard's response to a request.
#[derive(Debug)]
pub enum ShardResponse {
    /// A string value (or None for a miss).
    Value(Option<Bytes>),
    /// Simple acknowledgement (e.g. SET).
    Ok,
    /// Boolean result (e.g. DEL, EXISTS).
    Bool(bool),
    /// A count: cardinalities, removal counts, key counts.
    Count(usize),
    /// Full stats for a shard (DBSIZE/INFO-style reporting).
    Stats(KeyspaceStats),
    /// TYPE result.
    TypeName(&'static str),
    /// ZSCORE result.
    Score(Option<f64>),
    /// ZRANK / ZREVRANK result.
    Rank(Option<usize>),
    /// ZADD / ZINCRBY outcome.
    ZAdd(ZAddReply),
    /// An ordered list of (member, score) pairs.
    Scored(Vec<(String, f64)>),
    /// One ZSCAN page.
    Scan {
        cursor: u64,
        items: Vec<(String, f64)>,
    },
    /// A gather result for set algebra.
    Map(ScoredMap),
    /// Command used against a key holding the wrong kind of value.
    WrongType,
    /// Memory limit reached; the write was refused.
    OutOfMemory,
    /// Set algebra or an increment produced NaN.
    ScoreNan,
}

/// One queued request plus the channel its response travels back on.
#[derive(Debug)]
pub struct ShardMessage {
    pub request: ShardRequest,
    pub reply: oneshot::Sender<ShardResponse>,
}

/// Cheap, cloneable sender side of a shard's request queue.
///
/// Connections and the engine each hold one of these per shard; the
/// shard task owns the receiving end and drains it serially.
#[derive(Debug, Clone)]
pub struct ShardHandle {
    tx: mpsc::Sender<ShardMessage>,
}

impl ShardHandle {
    /// Round-trips one request: enqueue it, then await the shard's
    /// reply. `Unavailable` means the shard task is gone; either half
    /// of the exchange can observe that.
    pub async fn send(&self, request: ShardRequest) -> Result<ShardResponse, ShardError> {
        let reply = self.enqueue(request).await?;
        match reply.await {
            Ok(response) => Ok(response),
            Err(_) => Err(ShardError::Unavailable),
        }
    }

    /// Enqueues a request and hands back the reply channel unawaited.
    /// This is what lets the engine queue work on several shards in a
    /// phase before blocking on any of them.
    pub(crate) async fn enqueue(
        &self,
        request: ShardRequest,
    ) -> Result<oneshot::Receiver<ShardResponse>, ShardError> {
        let (reply, rx) = oneshot::channel();
        match self.tx.send(ShardMessage { request, reply }).await {
            Ok(()) => Ok(rx),
            Err(_) => Err(ShardError::Unavailable),
        }
    }
}

/// Starts a shard task over a fresh bounded queue and returns its
/// handle. The queue depth is the shard's back-pressure valve: when it
/// fills, senders wait instead of piling up unbounded work.
pub fn spawn_shard(buffer: usize, config: ShardConfig) -> ShardHandle {
    let (tx, rx) = mpsc::channel(buffer);
    tokio::spawn(run_shard(rx, config));
    ShardHandle { tx }
}

/// The shard's main loop: processes messages until the channel closes.
async fn run_shard(mut rx: mpsc::Receiver<ShardMessage>, config: ShardConfig) {
    let shard_id = config.shard_id;
    let mut keyspace = Keyspace::with_config(config);

    while let Some(msg) = rx.recv().await {
        let response = dispatch(&mut keyspace, msg.request);
        let _ = msg.reply.send(response);
    }

    info!(shard_id, "shard shutting down");
}

/// Executes a single request against the keyspace.
fn dispatch(ks: &mut Keyspace, req: ShardRequest) -> ShardResponse {
    match req {
        ShardRequest::Get { key } => match ks.get(&key) {
            Ok(val) => ShardResponse::Value(val),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::Set { key, value } => match ks.set(key, value) {
            SetResult::Ok => ShardResponse::Ok,
            SetResult::OutOfMemory => ShardResponse::OutOfMemory,
        },
        ShardRequest::Del { key } => ShardResponse::Bool(ks.del(&key)),
        ShardRequest::Exists { key } => ShardResponse::Bool(ks.exists(&key)),
        ShardRequest::DbSize => ShardResponse::Count(ks.len()),
        ShardRequest::Stats => ShardResponse::Stats(ks.stats()),
        ShardRequest::ValueType { key } => ShardResponse::TypeName(ks.value_type(&key)),

        ShardRequest::ZAdd {
            key,
            flags,
            members,
        } => match ks.zadd(&key, &members, &flags) {
            Ok(reply @ (ZAddReply::Count(_) | ZAddReply::Incr(_))) => ShardResponse::ZAdd(reply),
            Ok(ZAddReply::Nan) => ShardResponse::ScoreNan,
            Err(WriteError::WrongType) => ShardResponse::WrongType,
            Err(WriteError::OutOfMemory) => ShardResponse::OutOfMemory,
        },
        ShardRequest::ZRem { key, members } => match ks.zrem(&key, &members) {
            Ok(removed) => ShardResponse::Count(removed),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZScore { key, member } => match ks.zscore(&key, &member) {
            Ok(score) => ShardResponse::Score(score),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZRank {
            key,
            member,
            reverse,
        } => match ks.zrank(&key, &member, reverse) {
            Ok(rank) => ShardResponse::Rank(rank),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZCard { key } => match ks.zcard(&key) {
            Ok(count) => ShardResponse::Count(count),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZCount { key, interval } => match ks.zcount(&key, &interval) {
            Ok(count) => ShardResponse::Count(count),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZLexCount { key, interval } => match ks.zlexcount(&key, &interval) {
            Ok(count) => ShardResponse::Count(count),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZRange { key, spec } => match ks.zrange(&key, &spec) {
            Ok(items) => ShardResponse::Scored(items),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZRemRange { key, interval } => match ks.zremrange(&key, &interval) {
            Ok(removed) => ShardResponse::Count(removed),
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZScan { key, cursor } => match ks.zscan(&key, cursor) {
            Ok((cursor, items)) => ShardResponse::Scan { cursor, items },
            Err(WrongType) => ShardResponse::WrongType,
        },
        ShardRequest::ZGather { keys, op, agg } => gather(ks, &keys, op, agg),
        ShardRequest::ZStore { key, members } => {
            ShardResponse::Count(ks.zset_store(&key, &members))
        }
    }
}

/// Folds this shard's input keys into one weighted scored map.
///
/// Union skips missing keys. Intersection short-circuits to an empty
/// map as soon as any key is missing — a member absent from one input
/// cannot be in the result. A wrong-typed key aborts the whole
/// operation, and any NaN (from a weight or an aggregate) does too.
fn gather(ks: &Keyspace, keys: &[(String, f64)], op: SetOp, agg: Aggregate) -> ShardResponse {
    let mut acc: Option<ScoredMap> = None;

    for (key, weight) in keys {
        let mut map = match ks.zset_scored_map(key, *weight) {
            Err(WrongType) => return ShardResponse::WrongType,
            Ok(None) => match op {
                SetOp::Union => continue,
                SetOp::Inter => return ShardResponse::Map(ScoredMap::new()),
            },
            Ok(Some(map)) => map,
        };

        if map.values().any(|s| s.is_nan()) {
            return ShardResponse::ScoreNan;
        }

        match acc.as_mut() {
            None => acc = Some(map),
            Some(dest) => {
                let merged = match op {
                    SetOp::Union => aggregate::union_into(dest, &mut map, agg),
                    SetOp::Inter => aggregate::inter_into(dest, &mut map, agg),
                };
                if merged.is_err() {
                    return ShardResponse::ScoreNan;
                }
            }
        }

        // an intersection that already emptied out can't recover
        if op == SetOp::Inter && acc.as_ref().is_some_and(|m| m.is_empty()) {
            return ShardResponse::Map(ScoredMap::new());
        }
    }

    ShardResponse::Map(acc.unwrap_or_default())
}
