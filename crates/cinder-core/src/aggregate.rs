//! Scored-map algebra for ZUNIONSTORE / ZINTERSTORE.
//!
//! Shard callbacks reduce their local keys to an unordered member→score
//! map; the same two merge primitives then fold maps together both
//! inside a shard and across shards on the coordinator. Both merges use
//! the smaller-into-larger trick: iterate the smaller operand, and when
//! that means iterating the destination, swap the buffers afterward so
//! the result always lands in `dest`.
//!
//! Merging consumes both operands.

use ahash::AHashMap;

/// Unordered member→score map used as the set-algebra intermediate.
pub type ScoredMap = AHashMap<String, f64>;

/// Marker error: a combination produced NaN (e.g. `inf + -inf` under
/// SUM, or a 0 × inf weight upstream). The command must fail rather
/// than store a NaN score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NanScore;

/// How two scores for the same member combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Aggregate::Sum => a + b,
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

/// Which set operation a gather performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Inter,
}

/// Folds `src` into `dest` as a union: members of either side survive,
/// collisions combine via the aggregate.
pub fn union_into(dest: &mut ScoredMap, src: &mut ScoredMap, agg: Aggregate) -> Result<(), NanScore> {
    if src.len() > dest.len() {
        std::mem::swap(dest, src);
    }
    for (member, score) in src.drain() {
        match dest.entry(member) {
            std::collections::hash_map::Entry::Occupied(mut e) => {
                let combined = agg.apply(*e.get(), score);
                if combined.is_nan() {
                    return Err(NanScore);
                }
                *e.get_mut() = combined;
            }
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(score);
            }
        }
    }
    Ok(())
}

/// Folds `src` into `dest` as an intersection: only members on both
/// sides survive, combined via the aggregate.
pub fn inter_into(dest: &mut ScoredMap, src: &mut ScoredMap, agg: Aggregate) -> Result<(), NanScore> {
    if src.len() > dest.len() {
        std::mem::swap(dest, src);
    }
    let mut out = ScoredMap::with_capacity(src.len().min(dest.len()));
    for (member, score) in src.drain() {
        if let Some(&other) = dest.get(&member) {
            let combined = agg.apply(score, other);
            if combined.is_nan() {
                return Err(NanScore);
            }
            out.insert(member, combined);
        }
    }
    *dest = out;
    Ok(())
}
