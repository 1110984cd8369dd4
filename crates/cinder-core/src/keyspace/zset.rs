use super::*;

use crate::aggregate::ScoredMap;
use crate::types::sorted_set::range::{self, Interval, LexInterval, RangeSpec, ScoreInterval};
use crate::types::sorted_set::{AddAction, IncrOutcome, SortedSet, ZAddFlags};

/// Page size for one ZSCAN step against the indexed encoding.
pub const SCAN_PAGE: usize = 20;

/// Client-facing outcome of a ZADD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZAddReply {
    /// Number of members added (or added+updated under CH).
    Count(usize),
    /// INCR result: the new score, or `None` when a flag gated it.
    Incr(Option<f64>),
    /// The increment produced NaN; the command must error.
    Nan,
}

impl Keyspace {
    /// Adds members with scores, applying the full flag matrix.
    ///
    /// Creates the sorted set if the key doesn't exist (unless XX).
    /// Deletes the key again if the operation leaves it empty, so an
    /// empty sorted set never survives in the keyspace.
    pub fn zadd(
        &mut self,
        key: &str,
        members: &[(f64, String)],
        flags: &ZAddFlags,
    ) -> Result<ZAddReply, WriteError> {
        debug_assert!(!flags.incr || members.len() == 1);

        let is_new = self.ensure_collection_type(key, |v| matches!(v, Value::SortedSet(_)))?;

        if is_new && flags.xx {
            // nothing to update and nothing may be created
            return Ok(if flags.incr {
                ZAddReply::Incr(None)
            } else {
                ZAddReply::Count(0)
            });
        }

        // worst-case estimate: assume every member is new
        let member_increase: usize = members
            .iter()
            .map(|(_, m)| SortedSet::estimated_member_cost(m))
            .sum();
        self.reserve_memory(is_new, key, SortedSet::BASE_OVERHEAD, member_increase)?;

        if is_new {
            let first_len = members.first().map(|(_, m)| m.len()).unwrap_or(0);
            self.insert_empty(
                key,
                Value::SortedSet(Box::new(SortedSet::for_member_len(first_len))),
            );
        }

        let reply = self
            .track_size(key, |value| {
                let Value::SortedSet(set) = value else {
                    unreachable!("type verified by ensure_collection_type");
                };
                if flags.incr {
                    let (delta, member) = &members[0];
                    match set.increment(member, *delta, flags) {
                        IncrOutcome::Score(s) => ZAddReply::Incr(Some(s)),
                        IncrOutcome::Gated => ZAddReply::Incr(None),
                        IncrOutcome::Nan => ZAddReply::Nan,
                    }
                } else {
                    let mut added = 0;
                    let mut updated = 0;
                    for (score, member) in members {
                        match set.add(member, *score, flags) {
                            AddAction::Added => added += 1,
                            AddAction::Updated { .. } => updated += 1,
                            AddAction::Nop => {}
                        }
                    }
                    ZAddReply::Count(if flags.ch { added + updated } else { added })
                }
            })
            .unwrap_or(ZAddReply::Count(0));

        // e.g. a gated INCR against a key created just above
        self.drop_if_empty_zset(key);
        Ok(reply)
    }

    /// Removes members. Returns how many were actually removed and
    /// deletes the key if the set becomes empty.
    pub fn zrem(&mut self, key: &str, members: &[String]) -> Result<usize, WrongType> {
        self.zset_check(key)?;
        let removed = self
            .track_size(key, |value| {
                let Value::SortedSet(set) = value else {
                    unreachable!("type verified by zset_check");
                };
                members.iter().filter(|m| set.remove(m)).count()
            })
            .unwrap_or(0);
        self.drop_if_empty_zset(key);
        Ok(removed)
    }

    /// Returns the score for a member. `Ok(None)` when either the key
    /// or the member doesn't exist.
    pub fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, WrongType> {
        Ok(self.zset_ref(key)?.and_then(|set| set.score(member)))
    }

    /// 0-based rank of a member under forward (or reverse) ordering.
    pub fn zrank(&self, key: &str, member: &str, reverse: bool) -> Result<Option<usize>, WrongType> {
        Ok(self.zset_ref(key)?.and_then(|set| set.rank(member, reverse)))
    }

    /// Cardinality; 0 for a missing key.
    pub fn zcard(&self, key: &str) -> Result<usize, WrongType> {
        Ok(self.zset_ref(key)?.map(SortedSet::len).unwrap_or(0))
    }

    /// Counts members within a score interval.
    pub fn zcount(&self, key: &str, interval: &ScoreInterval) -> Result<usize, WrongType> {
        Ok(self
            .zset_ref(key)?
            .map(|set| range::count_by_score(set, interval))
            .unwrap_or(0))
    }

    /// Counts members within a lex interval.
    pub fn zlexcount(&self, key: &str, interval: &LexInterval) -> Result<usize, WrongType> {
        Ok(self
            .zset_ref(key)?
            .map(|set| range::count_by_lex(set, interval))
            .unwrap_or(0))
    }

    /// Extracts a range in any of the three interval domains.
    pub fn zrange(&self, key: &str, spec: &RangeSpec) -> Result<Vec<(String, f64)>, WrongType> {
        Ok(self
            .zset_ref(key)?
            .map(|set| range::range(set, spec))
            .unwrap_or_default())
    }

    /// Deletes everything an interval selects; removes the key when the
    /// set empties out.
    pub fn zremrange(&mut self, key: &str, interval: &Interval) -> Result<usize, WrongType> {
        self.zset_check(key)?;
        let removed = self
            .track_size(key, |value| {
                let Value::SortedSet(set) = value else {
                    unreachable!("type verified by zset_check");
                };
                range::remove_range(set, interval)
            })
            .unwrap_or(0);
        self.drop_if_empty_zset(key);
        Ok(removed)
    }

    /// One step of a cursor iteration over (member, score) pairs.
    ///
    /// The packed encoding answers in one shot: every pair, next cursor
    /// 0. The indexed encoding pages through at most [`SCAN_PAGE`]
    /// elements per call.
    pub fn zscan(
        &self,
        key: &str,
        cursor: u64,
    ) -> Result<(u64, Vec<(String, f64)>), WrongType> {
        match self.zset_ref(key)? {
            None => Ok((0, Vec::new())),
            Some(SortedSet::Packed(p)) => {
                let items = p.iter().map(|(m, s)| (m.to_owned(), s)).collect();
                Ok((0, items))
            }
            Some(SortedSet::Indexed(ix)) => Ok(ix.scan_page(cursor, SCAN_PAGE)),
        }
    }

    /// Reduces a sorted set to an unordered member→score map with every
    /// score pre-multiplied by `weight`. `Ok(None)` when the key is
    /// missing — the set-algebra driver treats that per operation.
    pub fn zset_scored_map(
        &self,
        key: &str,
        weight: f64,
    ) -> Result<Option<ScoredMap>, WrongType> {
        Ok(self.zset_ref(key)?.map(|set| {
            set.iter()
                .map(|(m, s)| (m.to_owned(), s * weight))
                .collect()
        }))
    }

    /// The store leg of ZUNIONSTORE / ZINTERSTORE: drop whatever the
    /// destination held and rebuild it from the merged members. An
    /// empty input just deletes the key. Returns the stored cardinality.
    pub fn zset_store(&mut self, key: &str, members: &[(f64, String)]) -> usize {
        self.del(key);
        if members.is_empty() {
            return 0;
        }

        let mut set = SortedSet::for_member_len(members[0].1.len());
        for (score, member) in members {
            set.add(member, *score, &ZAddFlags::default());
        }
        let len = set.len();
        self.insert_empty(key, Value::SortedSet(Box::new(set)));
        len
    }

    /// Borrowing accessor: `Ok(None)` for a missing key, `WrongType`
    /// for a key of another type.
    fn zset_ref(&self, key: &str) -> Result<Option<&SortedSet>, WrongType> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::SortedSet(set)) => Ok(Some(set)),
            Some(_) => Err(WrongType),
        }
    }

    /// Type-only precheck for mutating paths.
    fn zset_check(&self, key: &str) -> Result<(), WrongType> {
        match self.entries.get(key) {
            None | Some(Value::SortedSet(_)) => Ok(()),
            Some(_) => Err(WrongType),
        }
    }

    /// Enforces the "empty sets don't exist" invariant after a mutation.
    fn drop_if_empty_zset(&mut self, key: &str) {
        if let Some(Value::SortedSet(set)) = self.entries.get(key) {
            if set.is_empty() {
                self.del(key);
            }
        }
    }
}
