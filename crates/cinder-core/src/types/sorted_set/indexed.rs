//! Indexed sorted-set encoding: skiplist + hashmap.
//!
//! The skiplist orders (score, member) pairs; the hashmap answers
//! member→score lookups in O(1). Every mutation goes through both
//! structures, and they must agree exactly on membership — a mismatch
//! is a broken invariant, not a recoverable error.

use ahash::AHashMap;

use super::range::{LexInterval, ScoreInterval};
use super::skiplist::SkipList;

/// A sorted set large (or wide) enough to need real indexing.
#[derive(Debug, Default)]
pub struct IndexedSet {
    list: SkipList,
    scores: AHashMap<String, f64>,
}

impl IndexedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.scores.len(), self.list.len());
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Inserts a member known to be absent.
    ///
    /// Disagreement between the two structures is an unrecoverable
    /// invariant break, so these checks are hard asserts: continuing
    /// with a diverged index would corrupt every later answer.
    pub fn insert_new(&mut self, member: &str, score: f64) {
        let prev = self.scores.insert(member.to_owned(), score);
        assert!(prev.is_none(), "insert_new on existing member");
        self.list.insert(member, score);
    }

    /// Re-scores an existing member. Returns the previous score.
    pub fn update(&mut self, member: &str, score: f64) -> f64 {
        let slot = self
            .scores
            .get_mut(member)
            .expect("update on missing member");
        let prev = *slot;
        *slot = score;
        let deleted = self.list.delete(member, prev);
        assert!(deleted, "skiplist and hashmap disagree on membership");
        self.list.insert(member, score);
        prev
    }

    /// Removes a member from both structures.
    pub fn remove(&mut self, member: &str) -> Option<f64> {
        let score = self.scores.remove(member)?;
        let deleted = self.list.delete(member, score);
        assert!(deleted, "skiplist and hashmap disagree on membership");
        Some(score)
    }

    /// 0-based rank under forward ordering; `reverse` flips it.
    pub fn rank(&self, member: &str, reverse: bool) -> Option<usize> {
        let score = self.score(member)?;
        let rank = self.list.rank_of(member, score)? as usize;
        // skiplist ranks are 1-based
        Some(if reverse { self.len() - rank } else { rank - 1 })
    }

    /// Iterates (member, score) in forward order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        let mut cur = self.list.first();
        std::iter::from_fn(move || {
            let id = cur?;
            cur = self.list.next(id);
            Some((self.list.member(id), self.list.score(id)))
        })
    }

    /// Extracts `count` elements starting at 0-based rank `start`.
    pub fn range_by_rank(&self, start: usize, count: usize, reverse: bool) -> Vec<(String, f64)> {
        let len = self.len();
        let mut out = Vec::with_capacity(count);

        // translate the 0-based offset into a 1-based skiplist rank,
        // counting from the far end for reverse scans
        let mut cur = if reverse {
            self.list.element_by_rank((len - start) as u32)
        } else {
            self.list.element_by_rank(start as u32 + 1)
        };

        while let Some(id) = cur {
            if out.len() == count {
                break;
            }
            out.push((self.list.member(id).to_owned(), self.list.score(id)));
            cur = if reverse {
                self.list.prev(id)
            } else {
                self.list.next(id)
            };
        }
        out
    }

    /// Extracts elements inside a normalized score interval. The caller
    /// has already swapped endpoints for reverse scans.
    pub fn range_by_score(
        &self,
        range: &ScoreInterval,
        reverse: bool,
        offset: usize,
        limit: usize,
    ) -> Vec<(String, f64)> {
        let start = if reverse {
            self.list.last_in_score_range(range)
        } else {
            self.list.first_in_score_range(range)
        };
        self.walk(start, reverse, offset, limit, |_, s| {
            if reverse {
                range.min_ok(s)
            } else {
                range.max_ok(s)
            }
        })
    }

    /// Extracts elements inside a normalized lex interval.
    pub fn range_by_lex(
        &self,
        range: &LexInterval,
        reverse: bool,
        offset: usize,
        limit: usize,
    ) -> Vec<(String, f64)> {
        let start = if reverse {
            self.list.last_in_lex_range(range)
        } else {
            self.list.first_in_lex_range(range)
        };
        self.walk(start, reverse, offset, limit, |m, _| {
            if reverse {
                range.min_ok(m)
            } else {
                range.max_ok(m)
            }
        })
    }

    /// Shared scan loop: skip `offset` nodes blindly, then emit while
    /// the boundary predicate holds and the limit allows.
    fn walk(
        &self,
        start: Option<super::skiplist::NodeId>,
        reverse: bool,
        offset: usize,
        limit: usize,
        in_range: impl Fn(&str, f64) -> bool,
    ) -> Vec<(String, f64)> {
        let step = |id| {
            if reverse {
                self.list.prev(id)
            } else {
                self.list.next(id)
            }
        };

        let mut cur = start;
        for _ in 0..offset {
            match cur {
                Some(id) => cur = step(id),
                None => return Vec::new(),
            }
        }

        let mut out = Vec::new();
        while let Some(id) = cur {
            if out.len() == limit {
                break;
            }
            let member = self.list.member(id);
            let score = self.list.score(id);
            if !in_range(member, score) {
                break;
            }
            out.push((member.to_owned(), score));
            cur = step(id);
        }
        out
    }

    /// Counts members inside a score interval using rank arithmetic:
    /// two O(log N) lookups instead of a walk.
    pub fn count_by_score(&self, range: &ScoreInterval) -> usize {
        let Some(first) = self.list.first_in_score_range(range) else {
            return 0;
        };
        let first_rank = self
            .list
            .rank_of(self.list.member(first), self.list.score(first))
            .expect("node reachable from range lookup has a rank");
        let mut count = self.len() - (first_rank as usize - 1);

        if let Some(last) = self.list.last_in_score_range(range) {
            let last_rank = self
                .list
                .rank_of(self.list.member(last), self.list.score(last))
                .expect("node reachable from range lookup has a rank");
            count -= self.len() - last_rank as usize;
        }
        count
    }

    /// Counts members inside a lex interval using rank arithmetic.
    pub fn count_by_lex(&self, range: &LexInterval) -> usize {
        let Some(first) = self.list.first_in_lex_range(range) else {
            return 0;
        };
        let first_rank = self
            .list
            .rank_of(self.list.member(first), self.list.score(first))
            .expect("node reachable from range lookup has a rank");
        let mut count = self.len() - (first_rank as usize - 1);

        if let Some(last) = self.list.last_in_lex_range(range) {
            let last_rank = self
                .list
                .rank_of(self.list.member(last), self.list.score(last))
                .expect("node reachable from range lookup has a rank");
            count -= self.len() - last_rank as usize;
        }
        count
    }

    /// Deletes the 1-based inclusive rank span, keeping both structures
    /// in sync. Returns the removed count.
    pub fn delete_range_by_rank(&mut self, start: u32, end: u32) -> usize {
        let scores = &mut self.scores;
        self.list.delete_range_by_rank(start, end, |member| {
            scores.remove(member);
        })
    }

    /// Deletes members inside the score interval. Returns the count.
    pub fn delete_range_by_score(&mut self, range: &ScoreInterval) -> usize {
        let scores = &mut self.scores;
        self.list.delete_range_by_score(range, |member| {
            scores.remove(member);
        })
    }

    /// Deletes members inside the lex interval. Returns the count.
    pub fn delete_range_by_lex(&mut self, range: &LexInterval) -> usize {
        let scores = &mut self.scores;
        self.list.delete_range_by_lex(range, |member| {
            scores.remove(member);
        })
    }

    /// One page of a cursor scan: up to `page` elements starting at
    /// position `cursor`. Returns the next cursor (0 when exhausted).
    pub fn scan_page(&self, cursor: u64, page: usize) -> (u64, Vec<(String, f64)>) {
        let start = cursor as usize;
        if start >= self.len() {
            return (0, Vec::new());
        }
        let items = self.range_by_rank(start, page, false);
        let consumed = start + items.len();
        let next = if consumed >= self.len() {
            0
        } else {
            consumed as u64
        };
        (next, items)
    }
}

#[cfg(test)]
mod tests {
    use super::super::range::ScoreBound;
    use super::*;

    fn filled(pairs: &[(&str, f64)]) -> IndexedSet {
        let mut ix = IndexedSet::new();
        for (m, s) in pairs {
            ix.insert_new(m, *s);
        }
        ix
    }

    #[test]
    fn insert_update_remove_keep_both_sides_in_sync() {
        let mut ix = filled(&[("a", 1.0), ("b", 2.0)]);
        assert_eq!(ix.len(), 2);
        assert_eq!(ix.score("a"), Some(1.0));

        assert_eq!(ix.update("a", 5.0), 1.0);
        assert_eq!(ix.score("a"), Some(5.0));
        assert_eq!(ix.rank("a", false), Some(1));

        assert_eq!(ix.remove("a"), Some(5.0));
        assert_eq!(ix.remove("a"), None);
        assert_eq!(ix.len(), 1);
    }

    #[test]
    fn forward_and_reverse_ranks() {
        let ix = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        assert_eq!(ix.rank("a", false), Some(0));
        assert_eq!(ix.rank("c", false), Some(2));
        assert_eq!(ix.rank("a", true), Some(2));
        assert_eq!(ix.rank("c", true), Some(0));
        assert_eq!(ix.rank("zz", false), None);
    }

    #[test]
    fn rank_ranges_both_directions() {
        let ix = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        let fwd = ix.range_by_rank(1, 2, false);
        assert_eq!(fwd[0].0, "b");
        assert_eq!(fwd[1].0, "c");

        let rev = ix.range_by_rank(0, 2, true);
        assert_eq!(rev[0].0, "d");
        assert_eq!(rev[1].0, "c");
    }

    #[test]
    fn score_range_walk_with_offset_and_limit() {
        let ix = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        let range = ScoreInterval {
            min: ScoreBound::inclusive(1.0),
            max: ScoreBound::inclusive(4.0),
        };
        let items = ix.range_by_score(&range, false, 1, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, "b");
        assert_eq!(items[1].0, "c");

        let rev = ix.range_by_score(&range, true, 0, 1);
        assert_eq!(rev[0].0, "d");
    }

    #[test]
    fn count_by_score_rank_arithmetic() {
        let ix = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        let mid = ScoreInterval {
            min: ScoreBound::exclusive(1.0),
            max: ScoreBound::inclusive(3.0),
        };
        assert_eq!(ix.count_by_score(&mid), 2);
        assert_eq!(ix.count_by_score(&ScoreInterval::all()), 4);

        let none = ScoreInterval {
            min: ScoreBound::inclusive(100.0),
            max: ScoreBound::inclusive(200.0),
        };
        assert_eq!(ix.count_by_score(&none), 0);
    }

    #[test]
    fn delete_ranges_update_hashmap() {
        let mut ix = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        assert_eq!(ix.delete_range_by_rank(1, 2), 2);
        assert_eq!(ix.len(), 2);
        assert_eq!(ix.score("b"), None);
        assert_eq!(ix.score("c"), None);
        assert_eq!(ix.score("a"), Some(1.0));

        let range = ScoreInterval::all();
        assert_eq!(ix.delete_range_by_score(&range), 2);
        assert!(ix.is_empty());
    }

    #[test]
    fn scan_pages_cover_everything_once() {
        let mut ix = IndexedSet::new();
        for i in 0..45 {
            ix.insert_new(&format!("m{i:02}"), f64::from(i));
        }

        let mut cursor = 0u64;
        let mut seen = Vec::new();
        loop {
            let (next, items) = ix.scan_page(cursor, 20);
            seen.extend(items.into_iter().map(|(m, _)| m));
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen.len(), 45);
        seen.dedup();
        assert_eq!(seen.len(), 45);
    }
}
