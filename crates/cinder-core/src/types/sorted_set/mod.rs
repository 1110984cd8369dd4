//! Sorted set: unique string members ordered by (score, member).
//!
//! Two representations back the same semantics. Small sets live in a
//! packed byte buffer; once a member exceeds [`MAX_PACKED_VALUE`] bytes
//! or the cardinality passes [`MAX_PACKED_ENTRIES`], the set is rebuilt
//! as a skiplist + hashmap pair. The transition is one-way — a set that
//! has been promoted never packs itself back down.
//!
//! Scores are IEEE-754 doubles; ±inf are legal, NaN never is.

pub mod indexed;
pub mod packed;
pub mod range;
mod skiplist;

pub use indexed::IndexedSet;
pub use packed::{PackedSet, MAX_PACKED_ENTRIES, MAX_PACKED_VALUE};

/// Conditions and modifiers for an add operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZAddFlags {
    /// Only add new members, never update existing scores.
    pub nx: bool,
    /// Only update existing members, never add new ones.
    pub xx: bool,
    /// Only apply when the new score is strictly greater than the old.
    pub gt: bool,
    /// Only apply when the new score is strictly less than the old.
    pub lt: bool,
    /// Count updated members in the reply alongside added ones.
    pub ch: bool,
    /// The score argument is an increment; the reply is the new score.
    pub incr: bool,
}

/// What a single add did to the set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddAction {
    /// A new member was inserted.
    Added,
    /// An existing member's score changed.
    Updated { prev: f64 },
    /// Nothing changed: a flag gated the write or the score was equal.
    Nop,
}

/// Result of an increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IncrOutcome {
    /// The member's new score.
    Score(f64),
    /// A flag (NX/XX/GT/LT) suppressed the increment.
    Gated,
    /// The increment produced NaN (inf + -inf); the set is unchanged.
    Nan,
}

/// A sorted set behind one of its two encodings.
#[derive(Debug)]
pub enum SortedSet {
    Packed(PackedSet),
    Indexed(IndexedSet),
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedSet {
    /// Creates an empty set in the packed encoding.
    pub fn new() -> Self {
        SortedSet::Packed(PackedSet::new())
    }

    /// Creates an empty set, choosing the encoding from the length of
    /// the first member about to be inserted. A member too long for the
    /// packed layout starts the set out indexed.
    pub fn for_member_len(len: usize) -> Self {
        if len > MAX_PACKED_VALUE {
            SortedSet::Indexed(IndexedSet::new())
        } else {
            SortedSet::Packed(PackedSet::new())
        }
    }

    pub fn is_packed(&self) -> bool {
        matches!(self, SortedSet::Packed(_))
    }

    pub fn len(&self) -> usize {
        match self {
            SortedSet::Packed(p) => p.len(),
            SortedSet::Indexed(ix) => ix.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        match self {
            SortedSet::Packed(p) => p.score(member),
            SortedSet::Indexed(ix) => ix.score(member),
        }
    }

    /// 0-based rank under forward ordering; `reverse` flips it.
    pub fn rank(&self, member: &str, reverse: bool) -> Option<usize> {
        match self {
            SortedSet::Packed(p) => {
                let rank = p.rank(member)?;
                Some(if reverse { p.len() - 1 - rank } else { rank })
            }
            SortedSet::Indexed(ix) => ix.rank(member, reverse),
        }
    }

    /// Iterates (member, score) in forward order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (&str, f64)> + '_> {
        match self {
            SortedSet::Packed(p) => Box::new(p.iter()),
            SortedSet::Indexed(ix) => Box::new(ix.iter()),
        }
    }

    /// Adds or updates a member under the flag matrix. Equal scores and
    /// gated writes report [`AddAction::Nop`].
    pub fn add(&mut self, member: &str, score: f64, flags: &ZAddFlags) -> AddAction {
        debug_assert!(!score.is_nan(), "scores are never NaN");

        match self.score(member) {
            Some(prev) => {
                if flags.nx
                    || (flags.gt && score <= prev)
                    || (flags.lt && score >= prev)
                    || score == prev
                {
                    return AddAction::Nop;
                }
                self.reposition(member, score);
                AddAction::Updated { prev }
            }
            None => {
                if flags.xx {
                    return AddAction::Nop;
                }
                self.insert_new(member, score);
                AddAction::Added
            }
        }
    }

    /// Adds `delta` to a member's score, creating it at `delta` when
    /// absent. GT/LT/NX/XX gate the write the same way they gate adds.
    pub fn increment(&mut self, member: &str, delta: f64, flags: &ZAddFlags) -> IncrOutcome {
        match self.score(member) {
            Some(prev) => {
                if flags.nx {
                    return IncrOutcome::Gated;
                }
                let next = prev + delta;
                if next.is_nan() {
                    return IncrOutcome::Nan;
                }
                if (flags.gt && next <= prev) || (flags.lt && next >= prev) {
                    return IncrOutcome::Gated;
                }
                if next != prev {
                    self.reposition(member, next);
                }
                IncrOutcome::Score(next)
            }
            None => {
                if flags.xx {
                    return IncrOutcome::Gated;
                }
                self.insert_new(member, delta);
                IncrOutcome::Score(delta)
            }
        }
    }

    /// Removes a member. Returns `true` if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match self {
            SortedSet::Packed(p) => p.remove(member).is_some(),
            SortedSet::Indexed(ix) => ix.remove(member).is_some(),
        }
    }

    /// Moves an existing member to a new score.
    fn reposition(&mut self, member: &str, score: f64) {
        match self {
            SortedSet::Packed(p) => {
                p.insert(member, score);
            }
            SortedSet::Indexed(ix) => {
                ix.update(member, score);
            }
        }
    }

    /// Inserts a member known to be absent, promoting first when the
    /// insert would violate the packed limits.
    fn insert_new(&mut self, member: &str, score: f64) {
        if let SortedSet::Packed(p) = self {
            if member.len() > MAX_PACKED_VALUE || p.len() + 1 > MAX_PACKED_ENTRIES {
                self.promote();
            }
        }
        match self {
            SortedSet::Packed(p) => {
                p.insert(member, score);
            }
            SortedSet::Indexed(ix) => ix.insert_new(member, score),
        }
    }

    /// Rebuilds the set as indexed. The packed buffer is walked in
    /// order and freed only after the new structure is complete.
    fn promote(&mut self) {
        let SortedSet::Packed(p) = self else {
            return;
        };
        let mut ix = IndexedSet::new();
        for (member, score) in p.iter() {
            ix.insert_new(member, score);
        }
        *self = SortedSet::Indexed(ix);
    }

    /// Fixed memory cost of an empty set, for the keyspace accounting.
    pub const BASE_OVERHEAD: usize = 64;

    /// Estimated memory cost of storing one member.
    ///
    /// Packed entries cost their wire size; indexed members pay for the
    /// skiplist node, the hashmap entry, and two copies of the string.
    /// The indexed estimate is used for reservations because it is the
    /// larger of the two.
    pub fn estimated_member_cost(member: &str) -> usize {
        const NODE_OVERHEAD: usize = 96;
        const HASHMAP_ENTRY: usize = 56;
        NODE_OVERHEAD + HASHMAP_ENTRY + member.len() * 2 + 8
    }

    /// Estimated total memory usage of this set.
    pub fn memory_usage(&self) -> usize {
        match self {
            SortedSet::Packed(p) => Self::BASE_OVERHEAD + p.buf_capacity(),
            SortedSet::Indexed(ix) => {
                let members: usize = ix.iter().map(|(m, _)| Self::estimated_member_cost(m)).sum();
                Self::BASE_OVERHEAD + members
            }
        }
    }
}
