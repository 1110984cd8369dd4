//! Interval types and the range/remove evaluator.
//!
//! A sorted set can be addressed through three ordering domains: rank
//! (position), score, and member lexicography. Each domain has its own
//! interval type; [`Interval`] is the sum of the three. One evaluator
//! realizes RANGE and REMOVE for every (domain, encoding) combination,
//! so the per-command code never touches encoding details.
//!
//! Direction handling follows Redis: a reverse scan swaps the interval
//! endpoints up front and then walks backward, terminating against the
//! lower bound.

use super::SortedSet;

/// One endpoint of a score range. `open` means exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub open: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> Self {
        Self { value, open: false }
    }

    pub fn exclusive(value: f64) -> Self {
        Self { value, open: true }
    }
}

/// A score range with independently open/closed endpoints.
/// `-inf`/`+inf` are ordinary bound values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInterval {
    pub min: ScoreBound,
    pub max: ScoreBound,
}

impl ScoreInterval {
    /// Everything from negative to positive infinity.
    pub fn all() -> Self {
        Self {
            min: ScoreBound::inclusive(f64::NEG_INFINITY),
            max: ScoreBound::inclusive(f64::INFINITY),
        }
    }

    /// True when `score` satisfies the lower bound.
    pub fn min_ok(&self, score: f64) -> bool {
        if self.min.open {
            score > self.min.value
        } else {
            score >= self.min.value
        }
    }

    /// True when `score` satisfies the upper bound.
    pub fn max_ok(&self, score: f64) -> bool {
        if self.max.open {
            score < self.max.value
        } else {
            score <= self.max.value
        }
    }

    pub fn contains(&self, score: f64) -> bool {
        self.min_ok(score) && self.max_ok(score)
    }

    /// True when no score can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        self.min.value > self.max.value
            || (self.min.value == self.max.value && (self.min.open || self.max.open))
    }

    /// Returns the interval with endpoints swapped. Reverse scans pass
    /// bounds in caller order (upper first); this normalizes them.
    pub fn swapped(&self) -> Self {
        Self {
            min: self.max,
            max: self.min,
        }
    }
}

/// One endpoint of a lexicographic range over member strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexBound {
    /// `-`: before every member.
    NegInf,
    /// `+`: after every member.
    PosInf,
    /// `(member`: exclusive.
    Open(String),
    /// `[member`: inclusive.
    Closed(String),
}

/// A lexicographic range over members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexInterval {
    pub min: LexBound,
    pub max: LexBound,
}

impl LexInterval {
    /// True when `member` satisfies the lower bound.
    pub fn min_ok(&self, member: &str) -> bool {
        match &self.min {
            LexBound::NegInf => true,
            LexBound::PosInf => false,
            LexBound::Open(s) => member > s.as_str(),
            LexBound::Closed(s) => member >= s.as_str(),
        }
    }

    /// True when `member` satisfies the upper bound.
    pub fn max_ok(&self, member: &str) -> bool {
        match &self.max {
            LexBound::NegInf => false,
            LexBound::PosInf => true,
            LexBound::Open(s) => member < s.as_str(),
            LexBound::Closed(s) => member <= s.as_str(),
        }
    }

    pub fn contains(&self, member: &str) -> bool {
        self.min_ok(member) && self.max_ok(member)
    }

    /// True when no member can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        use LexBound::*;
        match (&self.min, &self.max) {
            (PosInf, _) | (_, NegInf) => true,
            (NegInf, _) | (_, PosInf) => false,
            (Open(a) | Closed(a), Open(b)) | (Open(a), Closed(b)) => a >= b,
            (Closed(a), Closed(b)) => a > b,
        }
    }

    /// Returns the interval with endpoints swapped, for reverse scans.
    pub fn swapped(&self) -> Self {
        Self {
            min: self.max.clone(),
            max: self.min.clone(),
        }
    }
}

/// An interval in one of the three ordering domains.
///
/// Rank endpoints are signed: negative values count back from the tail,
/// both ends inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum Interval {
    Rank(i32, i32),
    Score(ScoreInterval),
    Lex(LexInterval),
}

/// Scan modifiers shared by every range read.
///
/// `limit == u32::MAX` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeParams {
    pub reverse: bool,
    pub with_scores: bool,
    pub offset: u32,
    pub limit: u32,
}

impl Default for RangeParams {
    fn default() -> Self {
        Self {
            reverse: false,
            with_scores: false,
            offset: 0,
            limit: u32::MAX,
        }
    }
}

/// A full range request: the interval plus scan modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec {
    pub interval: Interval,
    pub params: RangeParams,
}

/// Resolves signed rank endpoints against `len`, clamping to the valid
/// index range. Returns `None` when the resolved range is empty.
fn clamp_rank(start: i32, end: i32, len: usize) -> Option<(usize, usize)> {
    let llen = len as i64;
    let mut start = i64::from(start);
    let mut end = i64::from(end);

    if start < 0 {
        start += llen;
    }
    if end < 0 {
        end += llen;
    }
    if start < 0 {
        start = 0;
    }
    if start > end || start >= llen {
        return None;
    }
    if end >= llen {
        end = llen - 1;
    }
    Some((start as usize, end as usize))
}

/// Extracts a range of (member, score) pairs from the set.
///
/// The result is always in scan order: forward scans ascend, reverse
/// scans descend. `with_scores` does not affect the evaluator — the
/// reply layer decides whether to keep the scores.
pub fn range(set: &SortedSet, spec: &RangeSpec) -> Vec<(String, f64)> {
    let params = &spec.params;
    match &spec.interval {
        Interval::Rank(start, end) => {
            let Some((start, end)) = clamp_rank(*start, *end, set.len()) else {
                return Vec::new();
            };
            let count = end - start + 1;
            match set {
                SortedSet::Packed(p) => {
                    if params.reverse {
                        collect(p.iter_rev().skip(start).take(count))
                    } else {
                        collect(p.iter().skip(start).take(count))
                    }
                }
                SortedSet::Indexed(ix) => ix.range_by_rank(start, count, params.reverse),
            }
        }
        Interval::Score(si) => {
            let si = if params.reverse { si.swapped() } else { *si };
            let offset = params.offset as usize;
            let limit = params.limit as usize;
            match set {
                SortedSet::Packed(p) => {
                    if params.reverse {
                        collect(
                            p.iter_rev()
                                .skip_while(|(_, s)| !si.max_ok(*s))
                                .skip(offset)
                                .take_while(|(_, s)| si.min_ok(*s))
                                .take(limit),
                        )
                    } else {
                        collect(
                            p.iter()
                                .skip_while(|(_, s)| !si.min_ok(*s))
                                .skip(offset)
                                .take_while(|(_, s)| si.max_ok(*s))
                                .take(limit),
                        )
                    }
                }
                SortedSet::Indexed(ix) => ix.range_by_score(&si, params.reverse, offset, limit),
            }
        }
        Interval::Lex(li) => {
            let li = if params.reverse {
                li.swapped()
            } else {
                li.clone()
            };
            let offset = params.offset as usize;
            let limit = params.limit as usize;
            match set {
                SortedSet::Packed(p) => {
                    if params.reverse {
                        collect(
                            p.iter_rev()
                                .skip_while(|(m, _)| !li.max_ok(m))
                                .skip(offset)
                                .take_while(|(m, _)| li.min_ok(m))
                                .take(limit),
                        )
                    } else {
                        collect(
                            p.iter()
                                .skip_while(|(m, _)| !li.min_ok(m))
                                .skip(offset)
                                .take_while(|(m, _)| li.max_ok(m))
                                .take(limit),
                        )
                    }
                }
                SortedSet::Indexed(ix) => ix.range_by_lex(&li, params.reverse, offset, limit),
            }
        }
    }
}

fn collect<'a>(iter: impl Iterator<Item = (&'a str, f64)>) -> Vec<(String, f64)> {
    iter.map(|(m, s)| (m.to_owned(), s)).collect()
}

/// Deletes every member the interval selects. Returns the removed count.
///
/// Remove commands have no direction or offset/limit, so only the
/// interval is taken.
pub fn remove_range(set: &mut SortedSet, interval: &Interval) -> usize {
    match (interval, set) {
        (Interval::Rank(start, end), SortedSet::Packed(p)) => {
            match clamp_rank(*start, *end, p.len()) {
                Some((start, end)) => p.delete_rank_span(start, end - start + 1),
                None => 0,
            }
        }
        (Interval::Rank(start, end), SortedSet::Indexed(ix)) => {
            match clamp_rank(*start, *end, ix.len()) {
                // the skiplist speaks 1-based ranks internally
                Some((start, end)) => ix.delete_range_by_rank(start as u32 + 1, end as u32 + 1),
                None => 0,
            }
        }
        (Interval::Score(si), SortedSet::Packed(p)) => p.delete_where(|_, s| si.contains(s)),
        (Interval::Score(si), SortedSet::Indexed(ix)) => ix.delete_range_by_score(si),
        (Interval::Lex(li), SortedSet::Packed(p)) => p.delete_where(|m, _| li.contains(m)),
        (Interval::Lex(li), SortedSet::Indexed(ix)) => ix.delete_range_by_lex(li),
    }
}

/// Counts members inside a score interval.
pub fn count_by_score(set: &SortedSet, si: &ScoreInterval) -> usize {
    match set {
        SortedSet::Packed(p) => p.iter().filter(|(_, s)| si.contains(*s)).count(),
        SortedSet::Indexed(ix) => ix.count_by_score(si),
    }
}

/// Counts members inside a lex interval.
pub fn count_by_lex(set: &SortedSet, li: &LexInterval) -> usize {
    match set {
        SortedSet::Packed(p) => p.iter().filter(|(m, _)| li.contains(m)).count(),
        SortedSet::Indexed(ix) => ix.count_by_lex(li),
    }
}
