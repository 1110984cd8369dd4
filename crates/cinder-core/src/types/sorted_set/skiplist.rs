//! Probabilistic skiplist keyed by (score, member).
//!
//! Nodes live in a slab (`Vec<Node>` plus a free list) and reference
//! each other by index, so there are no pointer cycles to manage and
//! handles stay valid across unrelated mutations. Each level-i link
//! carries a span — the number of elements it skips — which is what
//! makes rank queries O(log N) instead of a walk.
//!
//! Levels are drawn from a geometric distribution with p = 0.25, capped
//! at 32, matching the classic Redis parameters. One backward link at
//! level 0 supports reverse iteration.
//!
//! Ranks are 1-based here; the public sorted-set API translates to
//! 0-based at the boundary.

use ordered_float::OrderedFloat;
use rand::Rng;

use super::range::{LexInterval, ScoreInterval};

const MAX_LEVEL: usize = 32;
const LEVEL_P: f64 = 0.25;

/// Slab index of a node. `NIL` plays the role of a null pointer; it is
/// also used for the header pseudo-node in traversal bookkeeping.
pub(super) type NodeId = u32;
pub(super) const NIL: NodeId = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Link {
    next: NodeId,
    /// Number of elements this link skips over (including the target).
    span: u32,
}

const EMPTY_LINK: Link = Link { next: NIL, span: 0 };

#[derive(Debug)]
struct Node {
    member: String,
    score: f64,
    backward: NodeId,
    links: Vec<Link>,
}

/// An ordered index over (score, member) pairs.
#[derive(Debug)]
pub(super) struct SkipList {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    head: [Link; MAX_LEVEL],
    level: usize,
    len: usize,
    tail: NodeId,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: [EMPTY_LINK; MAX_LEVEL],
            level: 1,
            len: 0,
            tail: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn member(&self, id: NodeId) -> &str {
        &self.nodes[id as usize].member
    }

    pub fn score(&self, id: NodeId) -> f64 {
        self.nodes[id as usize].score
    }

    /// First node in order, if any.
    pub fn first(&self) -> Option<NodeId> {
        opt(self.head[0].next)
    }

    /// Last node in order, if any.
    pub fn last(&self) -> Option<NodeId> {
        opt(self.tail)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        opt(self.nodes[id as usize].links[0].next)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        opt(self.nodes[id as usize].backward)
    }

    /// Link at `level` out of `from`, where `from == NIL` means the header.
    fn link(&self, from: NodeId, level: usize) -> Link {
        if from == NIL {
            self.head[level]
        } else {
            self.nodes[from as usize].links[level]
        }
    }

    fn link_mut(&mut self, from: NodeId, level: usize) -> &mut Link {
        if from == NIL {
            &mut self.head[level]
        } else {
            &mut self.nodes[from as usize].links[level]
        }
    }

    /// True when node `id` orders strictly before (score, member).
    fn before(&self, id: NodeId, score: f64, member: &str) -> bool {
        let n = &self.nodes[id as usize];
        (OrderedFloat(n.score), n.member.as_str()) < (OrderedFloat(score), member)
    }

    /// True when node `id` orders before or equal to (score, member).
    fn before_or_eq(&self, id: NodeId, score: f64, member: &str) -> bool {
        let n = &self.nodes[id as usize];
        (OrderedFloat(n.score), n.member.as_str()) <= (OrderedFloat(score), member)
    }

    fn random_level() -> usize {
        let mut rng = rand::thread_rng();
        let mut level = 1;
        while level < MAX_LEVEL && rng.gen::<f64>() < LEVEL_P {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, member: String, score: f64, levels: usize) -> NodeId {
        let node = Node {
            member,
            score,
            backward: NIL,
            links: vec![EMPTY_LINK; levels],
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = node;
                id
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as NodeId
            }
        }
    }

    /// Inserts a node. The caller guarantees the member is not already
    /// present (the hashmap side of the indexed encoding checks first).
    pub fn insert(&mut self, member: &str, score: f64) {
        debug_assert!(!score.is_nan(), "scores are never NaN");

        let mut update = [NIL; MAX_LEVEL];
        let mut rank = [0u32; MAX_LEVEL];

        let mut x = NIL;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            loop {
                let link = self.link(x, i);
                if link.next != NIL && self.before(link.next, score, member) {
                    rank[i] += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let levels = Self::random_level();
        if levels > self.level {
            for i in self.level..levels {
                rank[i] = 0;
                update[i] = NIL;
                self.head[i].span = self.len as u32;
            }
            self.level = levels;
        }

        let id = self.alloc(member.to_owned(), score, levels);
        for i in 0..levels {
            let up = self.link(update[i], i);
            let node_link = Link {
                next: up.next,
                span: up.span - (rank[0] - rank[i]),
            };
            self.nodes[id as usize].links[i] = node_link;
            *self.link_mut(update[i], i) = Link {
                next: id,
                span: (rank[0] - rank[i]) + 1,
            };
        }
        for i in levels..self.level {
            self.link_mut(update[i], i).span += 1;
        }

        self.nodes[id as usize].backward = update[0];
        match self.nodes[id as usize].links[0].next {
            NIL => self.tail = id,
            next => self.nodes[next as usize].backward = id,
        }
        self.len += 1;
    }

    /// Unlinks `id` given the per-level predecessors in `update`.
    fn unlink(&mut self, id: NodeId, update: &[NodeId; MAX_LEVEL]) {
        for i in 0..self.level {
            let node_link = self.nodes[id as usize].links.get(i).copied();
            let up = self.link_mut(update[i], i);
            match node_link {
                Some(l) if up.next == id => {
                    up.span += l.span;
                    up.span -= 1;
                    up.next = l.next;
                }
                _ => up.span -= 1,
            }
        }

        match self.nodes[id as usize].links[0].next {
            NIL => self.tail = self.nodes[id as usize].backward,
            next => self.nodes[next as usize].backward = self.nodes[id as usize].backward,
        }

        while self.level > 1 && self.head[self.level - 1].next == NIL {
            self.level -= 1;
        }
        self.len -= 1;

        // recycle the slot; clear the member so its memory is released
        self.nodes[id as usize].member = String::new();
        self.nodes[id as usize].links.clear();
        self.free.push(id);
    }

    /// Computes the per-level predecessors of (score, member).
    fn predecessors(&self, score: f64, member: &str) -> [NodeId; MAX_LEVEL] {
        let mut update = [NIL; MAX_LEVEL];
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && self.before(link.next, score, member) {
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }
        update
    }

    /// Removes the node for (score, member). Returns `false` if absent.
    pub fn delete(&mut self, member: &str, score: f64) -> bool {
        let update = self.predecessors(score, member);
        let candidate = self.link(update[0], 0).next;
        if candidate != NIL {
            let n = &self.nodes[candidate as usize];
            if n.score == score && n.member == member {
                self.unlink(candidate, &update);
                return true;
            }
        }
        false
    }

    /// 1-based rank of (score, member), or `None` if absent.
    pub fn rank_of(&self, member: &str, score: f64) -> Option<u32> {
        let mut rank = 0u32;
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && self.before_or_eq(link.next, score, member) {
                    rank += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if x != NIL && self.nodes[x as usize].member == member {
                return Some(rank);
            }
        }
        None
    }

    /// Node at 1-based rank, or `None` if out of bounds.
    pub fn element_by_rank(&self, rank: u32) -> Option<NodeId> {
        if rank == 0 {
            return None;
        }
        let mut traversed = 0u32;
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && traversed + link.span <= rank {
                    traversed += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if traversed == rank && x != NIL {
                return Some(x);
            }
        }
        None
    }

    /// True when at least one node falls inside the score interval.
    fn in_score_range(&self, range: &ScoreInterval) -> bool {
        if range.is_empty() {
            return false;
        }
        match (self.tail, self.head[0].next) {
            (NIL, _) | (_, NIL) => false,
            (tail, first) => {
                range.min_ok(self.nodes[tail as usize].score)
                    && range.max_ok(self.nodes[first as usize].score)
            }
        }
    }

    /// First node whose score satisfies the interval.
    pub fn first_in_score_range(&self, range: &ScoreInterval) -> Option<NodeId> {
        if !self.in_score_range(range) {
            return None;
        }
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && !range.min_ok(self.nodes[link.next as usize].score) {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.link(x, 0).next;
        (candidate != NIL && range.max_ok(self.nodes[candidate as usize].score))
            .then_some(candidate)
    }

    /// Last node whose score satisfies the interval.
    pub fn last_in_score_range(&self, range: &ScoreInterval) -> Option<NodeId> {
        if !self.in_score_range(range) {
            return None;
        }
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && range.max_ok(self.nodes[link.next as usize].score) {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        (x != NIL && range.min_ok(self.nodes[x as usize].score)).then_some(x)
    }

    /// True when at least one node falls inside the lex interval.
    fn in_lex_range(&self, range: &LexInterval) -> bool {
        if range.is_empty() {
            return false;
        }
        match (self.tail, self.head[0].next) {
            (NIL, _) | (_, NIL) => false,
            (tail, first) => {
                range.min_ok(&self.nodes[tail as usize].member)
                    && range.max_ok(&self.nodes[first as usize].member)
            }
        }
    }

    /// First node whose member satisfies the lex interval.
    pub fn first_in_lex_range(&self, range: &LexInterval) -> Option<NodeId> {
        if !self.in_lex_range(range) {
            return None;
        }
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && !range.min_ok(&self.nodes[link.next as usize].member) {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.link(x, 0).next;
        (candidate != NIL && range.max_ok(&self.nodes[candidate as usize].member))
            .then_some(candidate)
    }

    /// Last node whose member satisfies the lex interval.
    pub fn last_in_lex_range(&self, range: &LexInterval) -> Option<NodeId> {
        if !self.in_lex_range(range) {
            return None;
        }
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && range.max_ok(&self.nodes[link.next as usize].member) {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        (x != NIL && range.min_ok(&self.nodes[x as usize].member)).then_some(x)
    }

    /// Deletes nodes with 1-based rank in `[start, end]`, feeding each
    /// removed member to `on_removed`. Returns the removed count.
    pub fn delete_range_by_rank(
        &mut self,
        start: u32,
        end: u32,
        mut on_removed: impl FnMut(&str),
    ) -> usize {
        let mut update = [NIL; MAX_LEVEL];
        let mut traversed = 0u32;
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && traversed + link.span < start {
                    traversed += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        traversed += 1;
        let mut current = self.link(update[0], 0).next;
        let mut removed = 0;
        while current != NIL && traversed <= end {
            let next = self.nodes[current as usize].links[0].next;
            on_removed(&self.nodes[current as usize].member);
            self.unlink(current, &update);
            removed += 1;
            traversed += 1;
            current = next;
        }
        removed
    }

    /// Deletes nodes inside the score interval. Returns the removed count.
    pub fn delete_range_by_score(
        &mut self,
        range: &ScoreInterval,
        mut on_removed: impl FnMut(&str),
    ) -> usize {
        let mut update = [NIL; MAX_LEVEL];
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && !range.min_ok(self.nodes[link.next as usize].score) {
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let mut current = self.link(update[0], 0).next;
        let mut removed = 0;
        while current != NIL && range.max_ok(self.nodes[current as usize].score) {
            let next = self.nodes[current as usize].links[0].next;
            on_removed(&self.nodes[current as usize].member);
            self.unlink(current, &update);
            removed += 1;
            current = next;
        }
        removed
    }

    /// Deletes nodes inside the lex interval. Returns the removed count.
    pub fn delete_range_by_lex(
        &mut self,
        range: &LexInterval,
        mut on_removed: impl FnMut(&str),
    ) -> usize {
        let mut update = [NIL; MAX_LEVEL];
        let mut x = NIL;
        for i in (0..self.level).rev() {
            loop {
                let link = self.link(x, i);
                if link.next != NIL && !range.min_ok(&self.nodes[link.next as usize].member) {
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let mut current = self.link(update[0], 0).next;
        let mut removed = 0;
        while current != NIL && range.max_ok(&self.nodes[current as usize].member) {
            let next = self.nodes[current as usize].links[0].next;
            on_removed(&self.nodes[current as usize].member);
            self.unlink(current, &update);
            removed += 1;
            current = next;
        }
        removed
    }
}

fn opt(id: NodeId) -> Option<NodeId> {
    (id != NIL).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::super::range::{LexBound, ScoreBound};
    use super::*;

    fn filled(pairs: &[(&str, f64)]) -> SkipList {
        let mut sl = SkipList::new();
        for (m, s) in pairs {
            sl.insert(m, *s);
        }
        sl
    }

    fn members(sl: &SkipList) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = sl.first();
        while let Some(id) = cur {
            out.push(sl.member(id).to_owned());
            cur = sl.next(id);
        }
        out
    }

    #[test]
    fn insert_orders_by_score_then_member() {
        let sl = filled(&[("b", 2.0), ("a", 1.0), ("d", 2.0), ("c", 2.0)]);
        assert_eq!(members(&sl), ["a", "b", "c", "d"]);
        assert_eq!(sl.len(), 4);
    }

    #[test]
    fn backward_walk_is_exact_reverse() {
        let sl = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let mut rev = Vec::new();
        let mut cur = sl.last();
        while let Some(id) = cur {
            rev.push(sl.member(id).to_owned());
            cur = sl.prev(id);
        }
        assert_eq!(rev, ["c", "b", "a"]);
    }

    #[test]
    fn ranks_are_one_based_and_exact() {
        let sl = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        assert_eq!(sl.rank_of("a", 1.0), Some(1));
        assert_eq!(sl.rank_of("c", 3.0), Some(3));
        assert_eq!(sl.rank_of("a", 9.0), None);
        assert_eq!(sl.rank_of("zz", 1.0), None);
    }

    #[test]
    fn element_by_rank_round_trips() {
        let pairs: Vec<(String, f64)> = (0..200).map(|i| (format!("m{i:03}"), i as f64)).collect();
        let mut sl = SkipList::new();
        for (m, s) in &pairs {
            sl.insert(m, *s);
        }
        for want in 1..=200u32 {
            let id = sl.element_by_rank(want).expect("rank exists");
            assert_eq!(sl.rank_of(sl.member(id), sl.score(id)), Some(want));
        }
        assert_eq!(sl.element_by_rank(0), None);
        assert_eq!(sl.element_by_rank(201), None);
    }

    #[test]
    fn delete_relinks_and_keeps_ranks() {
        let mut sl = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        assert!(sl.delete("b", 2.0));
        assert!(!sl.delete("b", 2.0));
        assert_eq!(members(&sl), ["a", "c", "d"]);
        assert_eq!(sl.rank_of("c", 3.0), Some(2));
        assert_eq!(sl.rank_of("d", 4.0), Some(3));
    }

    #[test]
    fn delete_requires_matching_score() {
        let mut sl = filled(&[("a", 1.0)]);
        assert!(!sl.delete("a", 2.0));
        assert!(sl.delete("a", 1.0));
        assert_eq!(sl.len(), 0);
        assert_eq!(sl.first(), None);
        assert_eq!(sl.last(), None);
    }

    #[test]
    fn slots_are_recycled() {
        let mut sl = SkipList::new();
        for i in 0..50 {
            sl.insert(&format!("m{i}"), i as f64);
        }
        for i in 0..50 {
            assert!(sl.delete(&format!("m{i}"), i as f64));
        }
        let slots = sl.nodes.len();
        for i in 0..50 {
            sl.insert(&format!("n{i}"), i as f64);
        }
        assert_eq!(sl.nodes.len(), slots, "free list should be reused");
        assert_eq!(sl.len(), 50);
    }

    #[test]
    fn score_range_boundaries() {
        let sl = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let range = ScoreInterval {
            min: ScoreBound::exclusive(1.0),
            max: ScoreBound::inclusive(3.0),
        };
        let first = sl.first_in_score_range(&range).unwrap();
        assert_eq!(sl.member(first), "b");
        let last = sl.last_in_score_range(&range).unwrap();
        assert_eq!(sl.member(last), "c");

        let out_of_range = ScoreInterval {
            min: ScoreBound::inclusive(10.0),
            max: ScoreBound::inclusive(20.0),
        };
        assert_eq!(sl.first_in_score_range(&out_of_range), None);
        assert_eq!(sl.last_in_score_range(&out_of_range), None);
    }

    #[test]
    fn lex_range_boundaries() {
        let sl = filled(&[("a", 0.0), ("b", 0.0), ("c", 0.0)]);
        let range = LexInterval {
            min: LexBound::Closed("b".into()),
            max: LexBound::PosInf,
        };
        assert_eq!(sl.member(sl.first_in_lex_range(&range).unwrap()), "b");
        assert_eq!(sl.member(sl.last_in_lex_range(&range).unwrap()), "c");
    }

    #[test]
    fn delete_range_by_rank_walks_span() {
        let mut sl = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        let mut gone = Vec::new();
        let removed = sl.delete_range_by_rank(2, 3, |m| gone.push(m.to_owned()));
        assert_eq!(removed, 2);
        assert_eq!(gone, ["b", "c"]);
        assert_eq!(members(&sl), ["a", "d"]);
        assert_eq!(sl.rank_of("d", 4.0), Some(2));
    }

    #[test]
    fn delete_range_by_score_with_open_bound() {
        let mut sl = filled(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let range = ScoreInterval {
            min: ScoreBound::exclusive(1.0),
            max: ScoreBound::inclusive(f64::INFINITY),
        };
        let mut gone = Vec::new();
        assert_eq!(sl.delete_range_by_score(&range, |m| gone.push(m.to_owned())), 2);
        assert_eq!(gone, ["b", "c"]);
        assert_eq!(members(&sl), ["a"]);
    }

    #[test]
    fn large_set_stays_consistent() {
        // shuffled insert of 500 elements, then spot-check ordering + ranks
        let mut sl = SkipList::new();
        let mut keys: Vec<u32> = (0..500).collect();
        // deterministic shuffle via multiplicative stepping
        keys.sort_by_key(|k| (k.wrapping_mul(2654435761)) % 500);
        for k in &keys {
            sl.insert(&format!("k{k:04}"), f64::from(*k));
        }
        assert_eq!(sl.len(), 500);
        let listing = members(&sl);
        let mut sorted = listing.clone();
        sorted.sort();
        assert_eq!(listing, sorted);
        assert_eq!(sl.rank_of("k0000", 0.0), Some(1));
        assert_eq!(sl.rank_of("k0499", 499.0), Some(500));
    }
}
