//! Packed sorted-set encoding for small sets.
//!
//! One contiguous buffer holds (member, score) entries in (score,
//! member) order. Every read is a linear walk, which beats pointer
//! chasing for the small cardinalities this encoding is limited to.
//!
//! Entry layout:
//!
//! ```text
//! [len: u8][member bytes][score: f64 LE][len: u8]
//! ```
//!
//! The member length is stored on both ends so the buffer can be walked
//! backward as well as forward. A single byte suffices: members longer
//! than [`MAX_PACKED_VALUE`] force a promotion to the indexed encoding
//! before they are ever written here.

/// Longest member (in bytes) the packed encoding accepts.
pub const MAX_PACKED_VALUE: usize = 64;

/// Most entries the packed encoding holds before promotion.
pub const MAX_PACKED_ENTRIES: usize = 128;

/// Fixed per-entry overhead: leading length byte + score + trailing
/// length byte.
const ENTRY_FIXED: usize = 1 + 8 + 1;

/// A small sorted set stored as one contiguous byte buffer.
#[derive(Debug, Clone, Default)]
pub struct PackedSet {
    buf: Vec<u8>,
    len: usize,
}

impl PackedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes currently allocated for the buffer, for memory accounting.
    pub fn buf_capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Reads the entry starting at `off`. Returns the member, the score,
    /// and the total entry width.
    fn read_at(&self, off: usize) -> (&str, f64, usize) {
        let mlen = self.buf[off] as usize;
        let member = std::str::from_utf8(&self.buf[off + 1..off + 1 + mlen])
            .expect("packed entry holds valid utf-8");
        let score_bytes: [u8; 8] = self.buf[off + 1 + mlen..off + 1 + mlen + 8]
            .try_into()
            .expect("packed entry holds 8 score bytes");
        (member, f64::from_bits(u64::from_le_bytes(score_bytes)), mlen + ENTRY_FIXED)
    }

    /// Reads the entry that *ends* at `end` (exclusive), walking backward
    /// via the trailing length byte. Returns the member, the score, and
    /// the entry's start offset.
    fn read_before(&self, end: usize) -> (&str, f64, usize) {
        let mlen = self.buf[end - 1] as usize;
        let start = end - (mlen + ENTRY_FIXED);
        let (member, score, _) = self.read_at(start);
        (member, score, start)
    }

    /// Iterates entries in (score, member) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        let mut off = 0;
        std::iter::from_fn(move || {
            if off >= self.buf.len() {
                return None;
            }
            let (member, score, width) = self.read_at(off);
            off += width;
            Some((member, score))
        })
    }

    /// Iterates entries in reverse (score, member) order.
    pub fn iter_rev(&self) -> impl Iterator<Item = (&str, f64)> {
        let mut end = self.buf.len();
        std::iter::from_fn(move || {
            if end == 0 {
                return None;
            }
            let (member, score, start) = self.read_before(end);
            end = start;
            Some((member, score))
        })
    }

    /// Finds a member's entry, returning (offset, score, width).
    fn find(&self, member: &str) -> Option<(usize, f64, usize)> {
        let mut off = 0;
        while off < self.buf.len() {
            let (m, score, width) = self.read_at(off);
            if m == member {
                return Some((off, score, width));
            }
            off += width;
        }
        None
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.find(member).map(|(_, score, _)| score)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.find(member).is_some()
    }

    /// Returns the forward rank of a member (0-based).
    pub fn rank(&self, member: &str) -> Option<usize> {
        self.iter().position(|(m, _)| m == member)
    }

    /// Upserts a member. Existing members are repositioned; the previous
    /// score is returned so the caller can report Updated vs Added.
    ///
    /// The caller is responsible for the encoding limits — promotion is
    /// decided one level up, before this is reached.
    pub fn insert(&mut self, member: &str, score: f64) -> Option<f64> {
        debug_assert!(member.len() <= MAX_PACKED_VALUE);
        let prev = self.remove(member);

        // first entry ordered after (score, member)
        let mut off = 0;
        while off < self.buf.len() {
            let (m, s, width) = self.read_at(off);
            if (s, m) > (score, member) {
                break;
            }
            off += width;
        }

        let mut entry = Vec::with_capacity(member.len() + ENTRY_FIXED);
        entry.push(member.len() as u8);
        entry.extend_from_slice(member.as_bytes());
        entry.extend_from_slice(&score.to_bits().to_le_bytes());
        entry.push(member.len() as u8);

        self.buf.splice(off..off, entry);
        self.len += 1;
        prev
    }

    /// Removes a member, returning its score if it was present.
    pub fn remove(&mut self, member: &str) -> Option<f64> {
        let (off, score, width) = self.find(member)?;
        self.buf.drain(off..off + width);
        self.len -= 1;
        Some(score)
    }

    /// Deletes `count` entries starting at rank `start`. The caller has
    /// already clamped the span to the set bounds.
    pub fn delete_rank_span(&mut self, start: usize, count: usize) -> usize {
        debug_assert!(start + count <= self.len);

        let mut off = 0;
        for _ in 0..start {
            let (_, _, width) = self.read_at(off);
            off += width;
        }
        let mut end = off;
        for _ in 0..count {
            let (_, _, width) = self.read_at(end);
            end += width;
        }

        self.buf.drain(off..end);
        self.len -= count;
        count
    }

    /// Deletes every entry matching the predicate, returning the count.
    pub fn delete_where(&mut self, mut pred: impl FnMut(&str, f64) -> bool) -> usize {
        let mut kept = Vec::with_capacity(self.buf.len());
        let mut removed = 0;

        let mut off = 0;
        while off < self.buf.len() {
            let (m, s, width) = self.read_at(off);
            if pred(m, s) {
                removed += 1;
            } else {
                kept.extend_from_slice(&self.buf[off..off + width]);
            }
            off += width;
        }

        self.buf = kept;
        self.len -= removed;
        removed
    }
}
