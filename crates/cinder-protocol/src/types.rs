//! RESP2 frame types.
//!
//! The [`Frame`] enum represents a single parsed RESP2 value.
//! Blob strings use `Bytes` for efficient, reference-counted storage
//! that avoids unnecessary copies when moving data through the pipeline.

use bytes::Bytes;

/// A single RESP2 protocol frame.
///
/// Covers the types needed for Redis-compatible command traffic:
/// strings, errors, integers, bulk data, arrays, and the nil bulk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple string response, e.g. `+OK\r\n`.
    /// Used for short, non-binary status replies.
    Simple(String),

    /// Error response, e.g. `-ERR unknown command\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Bulk (binary-safe) string, e.g. `$5\r\nhello\r\n`.
    /// Uses `Bytes` for zero-copy-friendly handling.
    Bulk(Bytes),

    /// Ordered array of frames, e.g. `*2\r\n+hello\r\n+world\r\n`.
    Array(Vec<Frame>),

    /// The RESP2 nil reply, wire form `$-1\r\n`.
    Null,
}

impl Frame {
    /// Returns `true` if this frame is the nil reply.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null)
    }

    /// Builds a bulk frame from anything byte-like.
    pub fn bulk(data: impl Into<Bytes>) -> Frame {
        Frame::Bulk(data.into())
    }
}
