//! Zero-copy RESP2 parser.
//!
//! Operates on buffered byte slices. The caller is responsible for reading
//! data from the network into a buffer — this parser is purely synchronous.
//!
//! The parser uses a `Cursor<&[u8]>` to track its position through the
//! input buffer without consuming it, allowing the caller to retry once
//! more data arrives.
//!
//! # Single-pass design
//!
//! The parser validates and builds [`Frame`] values in one traversal,
//! returning `Incomplete` if the buffer doesn't contain enough data yet.
//!
//! # Zero-copy bulk strings
//!
//! When parsing from a `Bytes` buffer via [`parse_frame_bytes`], bulk
//! string data is returned as a zero-copy `Bytes::slice()` into the
//! original buffer. This avoids a heap allocation per bulk string.
//! The fallback [`parse_frame`] copies bulk data for callers that
//! only have a `&[u8]`.
//!
//! # Nil
//!
//! RESP2 encodes nil as a bulk string or array of length -1. Both forms
//! decode to [`Frame::Null`].

use std::io::Cursor;

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// Maximum nesting depth for arrays. Prevents stack overflow from
/// malicious or malformed deeply-nested frames.
const MAX_NESTING_DEPTH: usize = 64;

/// Maximum number of elements in an array. Prevents memory amplification
/// attacks where tiny elements (3 bytes each) create disproportionately
/// large Vec allocations.
const MAX_ARRAY_ELEMENTS: usize = 1_048_576;

/// Maximum length of a bulk string in bytes (512 MB, matching Redis).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Cap for Vec::with_capacity in array parsing. A declared count of 1M
/// elements with capacity pre-allocation costs ~72 MB upfront even before
/// any child data is parsed. This cap limits the initial allocation while
/// still letting the Vec grow organically as elements are parsed.
const PREALLOC_CAP: usize = 1024;

/// Zero-copy frame parser. Bulk string data is returned as `Bytes::slice()`
/// into the input buffer, avoiding a heap copy per bulk string.
///
/// Use this on the hot path when the caller has a `Bytes` (e.g. from
/// `BytesMut::freeze()`).
///
/// Returns `Ok(Some((frame, consumed)))` if a complete frame was parsed,
/// `Ok(None)` if the buffer doesn't contain enough data yet,
/// or `Err(...)` if the data is malformed.
#[inline]
pub fn parse_frame_bytes(buf: &Bytes) -> Result<Option<(Frame, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(buf.as_ref());

    match try_parse(&mut cursor, Some(buf), 0) {
        Ok(frame) => {
            let consumed = cursor.position() as usize;
            Ok(Some((frame, consumed)))
        }
        Err(ProtocolError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Checks whether `buf` contains a complete RESP2 frame and parses it.
///
/// Bulk string data is copied out of the buffer. Prefer [`parse_frame_bytes`]
/// on hot paths when a `Bytes` reference is available.
///
/// Returns `Ok(Some((frame, consumed)))` if a complete frame was parsed,
/// `Ok(None)` if the buffer doesn't contain enough data yet,
/// or `Err(...)` if the data is malformed.
#[inline]
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(buf);

    match try_parse(&mut cursor, None, 0) {
        Ok(frame) => {
            let consumed = cursor.position() as usize;
            Ok(Some((frame, consumed)))
        }
        Err(ProtocolError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// single-pass parser: validates and builds Frame values in one traversal
// ---------------------------------------------------------------------------

/// Parses a complete RESP2 frame from the cursor position, returning
/// `Incomplete` if the buffer doesn't contain enough data.
///
/// When `src` is `Some`, bulk string bytes are sliced zero-copy from the
/// source buffer. When `None`, they are copied.
fn try_parse(
    cursor: &mut Cursor<&[u8]>,
    src: Option<&Bytes>,
    depth: usize,
) -> Result<Frame, ProtocolError> {
    let prefix = read_byte(cursor)?;

    match prefix {
        b'+' => {
            let line = read_line(cursor)?;
            let s = std::str::from_utf8(line).map_err(|_| {
                ProtocolError::InvalidCommandFrame("invalid utf-8 in simple string".into())
            })?;
            Ok(Frame::Simple(s.to_owned()))
        }
        b'-' => {
            let line = read_line(cursor)?;
            let s = std::str::from_utf8(line).map_err(|_| {
                ProtocolError::InvalidCommandFrame("invalid utf-8 in error string".into())
            })?;
            Ok(Frame::Error(s.to_owned()))
        }
        b':' => {
            let val = read_integer_line(cursor)?;
            Ok(Frame::Integer(val))
        }
        b'$' => {
            let len = read_integer_line(cursor)?;
            if len == -1 {
                return Ok(Frame::Null);
            }
            if len < 0 {
                return Err(ProtocolError::InvalidFrameLength(len));
            }
            if len > MAX_BULK_LEN {
                return Err(ProtocolError::BulkStringTooLarge(len as usize));
            }
            let len = len as usize;

            // need `len` bytes of data + \r\n
            let remaining = remaining(cursor);
            if remaining < len + 2 {
                return Err(ProtocolError::Incomplete);
            }

            let pos = cursor.position() as usize;

            // verify trailing \r\n (scope the borrow so we can mutate cursor after)
            {
                let buf = cursor.get_ref();
                if buf[pos + len] != b'\r' || buf[pos + len + 1] != b'\n' {
                    return Err(ProtocolError::InvalidFrameLength(len as i64));
                }
            }

            cursor.set_position((pos + len + 2) as u64);

            // zero-copy when source Bytes is available, copy otherwise
            let data = match src {
                Some(b) => b.slice(pos..pos + len),
                None => Bytes::copy_from_slice(&cursor.get_ref()[pos..pos + len]),
            };
            Ok(Frame::Bulk(data))
        }
        b'*' => {
            let next_depth = depth + 1;
            if next_depth > MAX_NESTING_DEPTH {
                return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH));
            }

            let count = read_integer_line(cursor)?;
            if count == -1 {
                return Ok(Frame::Null);
            }
            if count < 0 {
                return Err(ProtocolError::InvalidFrameLength(count));
            }
            if count as usize > MAX_ARRAY_ELEMENTS {
                return Err(ProtocolError::TooManyElements(count as usize));
            }

            let count = count as usize;
            let mut frames = Vec::with_capacity(count.min(PREALLOC_CAP));
            for _ in 0..count {
                frames.push(try_parse(cursor, src, next_depth)?);
            }
            Ok(Frame::Array(frames))
        }
        other => Err(ProtocolError::InvalidPrefix(other)),
    }
}

// ---------------------------------------------------------------------------
// low-level cursor helpers
// ---------------------------------------------------------------------------

fn read_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    let pos = cursor.position() as usize;
    if pos >= cursor.get_ref().len() {
        return Err(ProtocolError::Incomplete);
    }
    cursor.set_position((pos + 1) as u64);
    Ok(cursor.get_ref()[pos])
}

/// Returns the slice of bytes up to (but not including) the next `\r\n`,
/// and advances the cursor past the `\r\n`.
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ProtocolError> {
    let start = cursor.position() as usize;
    let end = find_crlf(cursor)?;
    Ok(&cursor.get_ref()[start..end])
}

/// Reads a line and parses it as an i64.
fn read_integer_line(cursor: &mut Cursor<&[u8]>) -> Result<i64, ProtocolError> {
    let line = read_line(cursor)?;
    parse_i64_bytes(line)
}

/// Finds the next `\r\n` in the buffer starting from the cursor position.
/// Returns the index of `\r` and advances the cursor past the `\n`.
fn find_crlf(cursor: &mut Cursor<&[u8]>) -> Result<usize, ProtocolError> {
    let buf = cursor.get_ref();
    let start = cursor.position() as usize;

    if start >= buf.len() {
        return Err(ProtocolError::Incomplete);
    }

    // SIMD-accelerated scan for \r, then verify \n follows.
    // memchr processes 16-32 bytes per cycle vs 1 byte in a naive loop.
    let mut pos = start;
    while let Some(offset) = memchr::memchr(b'\r', &buf[pos..]) {
        let cr = pos + offset;
        if cr + 1 < buf.len() && buf[cr + 1] == b'\n' {
            cursor.set_position((cr + 2) as u64);
            return Ok(cr);
        }
        // bare \r without \n — keep scanning past it
        pos = cr + 1;
    }

    Err(ProtocolError::Incomplete)
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    let len = cursor.get_ref().len();
    let pos = cursor.position() as usize;
    len.saturating_sub(pos)
}

/// Parses an i64 directly from a byte slice without allocating a String.
///
/// Negative numbers are accumulated in the negative direction so that
/// `i64::MIN` (-9223372036854775808) is representable without overflow.
fn parse_i64_bytes(buf: &[u8]) -> Result<i64, ProtocolError> {
    if buf.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let (negative, digits) = if buf[0] == b'-' {
        (true, &buf[1..])
    } else {
        (false, buf)
    };

    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    if negative {
        // accumulate in the negative direction to handle i64::MIN
        let mut n: i64 = 0;
        for &b in digits {
            if !b.is_ascii_digit() {
                return Err(ProtocolError::InvalidInteger);
            }
            n = n
                .checked_mul(10)
                .and_then(|n| n.checked_sub((b - b'0') as i64))
                .ok_or(ProtocolError::InvalidInteger)?;
        }
        Ok(n)
    } else {
        let mut n: i64 = 0;
        for &b in digits {
            if !b.is_ascii_digit() {
                return Err(ProtocolError::InvalidInteger);
            }
            n = n
                .checked_mul(10)
                .and_then(|n| n.checked_add((b - b'0') as i64))
                .ok_or(ProtocolError::InvalidInteger)?;
        }
        Ok(n)
    }
}
