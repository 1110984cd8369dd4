//! Direct-to-buffer RESP2 serialization.
//!
//! Writes frames directly into a `BytesMut` buffer with no intermediate
//! allocations. Integer-to-string conversion uses `itoa` for fast
//! stack-based formatting; doubles go through [`format_double`].

use bytes::BufMut;
use bytes::BytesMut;

use crate::types::Frame;

impl Frame {
    /// Serializes this frame into the provided buffer.
    ///
    /// Writes the full RESP2 wire representation, including type prefix
    /// and trailing `\r\n` delimiters.
    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(msg) => {
                dst.put_u8(b'-');
                dst.put_slice(msg.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                dst.put_u8(b':');
                write_i64(*n, dst);
                dst.put_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                dst.put_u8(b'$');
                write_i64(data.len() as i64, dst);
                dst.put_slice(b"\r\n");
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Array(items) => {
                dst.put_u8(b'*');
                write_i64(items.len() as i64, dst);
                dst.put_slice(b"\r\n");
                for item in items {
                    item.serialize(dst);
                }
            }
            Frame::Null => {
                dst.put_slice(b"$-1\r\n");
            }
        }
    }
}

/// Writes an i64 as its decimal ASCII representation directly into the buffer.
fn write_i64(val: i64, dst: &mut BytesMut) {
    let mut buf = itoa::Buffer::new();
    dst.put_slice(buf.format(val).as_bytes());
}

/// Formats a score the way Redis formats doubles in replies.
///
/// Finite integral values print without a fractional part (`1`, not
/// `1.0`) so long as they fit in an i64 exactly; infinities and NaN
/// print as the literal strings `inf` / `-inf` / `nan`; everything
/// else uses shortest round-trip formatting via `ryu`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    // integral fast path: matches Redis, which prints whole scores
    // as plain integers
    if value == value.trunc() && value.abs() < 1e17 {
        let mut buf = itoa::Buffer::new();
        return buf.format(value as i64).to_owned();
    }
    let mut buf = ryu::Buffer::new();
    buf.format(value).to_owned()
}
