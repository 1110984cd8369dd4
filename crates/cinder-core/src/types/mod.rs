//! Data type representations for stored values.

pub mod sorted_set;

use bytes::Bytes;

use sorted_set::SortedSet;

/// A stored value in the keyspace.
///
/// Each variant maps to a Redis-like data type. Strings cover the basic
/// key-value surface; sorted sets are the main event.
#[derive(Debug)]
pub enum Value {
    /// Binary-safe string data. Uses `Bytes` for cheap cloning
    /// and zero-copy slicing.
    String(Bytes),

    /// Sorted set of unique string members, each with a float score.
    /// Members are ordered by (score, member). Boxed because the
    /// indexed encoding is large relative to the enum.
    SortedSet(Box<SortedSet>),
}

/// Returns the type name for a value, matching Redis TYPE command output.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::SortedSet(_) => "zset",
    }
}
