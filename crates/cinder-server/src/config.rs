//! Server configuration parsing.
//!
//! Handles conversion from CLI-friendly strings (like "100M", "1G")
//! to the internal config types used by the engine.

use cinder_core::{EngineConfig, ShardConfig};

/// Parses a human-readable byte size string into a number of bytes.
///
/// Supports suffixes: K/KB (kibibytes), M/MB (mebibytes), G/GB (gibibytes).
/// Plain numbers are treated as bytes. Case insensitive.
///
/// # Examples
///
/// - "1024" → 1024
/// - "100K" → 102400
/// - "50M" → 52428800
/// - "2G" → 2147483648
pub fn parse_byte_size(input: &str) -> Result<usize, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty byte size string".into());
    }

    let upper = input.to_ascii_uppercase();

    let (num_str, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix('K') {
        (n, 1024)
    } else {
        (upper.as_str(), 1)
    };

    let num: usize = num_str
        .parse()
        .map_err(|_| format!("invalid byte size: '{input}'"))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| format!("byte size overflow: '{input}'"))
}

/// Builds an `EngineConfig` from parsed CLI options.
///
/// `max_memory` is the total server limit — it gets divided evenly
/// across shards so each shard enforces its own share.
pub fn build_engine_config(max_memory: Option<usize>, shard_count: usize) -> EngineConfig {
    let per_shard_memory = max_memory.map(|total| {
        // divide evenly, rounding down — better to be slightly
        // conservative than to overshoot the total limit
        total / shard_count
    });

    EngineConfig {
        shard: ShardConfig {
            max_memory: per_shard_memory,
            ..ShardConfig::default()
        },
    }
}
