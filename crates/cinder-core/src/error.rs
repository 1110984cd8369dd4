//! Error types for the core engine.

use thiserror::Error;

/// Error returned when a command is used against a key holding the
/// wrong type. Carries no payload — the message is the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongType;

pub(crate) const WRONGTYPE_MSG: &str =
    "WRONGTYPE Operation against a key holding the wrong kind of value";

impl std::fmt::Display for WrongType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{WRONGTYPE_MSG}")
    }
}

impl std::error::Error for WrongType {}

/// Errors returned by write operations that may fail due to type
/// mismatch or memory limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The key holds a different type than expected.
    WrongType,
    /// Memory limit reached; the write was refused.
    OutOfMemory,
}

impl From<WrongType> for WriteError {
    fn from(_: WrongType) -> Self {
        WriteError::WrongType
    }
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::WrongType => write!(f, "{WRONGTYPE_MSG}"),
            WriteError::OutOfMemory => {
                write!(f, "OOM command not allowed when used memory > 'maxmemory'")
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Errors returned by shard or engine operations.
#[derive(Debug, Error)]
pub enum ShardError {
    /// The target shard is no longer running (channel closed).
    #[error("shard unavailable")]
    Unavailable,
}
