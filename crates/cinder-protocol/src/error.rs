//! Protocol error types for RESP2 parsing and command validation.

use thiserror::Error;

/// Errors that can occur when parsing the RESP2 wire format or
/// converting a frame into a typed command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The input buffer doesn't contain a complete frame yet.
    /// The caller should read more data and try again.
    #[error("incomplete frame: need more data")]
    Incomplete,

    /// The first byte of a frame didn't match any known RESP2 type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Failed to parse an integer value from the frame content.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string or array declared an invalid length.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    /// A bulk string declared a length above the 512 MB cap.
    #[error("bulk string too large: {0} bytes")]
    BulkStringTooLarge(usize),

    /// Arrays nested deeper than the parser allows.
    #[error("frame nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// An array declared more elements than the parser allows.
    #[error("array declares too many elements: {0}")]
    TooManyElements(usize),

    /// A command had the wrong number of arguments. Carries the
    /// lowercase command name for the client-facing message.
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// A structurally valid frame that doesn't form a valid command:
    /// bad flag combinations, unparsable numbers, invalid bounds.
    /// The payload is the exact client-facing message (without the
    /// "ERR " prefix the connection layer adds).
    #[error("{0}")]
    InvalidCommandFrame(String),
}
