//! Command parsing from RESP2 frames.
//!
//! Converts a parsed [`Frame`] (expected to be an array) into a typed
//! [`Command`] enum. This keeps protocol-level concerns separate from
//! the engine that actually executes commands: flag matrices, bound
//! syntax, and arity are all validated here, so the engine only ever
//! sees well-formed requests.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

const SYNTAX_ERR: &str = "syntax error";
const NX_XX_ERR: &str = "XX and NX options at the same time are not compatible";
const GT_LT_NX_ERR: &str = "GT, LT, and/or NX options at the same time are not compatible";
const INCR_PAIR_ERR: &str = "INCR option supports a single increment-element pair";
const INVALID_FLOAT_ERR: &str = "value is not a valid float";
const INVALID_INT_ERR: &str = "value is not an integer or out of range";
const SCORE_NAN_ERR: &str = "resulting score is not a number (NaN)";
const FLOAT_RANGE_ERR: &str = "min or max is not a float";
const LEX_RANGE_ERR: &str = "min or max not valid string range item";
const WEIGHT_ERR: &str = "weight value is not a float";

/// Flags for the ZADD command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZAddFlags {
    /// Only add new members, don't update existing scores.
    pub nx: bool,
    /// Only update existing members, don't add new ones.
    pub xx: bool,
    /// Only update when new score > current score.
    pub gt: bool,
    /// Only update when new score < current score.
    pub lt: bool,
    /// Return count of changed members (added + updated) instead of just added.
    pub ch: bool,
    /// Treat the score as an increment; reply with the new score.
    pub incr: bool,
}

/// One endpoint of a score range. `open` means exclusive (the `(`
/// prefix in the wire syntax).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub open: bool,
}

/// One endpoint of a lexicographic range.
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

/// How colliding scores combine in ZUNIONSTORE / ZINTERSTORE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregateFn {
    #[default]
    Sum,
    Min,
    Max,
}

/// Parsed arguments shared by ZUNIONSTORE and ZINTERSTORE.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreArgs {
    pub dest: String,
    pub keys: Vec<String>,
    /// One weight per key; defaults to 1.0 each.
    pub weights: Vec<f64>,
    pub aggregate: AggregateFn,
}

/// A parsed client command, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// PING with an optional message. Returns PONG or echoes the message.
    Ping(Option<Bytes>),

    /// ECHO <message>. Returns the message back to the client.
    Echo(Bytes),

    /// GET <key>. Returns the value or nil.
    Get { key: String },

    /// SET <key> <value>. Stores a string value.
    Set { key: String, value: Bytes },

    /// DEL <key> [key ...]. Returns the number of keys removed.
    Del { keys: Vec<String> },

    /// EXISTS <key> [key ...]. Returns the number of keys that exist.
    Exists { keys: Vec<String> },

    /// DBSIZE. Returns the number of keys in the database.
    DbSize,

    /// TYPE <key>. Returns the type of the value stored at key.
    Type { key: String },

    /// ZADD <key> [NX|XX] [GT|LT] [CH] [INCR] <score> <member> [...].
    ZAdd {
        key: String,
        flags: ZAddFlags,
        members: Vec<(f64, String)>,
    },

    /// ZCARD <key>. Returns the number of members.
    ZCard { key: String },

    /// ZCOUNT <key> <min> <max>. Counts members in a score range.
    ZCount {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
    },

    /// ZINCRBY <key> <increment> <member>. Returns the new score.
    ZIncrBy {
        key: String,
        delta: f64,
        member: String,
    },

    /// ZINTERSTORE <dest> <numkeys> <key...> [WEIGHTS ...] [AGGREGATE ...].
    ZInterStore(StoreArgs),

    /// ZLEXCOUNT <key> <min> <max>. Counts members in a lex range.
    ZLexCount {
        key: String,
        min: LexBound,
        max: LexBound,
    },

    /// ZRANGE <key> <start> <stop> [WITHSCORES], or ZREVRANGE when
    /// `reverse` is set. Rank-based, inclusive on both ends.
    ZRange {
        key: String,
        start: i32,
        stop: i32,
        with_scores: bool,
        reverse: bool,
    },

    /// ZRANGEBYSCORE / ZREVRANGEBYSCORE / ZRANGE ... BYSCORE.
    /// For the reverse form the first bound is the caller's upper bound;
    /// the evaluator swaps endpoints.
    ZRangeByScore {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
        with_scores: bool,
        reverse: bool,
        offset: u32,
        limit: u32,
    },

    /// ZRANGEBYLEX <key> <min> <max> [LIMIT offset count].
    ZRangeByLex {
        key: String,
        min: LexBound,
        max: LexBound,
        offset: u32,
        limit: u32,
    },

    /// ZRANK / ZREVRANK <key> <member>.
    ZRank {
        key: String,
        member: String,
        reverse: bool,
    },

    /// ZREM <key> <member> [member ...].
    ZRem { key: String, members: Vec<String> },

    /// ZREMRANGEBYRANK <key> <start> <stop>.
    ZRemRangeByRank { key: String, start: i32, stop: i32 },

    /// ZREMRANGEBYSCORE <key> <min> <max>.
    ZRemRangeByScore {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
    },

    /// ZREMRANGEBYLEX <key> <min> <max>.
    ZRemRangeByLex {
        key: String,
        min: LexBound,
        max: LexBound,
    },

    /// ZSCAN <key> <cursor>.
    ZScan { key: String, cursor: u64 },

    /// ZSCORE <key> <member>.
    ZScore { key: String, member: String },

    /// ZUNIONSTORE <dest> <numkeys> <key...> [WEIGHTS ...] [AGGREGATE ...].
    ZUnionStore(StoreArgs),

    /// A command we don't recognize.
    Unknown(String),
}

impl Command {
    /// Parses a [`Frame`] into a [`Command`].
    ///
    /// Expects an array frame where the first element is the command name
    /// (as a bulk or simple string) and the rest are arguments.
    pub fn from_frame(frame: Frame) -> Result<Command, ProtocolError> {
        let frames = match frame {
            Frame::Array(frames) => frames,
            _ => {
                return Err(ProtocolError::InvalidCommandFrame(
                    "expected array frame".into(),
                ));
            }
        };

        if frames.is_empty() {
            return Err(ProtocolError::InvalidCommandFrame(
                "empty command array".into(),
            ));
        }

        let name = extract_string(&frames[0])?;
        let name_upper = name.to_ascii_uppercase();
        let args = &frames[1..];

        match name_upper.as_str() {
            "PING" => parse_ping(args),
            "ECHO" => parse_echo(args),
            "GET" => parse_get(args),
            "SET" => parse_set(args),
            "DEL" => parse_keys_cmd(args, "del", |keys| Command::Del { keys }),
            "EXISTS" => parse_keys_cmd(args, "exists", |keys| Command::Exists { keys }),
            "DBSIZE" => parse_dbsize(args),
            "TYPE" => parse_type(args),
            "ZADD" => parse_zadd(args),
            "ZCARD" => parse_zcard(args),
            "ZCOUNT" => parse_zcount(args),
            "ZINCRBY" => parse_zincrby(args),
            "ZINTERSTORE" => parse_store(args, "zinterstore").map(Command::ZInterStore),
            "ZLEXCOUNT" => parse_zlexcount(args),
            "ZRANGE" => parse_zrange(args, false),
            "ZRANGEBYLEX" => parse_zrangebylex(args),
            "ZRANGEBYSCORE" => parse_zrangebyscore(args, false),
            "ZRANK" => parse_zrank(args, false),
            "ZREM" => parse_zrem(args),
            "ZREMRANGEBYLEX" => parse_zremrangebylex(args),
            "ZREMRANGEBYRANK" => parse_zremrangebyrank(args),
            "ZREMRANGEBYSCORE" => parse_zremrangebyscore(args),
            "ZREVRANGE" => parse_zrange(args, true),
            "ZREVRANGEBYSCORE" => parse_zrangebyscore(args, true),
            "ZREVRANK" => parse_zrank(args, true),
            "ZSCAN" => parse_zscan(args),
            "ZSCORE" => parse_zscore(args),
            "ZUNIONSTORE" => parse_store(args, "zunionstore").map(Command::ZUnionStore),
            _ => Ok(Command::Unknown(name)),
        }
    }
}

// ---------------------------------------------------------------------------
// argument extraction helpers
// ---------------------------------------------------------------------------

/// Extracts a UTF-8 string from a Bulk or Simple frame.
fn extract_string(frame: &Frame) -> Result<String, ProtocolError> {
    match frame {
        Frame::Bulk(data) => String::from_utf8(data.to_vec())
            .map_err(|_| ProtocolError::InvalidCommandFrame("argument is not valid utf-8".into())),
        Frame::Simple(s) => Ok(s.clone()),
        _ => Err(ProtocolError::InvalidCommandFrame(
            "expected bulk or simple string argument".into(),
        )),
    }
}

/// Extracts raw bytes from a Bulk or Simple frame.
fn extract_bytes(frame: &Frame) -> Result<Bytes, ProtocolError> {
    match frame {
        Frame::Bulk(data) => Ok(data.clone()),
        Frame::Simple(s) => Ok(Bytes::from(s.clone().into_bytes())),
        _ => Err(ProtocolError::InvalidCommandFrame(
            "expected bulk or simple string argument".into(),
        )),
    }
}

fn invalid(msg: &str) -> ProtocolError {
    ProtocolError::InvalidCommandFrame(msg.to_owned())
}

fn parse_i32(frame: &Frame) -> Result<i32, ProtocolError> {
    let s = extract_string(frame)?;
    s.parse::<i32>().map_err(|_| invalid(INVALID_INT_ERR))
}

fn parse_u32(frame: &Frame, err: &str) -> Result<u32, ProtocolError> {
    let s = extract_string(frame)?;
    s.parse::<u32>().map_err(|_| invalid(err))
}

/// Parses a plain score argument. NaN is never a valid score.
fn parse_score(frame: &Frame) -> Result<f64, ProtocolError> {
    let s = extract_string(frame)?;
    let v = s.parse::<f64>().map_err(|_| invalid(INVALID_FLOAT_ERR))?;
    if v.is_nan() {
        return Err(invalid(INVALID_FLOAT_ERR));
    }
    Ok(v)
}

/// Parses a score range endpoint: optional `(` prefix for exclusive,
/// then `-inf` / `+inf` / a finite decimal.
fn parse_score_bound(frame: &Frame) -> Result<ScoreBound, ProtocolError> {
    let s = extract_string(frame)?;
    let (open, num) = match s.strip_prefix('(') {
        Some(rest) => (true, rest),
        None => (false, s.as_str()),
    };
    let value = num.parse::<f64>().map_err(|_| invalid(FLOAT_RANGE_ERR))?;
    if value.is_nan() {
        return Err(invalid(FLOAT_RANGE_ERR));
    }
    Ok(ScoreBound { value, open })
}

/// Parses a lex range endpoint: `-`, `+`, `[member`, or `(member`.
fn parse_lex_bound(frame: &Frame) -> Result<LexBound, ProtocolError> {
    let s = extract_string(frame)?;
    if s == "-" {
        return Ok(LexBound::NegInf);
    }
    if s == "+" {
        return Ok(LexBound::PosInf);
    }
    match s.as_bytes().first() {
        Some(b'(') => Ok(LexBound::Open(s[1..].to_owned())),
        Some(b'[') => Ok(LexBound::Closed(s[1..].to_owned())),
        _ => Err(invalid(LEX_RANGE_ERR)),
    }
}

// ---------------------------------------------------------------------------
// generic commands
// ---------------------------------------------------------------------------

fn parse_ping(args: &[Frame]) -> Result<Command, ProtocolError> {
    match args.len() {
        0 => Ok(Command::Ping(None)),
        1 => Ok(Command::Ping(Some(extract_bytes(&args[0])?))),
        _ => Err(ProtocolError::WrongArity("ping".into())),
    }
}

fn parse_echo(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("echo".into()));
    }
    Ok(Command::Echo(extract_bytes(&args[0])?))
}

fn parse_get(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("get".into()));
    }
    let key = extract_string(&args[0])?;
    Ok(Command::Get { key })
}

fn parse_set(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("set".into()));
    }
    let key = extract_string(&args[0])?;
    let value = extract_bytes(&args[1])?;
    Ok(Command::Set { key, value })
}

fn parse_keys_cmd(
    args: &[Frame],
    name: &str,
    build: fn(Vec<String>) -> Command,
) -> Result<Command, ProtocolError> {
    if args.is_empty() {
        return Err(ProtocolError::WrongArity(name.into()));
    }
    let keys = args
        .iter()
        .map(extract_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(build(keys))
}

fn parse_dbsize(args: &[Frame]) -> Result<Command, ProtocolError> {
    if !args.is_empty() {
        return Err(ProtocolError::WrongArity("dbsize".into()));
    }
    Ok(Command::DbSize)
}

fn parse_type(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("type".into()));
    }
    let key = extract_string(&args[0])?;
    Ok(Command::Type { key })
}

// ---------------------------------------------------------------------------
// sorted-set commands
// ---------------------------------------------------------------------------

fn parse_zadd(args: &[Frame]) -> Result<Command, ProtocolError> {
    // ZADD key [NX|XX] [GT|LT] [CH] [INCR] score member [score member ...]
    if args.len() < 3 {
        return Err(ProtocolError::WrongArity("zadd".into()));
    }

    let key = extract_string(&args[0])?;
    let mut flags = ZAddFlags::default();
    let mut idx = 1;

    // consume option tokens, always leaving at least one trailing arg
    // so a member that happens to spell a flag name is never eaten
    while idx + 1 < args.len() {
        let s = extract_string(&args[idx])?.to_ascii_uppercase();
        match s.as_str() {
            "NX" => flags.nx = true,
            "XX" => flags.xx = true,
            "GT" => flags.gt = true,
            "LT" => flags.lt = true,
            "CH" => flags.ch = true,
            "INCR" => flags.incr = true,
            _ => break,
        }
        idx += 1;
    }

    let remaining = &args[idx..];
    if remaining.len() % 2 != 0 {
        return Err(invalid(SYNTAX_ERR));
    }
    if flags.incr && remaining.len() > 2 {
        return Err(invalid(INCR_PAIR_ERR));
    }
    if flags.nx && flags.xx {
        return Err(invalid(NX_XX_ERR));
    }
    if (flags.nx && (flags.gt || flags.lt)) || (flags.gt && flags.lt) {
        return Err(invalid(GT_LT_NX_ERR));
    }

    let mut members = Vec::with_capacity(remaining.len() / 2);
    for pair in remaining.chunks(2) {
        let score = parse_score(&pair[0])?;
        let member = extract_string(&pair[1])?;
        members.push((score, member));
    }

    Ok(Command::ZAdd {
        key,
        flags,
        members,
    })
}

fn parse_zcard(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("zcard".into()));
    }
    let key = extract_string(&args[0])?;
    Ok(Command::ZCard { key })
}

fn parse_zcount(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("zcount".into()));
    }
    let key = extract_string(&args[0])?;
    let min = parse_score_bound(&args[1])?;
    let max = parse_score_bound(&args[2])?;
    Ok(Command::ZCount { key, min, max })
}

fn parse_zincrby(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("zincrby".into()));
    }
    let key = extract_string(&args[0])?;
    let s = extract_string(&args[1])?;
    let delta = s.parse::<f64>().map_err(|_| invalid(INVALID_FLOAT_ERR))?;
    if delta.is_nan() {
        return Err(invalid(SCORE_NAN_ERR));
    }
    let member = extract_string(&args[2])?;
    Ok(Command::ZIncrBy { key, delta, member })
}

fn parse_zlexcount(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("zlexcount".into()));
    }
    let key = extract_string(&args[0])?;
    let min = parse_lex_bound(&args[1])?;
    let max = parse_lex_bound(&args[2])?;
    Ok(Command::ZLexCount { key, min, max })
}

fn parse_zrange(args: &[Frame], reverse: bool) -> Result<Command, ProtocolError> {
    let name = if reverse { "zrevrange" } else { "zrange" };
    if args.len() < 3 {
        return Err(ProtocolError::WrongArity(name.into()));
    }

    let key = extract_string(&args[0])?;
    let mut with_scores = false;
    let mut by_score = false;

    for frame in &args[3..] {
        let opt = extract_string(frame)?.to_ascii_uppercase();
        if !reverse && opt == "BYSCORE" {
            by_score = true;
        } else if opt == "WITHSCORES" {
            with_scores = true;
        } else {
            return Err(invalid(&format!("unsupported option {opt}")));
        }
    }

    if by_score {
        let min = parse_score_bound(&args[1])?;
        let max = parse_score_bound(&args[2])?;
        return Ok(Command::ZRangeByScore {
            key,
            min,
            max,
            with_scores,
            reverse: false,
            offset: 0,
            limit: u32::MAX,
        });
    }

    let start = parse_i32(&args[1])?;
    let stop = parse_i32(&args[2])?;
    Ok(Command::ZRange {
        key,
        start,
        stop,
        with_scores,
        reverse,
    })
}

fn parse_zrangebyscore(args: &[Frame], reverse: bool) -> Result<Command, ProtocolError> {
    let name = if reverse {
        "zrevrangebyscore"
    } else {
        "zrangebyscore"
    };
    if args.len() < 3 {
        return Err(ProtocolError::WrongArity(name.into()));
    }

    let key = extract_string(&args[0])?;
    let min = parse_score_bound(&args[1])?;
    let max = parse_score_bound(&args[2])?;

    let mut with_scores = false;
    let mut offset = 0u32;
    let mut limit = u32::MAX;

    let opts = &args[3..];
    let mut i = 0;
    while i < opts.len() {
        let opt = extract_string(&opts[i])?.to_ascii_uppercase();
        if opt == "WITHSCORES" {
            with_scores = true;
            i += 1;
        } else if opt == "LIMIT" {
            // LIMIT must be the final option with exactly two operands
            if i + 3 != opts.len() {
                return Err(invalid(SYNTAX_ERR));
            }
            offset = parse_u32(&opts[i + 1], SYNTAX_ERR)?;
            limit = parse_u32(&opts[i + 2], SYNTAX_ERR)?;
            break;
        } else {
            return Err(invalid(SYNTAX_ERR));
        }
    }

    Ok(Command::ZRangeByScore {
        key,
        min,
        max,
        with_scores,
        reverse,
        offset,
        limit,
    })
}

fn parse_zrangebylex(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 3 {
        return Err(ProtocolError::WrongArity("zrangebylex".into()));
    }

    let key = extract_string(&args[0])?;
    let mut offset = 0u32;
    let mut limit = u32::MAX;

    if args.len() > 3 {
        if args.len() != 6 {
            return Err(invalid(SYNTAX_ERR));
        }
        let kw = extract_string(&args[3])?.to_ascii_uppercase();
        if kw != "LIMIT" {
            return Err(invalid(SYNTAX_ERR));
        }
        offset = parse_u32(&args[4], INVALID_INT_ERR)?;
        limit = parse_u32(&args[5], INVALID_INT_ERR)?;
    }

    let min = parse_lex_bound(&args[1])?;
    let max = parse_lex_bound(&args[2])?;

    Ok(Command::ZRangeByLex {
        key,
        min,
        max,
        offset,
        limit,
    })
}

fn parse_zrank(args: &[Frame], reverse: bool) -> Result<Command, ProtocolError> {
    let name = if reverse { "zrevrank" } else { "zrank" };
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity(name.into()));
    }
    let key = extract_string(&args[0])?;
    let member = extract_string(&args[1])?;
    Ok(Command::ZRank {
        key,
        member,
        reverse,
    })
}

fn parse_zrem(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity("zrem".into()));
    }
    let key = extract_string(&args[0])?;
    let members = args[1..]
        .iter()
        .map(extract_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Command::ZRem { key, members })
}

fn parse_zremrangebyrank(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("zremrangebyrank".into()));
    }
    let key = extract_string(&args[0])?;
    let start = parse_i32(&args[1])?;
    let stop = parse_i32(&args[2])?;
    Ok(Command::ZRemRangeByRank { key, start, stop })
}

fn parse_zremrangebyscore(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("zremrangebyscore".into()));
    }
    let key = extract_string(&args[0])?;
    let min = parse_score_bound(&args[1])?;
    let max = parse_score_bound(&args[2])?;
    Ok(Command::ZRemRangeByScore { key, min, max })
}

fn parse_zremrangebylex(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("zremrangebylex".into()));
    }
    let key = extract_string(&args[0])?;
    let min = parse_lex_bound(&args[1])?;
    let max = parse_lex_bound(&args[2])?;
    Ok(Command::ZRemRangeByLex { key, min, max })
}

fn parse_zscan(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity("zscan".into()));
    }
    if args.len() > 2 {
        return Err(invalid("scan options are not supported yet"));
    }
    let key = extract_string(&args[0])?;
    let cursor = extract_string(&args[1])?
        .parse::<u64>()
        .map_err(|_| invalid("invalid cursor"))?;
    Ok(Command::ZScan { key, cursor })
}

fn parse_zscore(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("zscore".into()));
    }
    let key = extract_string(&args[0])?;
    let member = extract_string(&args[1])?;
    Ok(Command::ZScore { key, member })
}

/// Parses the shared ZUNIONSTORE / ZINTERSTORE argument shape:
/// `dest numkeys key [key ...] [WEIGHTS w ...] [AGGREGATE SUM|MIN|MAX]`.
fn parse_store(args: &[Frame], name: &str) -> Result<StoreArgs, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity(name.into()));
    }

    let dest = extract_string(&args[0])?;
    let num_keys = extract_string(&args[1])?
        .parse::<usize>()
        .map_err(|_| invalid(INVALID_INT_ERR))?;

    if num_keys == 0 {
        return Err(invalid(&format!(
            "at least 1 input key is needed for {name}"
        )));
    }
    if args.len() < 2 + num_keys {
        return Err(invalid(SYNTAX_ERR));
    }

    let keys = args[2..2 + num_keys]
        .iter()
        .map(extract_string)
        .collect::<Result<Vec<_>, _>>()?;

    let mut weights = vec![1.0; num_keys];
    let mut aggregate = AggregateFn::default();

    let mut i = 2 + num_keys;
    while i < args.len() {
        let opt = extract_string(&args[i])?.to_ascii_uppercase();
        if opt == "WEIGHTS" {
            if args.len() <= i + num_keys {
                return Err(invalid(SYNTAX_ERR));
            }
            for (j, w) in weights.iter_mut().enumerate() {
                let s = extract_string(&args[i + j + 1])?;
                *w = s.parse::<f64>().map_err(|_| invalid(WEIGHT_ERR))?;
            }
            i += num_keys + 1;
        } else if opt == "AGGREGATE" {
            if i + 2 != args.len() {
                return Err(invalid(SYNTAX_ERR));
            }
            aggregate = match extract_string(&args[i + 1])?.to_ascii_uppercase().as_str() {
                "SUM" => AggregateFn::Sum,
                "MIN" => AggregateFn::Min,
                "MAX" => AggregateFn::Max,
                _ => return Err(invalid(SYNTAX_ERR)),
            };
            break;
        } else {
            return Err(invalid(SYNTAX_ERR));
        }
    }

    Ok(StoreArgs {
        dest,
        keys,
        weights,
        aggregate,
    })
}
