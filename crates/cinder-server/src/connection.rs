//! Per-connection handler.
//!
//! Reads RESP2 frames from a TCP stream, routes them through the
//! sharded engine, and writes responses back. Supports pipelining
//! by processing multiple frames from a single read.

use std::time::Duration;

use bytes::BytesMut;
use cinder_core::{
    Aggregate, Engine, Interval, LexBound, LexInterval, RangeParams, RangeSpec, ScoreBound,
    ScoreInterval, SetOp, ShardRequest, ShardResponse, ZAddFlags, ZAddReply,
};
use cinder_protocol::{command, format_double, parse_frame, Command, Frame, StoreArgs};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Initial read buffer capacity. 4KB covers most commands comfortably
/// without over-allocating for simple PING/SET/GET workloads.
const BUF_CAPACITY: usize = 4096;

/// Maximum read buffer size before we disconnect the client. Prevents
/// a single slow or malicious client from consuming unbounded memory
/// with incomplete frames.
const MAX_BUF_SIZE: usize = 64 * 1024 * 1024; // 64 MB

/// How long a connection can be idle (no data received) before we
/// close it. Prevents abandoned connections from leaking resources.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300); // 5 minutes

const WRONGTYPE_MSG: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const OOM_MSG: &str = "OOM command not allowed when used memory > 'maxmemory'";
const SCORE_NAN_MSG: &str = "ERR resulting score is not a number (NaN)";

/// Drives a single client connection to completion.
///
/// Reads data into a buffer, parses complete frames, dispatches commands
/// through the engine, and writes serialized responses back. The loop
/// exits when the client disconnects or a protocol error occurs.
pub async fn handle(
    mut stream: TcpStream,
    engine: Engine,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = BytesMut::with_capacity(BUF_CAPACITY);
    let mut out = BytesMut::with_capacity(BUF_CAPACITY);

    loop {
        // guard against unbounded buffer growth from incomplete frames
        if buf.len() > MAX_BUF_SIZE {
            let msg = "ERR max buffer size exceeded, closing connection";
            let mut err_buf = BytesMut::new();
            Frame::Error(msg.into()).serialize(&mut err_buf);
            let _ = stream.write_all(&err_buf).await;
            return Ok(());
        }

        // read some data — returns 0 on clean disconnect, times out
        // after IDLE_TIMEOUT to reclaim resources from abandoned connections
        match tokio::time::timeout(IDLE_TIMEOUT, stream.read_buf(&mut buf)).await {
            Ok(Ok(0)) => return Ok(()),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Ok(()), // idle timeout — close silently
        }

        // process as many complete frames as the buffer holds (pipelining),
        // batching all responses into a single write buffer
        out.clear();
        loop {
            match parse_frame(&buf) {
                Ok(Some((frame, consumed))) => {
                    let _ = buf.split_to(consumed);
                    let response = process(frame, &engine).await;
                    response.serialize(&mut out);
                }
                Ok(None) => break, // need more data
                Err(e) => {
                    let msg = format!("ERR protocol error: {e}");
                    Frame::Error(msg).serialize(&mut out);
                    stream.write_all(&out).await?;
                    return Ok(());
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
        }
    }
}

/// Converts a raw frame into a command and executes it.
async fn process(frame: Frame, engine: &Engine) -> Frame {
    match Command::from_frame(frame) {
        Ok(cmd) => execute(cmd, engine).await,
        Err(e) => Frame::Error(format!("ERR {e}")),
    }
}

/// Executes a parsed command and returns the response frame.
///
/// Ping and Echo are handled inline (no shard routing needed). Every
/// key-touching command goes through the engine's transaction layer so
/// it observes the per-key ordering guarantees.
pub async fn execute(cmd: Command, engine: &Engine) -> Frame {
    match cmd {
        // -- no shard needed --
        Command::Ping(None) => Frame::Simple("PONG".into()),
        Command::Ping(Some(msg)) => Frame::Bulk(msg),
        Command::Echo(msg) => Frame::Bulk(msg),

        // -- strings and generic --
        Command::Get { key } => {
            let req = ShardRequest::Get { key: key.clone() };
            match engine.single_hop(&key, req).await {
                Ok(ShardResponse::Value(Some(data))) => Frame::Bulk(data),
                Ok(ShardResponse::Value(None)) => Frame::Null,
                other => unexpected(other),
            }
        }

        Command::Set { key, value } => {
            let req = ShardRequest::Set {
                key: key.clone(),
                value,
            };
            match engine.single_hop(&key, req).await {
                Ok(ShardResponse::Ok) => Frame::Simple("OK".into()),
                Ok(ShardResponse::OutOfMemory) => Frame::Error(OOM_MSG.into()),
                other => unexpected(other),
            }
        }

        Command::Del { keys } => multi_key_bool(engine, &keys, |key| ShardRequest::Del { key }).await,

        Command::Exists { keys } => {
            multi_key_bool(engine, &keys, |key| ShardRequest::Exists { key }).await
        }

        Command::DbSize => match engine.broadcast(|| ShardRequest::DbSize).await {
            Ok(responses) => {
                let total: usize = responses
                    .iter()
                    .map(|r| match r {
                        ShardResponse::Count(n) => *n,
                        _ => 0,
                    })
                    .sum();
                Frame::Integer(total as i64)
            }
            Err(e) => Frame::Error(format!("ERR {e}")),
        },

        Command::Type { key } => {
            let req = ShardRequest::ValueType { key: key.clone() };
            match engine.single_hop(&key, req).await {
                Ok(ShardResponse::TypeName(name)) => Frame::Simple(name.into()),
                other => unexpected(other),
            }
        }

        // -- sorted sets --
        Command::ZAdd {
            key,
            flags,
            members,
        } => {
            let req = ShardRequest::ZAdd {
                key: key.clone(),
                flags: convert_flags(&flags),
                members,
            };
            zadd_reply(engine.single_hop(&key, req).await)
        }

        Command::ZIncrBy { key, delta, member } => {
            let flags = ZAddFlags {
                incr: true,
                ..ZAddFlags::default()
            };
            let req = ShardRequest::ZAdd {
                key: key.clone(),
                flags,
                members: vec![(delta, member)],
            };
            zadd_reply(engine.single_hop(&key, req).await)
        }

        Command::ZCard { key } => {
            let req = ShardRequest::ZCard { key: key.clone() };
            count_reply(engine.single_hop(&key, req).await)
        }

        Command::ZCount { key, min, max } => {
            let req = ShardRequest::ZCount {
                key: key.clone(),
                interval: score_interval(min, max),
            };
            count_reply(engine.single_hop(&key, req).await)
        }

        Command::ZLexCount { key, min, max } => {
            let req = ShardRequest::ZLexCount {
                key: key.clone(),
                interval: lex_interval(min, max),
            };
            count_reply(engine.single_hop(&key, req).await)
        }

        Command::ZScore { key, member } => {
            let req = ShardRequest::ZScore {
                key: key.clone(),
                member,
            };
            match engine.single_hop(&key, req).await {
                Ok(ShardResponse::Score(Some(score))) => bulk_double(score),
                Ok(ShardResponse::Score(None)) => Frame::Null,
                other => unexpected(other),
            }
        }

        Command::ZRank {
            key,
            member,
            reverse,
        } => {
            let req = ShardRequest::ZRank {
                key: key.clone(),
                member,
                reverse,
            };
            match engine.single_hop(&key, req).await {
                Ok(ShardResponse::Rank(Some(rank))) => Frame::Integer(rank as i64),
                Ok(ShardResponse::Rank(None)) => Frame::Null,
                other => unexpected(other),
            }
        }

        Command::ZRem { key, members } => {
            let req = ShardRequest::ZRem {
                key: key.clone(),
                members,
            };
            count_reply(engine.single_hop(&key, req).await)
        }

        Command::ZRange {
            key,
            start,
            stop,
            with_scores,
            reverse,
        } => {
            let spec = RangeSpec {
                interval: Interval::Rank(start, stop),
                params: RangeParams {
                    reverse,
                    with_scores,
                    ..RangeParams::default()
                },
            };
            range_reply(engine, key, spec, with_scores).await
        }

        Command::ZRangeByScore {
            key,
            min,
            max,
            with_scores,
            reverse,
            offset,
            limit,
        } => {
            let spec = RangeSpec {
                interval: Interval::Score(score_interval(min, max)),
                params: RangeParams {
                    reverse,
                    with_scores,
                    offset,
                    limit,
                },
            };
            range_reply(engine, key, spec, with_scores).await
        }

        Command::ZRangeByLex {
            key,
            min,
            max,
            offset,
            limit,
        } => {
            let spec = RangeSpec {
                interval: Interval::Lex(lex_interval(min, max)),
                params: RangeParams {
                    offset,
                    limit,
                    ..RangeParams::default()
                },
            };
            range_reply(engine, key, spec, false).await
        }

        Command::ZRemRangeByRank { key, start, stop } => {
            let req = ShardRequest::ZRemRange {
                key: key.clone(),
                interval: Interval::Rank(start, stop),
            };
            count_reply(engine.single_hop(&key, req).await)
        }

        Command::ZRemRangeByScore { key, min, max } => {
            let req = ShardRequest::ZRemRange {
                key: key.clone(),
                interval: Interval::Score(score_interval(min, max)),
            };
            count_reply(engine.single_hop(&key, req).await)
        }

        Command::ZRemRangeByLex { key, min, max } => {
            let req = ShardRequest::ZRemRange {
                key: key.clone(),
                interval: Interval::Lex(lex_interval(min, max)),
            };
            count_reply(engine.single_hop(&key, req).await)
        }

        Command::ZScan { key, cursor } => {
            let req = ShardRequest::ZScan {
                key: key.clone(),
                cursor,
            };
            match engine.single_hop(&key, req).await {
                Ok(ShardResponse::Scan { cursor, items }) => {
                    let mut pairs = Vec::with_capacity(items.len() * 2);
                    for (member, score) in items {
                        pairs.push(Frame::bulk(member));
                        pairs.push(bulk_double(score));
                    }
                    Frame::Array(vec![
                        Frame::bulk(cursor.to_string()),
                        Frame::Array(pairs),
                    ])
                }
                other => unexpected(other),
            }
        }

        Command::ZUnionStore(args) => store_reply(engine, args, SetOp::Union).await,
        Command::ZInterStore(args) => store_reply(engine, args, SetOp::Inter).await,

        Command::Unknown(name) => Frame::Error(format!("ERR unknown command '{name}'")),
    }
}

/// Runs a ZRANGE-family request and formats the scored array.
async fn range_reply(engine: &Engine, key: String, spec: RangeSpec, with_scores: bool) -> Frame {
    let req = ShardRequest::ZRange {
        key: key.clone(),
        spec,
    };
    match engine.single_hop(&key, req).await {
        Ok(ShardResponse::Scored(items)) => scored_array(items, with_scores),
        other => unexpected(other),
    }
}

/// Runs ZUNIONSTORE / ZINTERSTORE through the two-phase transaction.
async fn store_reply(engine: &Engine, args: StoreArgs, op: SetOp) -> Frame {
    let agg = match args.aggregate {
        command::AggregateFn::Sum => Aggregate::Sum,
        command::AggregateFn::Min => Aggregate::Min,
        command::AggregateFn::Max => Aggregate::Max,
    };
    match engine
        .zset_fold_store(&args.dest, &args.keys, &args.weights, op, agg)
        .await
    {
        Ok(ShardResponse::Count(n)) => Frame::Integer(n as i64),
        other => unexpected(other),
    }
}

/// Formats the shared ZADD / ZINCRBY reply shapes.
fn zadd_reply(result: Result<ShardResponse, cinder_core::ShardError>) -> Frame {
    match result {
        Ok(ShardResponse::ZAdd(ZAddReply::Count(n))) => Frame::Integer(n as i64),
        Ok(ShardResponse::ZAdd(ZAddReply::Incr(Some(score)))) => bulk_double(score),
        Ok(ShardResponse::ZAdd(ZAddReply::Incr(None))) => Frame::Null,
        other => unexpected(other),
    }
}

/// Formats any counting command's reply.
fn count_reply(result: Result<ShardResponse, cinder_core::ShardError>) -> Frame {
    match result {
        Ok(ShardResponse::Count(n)) => Frame::Integer(n as i64),
        other => unexpected(other),
    }
}

/// Maps the error responses every command shares, and flags anything
/// else as a bug.
fn unexpected(result: Result<ShardResponse, cinder_core::ShardError>) -> Frame {
    match result {
        Ok(ShardResponse::WrongType) => Frame::Error(WRONGTYPE_MSG.into()),
        Ok(ShardResponse::OutOfMemory) => Frame::Error(OOM_MSG.into()),
        Ok(ShardResponse::ScoreNan) => Frame::Error(SCORE_NAN_MSG.into()),
        Ok(other) => Frame::Error(format!("ERR unexpected shard response: {other:?}")),
        Err(e) => Frame::Error(format!("ERR {e}")),
    }
}

/// Fans out a boolean-result command across shards for multiple keys
/// and returns the count of `true` results as an integer frame.
async fn multi_key_bool<F>(engine: &Engine, keys: &[String], make_req: F) -> Frame
where
    F: Fn(String) -> ShardRequest,
{
    match engine.multi_key(keys, make_req).await {
        Ok(responses) => {
            let count = responses
                .iter()
                .filter(|r| matches!(r, ShardResponse::Bool(true)))
                .count();
            Frame::Integer(count as i64)
        }
        Err(e) => Frame::Error(format!("ERR {e}")),
    }
}

/// Builds the flat member/score array every range command replies with.
fn scored_array(items: Vec<(String, f64)>, with_scores: bool) -> Frame {
    let per_item = if with_scores { 2 } else { 1 };
    let mut frames = Vec::with_capacity(items.len() * per_item);
    for (member, score) in items {
        frames.push(Frame::bulk(member));
        if with_scores {
            frames.push(bulk_double(score));
        }
    }
    Frame::Array(frames)
}

fn bulk_double(score: f64) -> Frame {
    Frame::bulk(format_double(score))
}

fn convert_flags(flags: &cinder_protocol::ZAddFlags) -> ZAddFlags {
    ZAddFlags {
        nx: flags.nx,
        xx: flags.xx,
        gt: flags.gt,
        lt: flags.lt,
        ch: flags.ch,
        incr: flags.incr,
    }
}

fn score_interval(min: cinder_protocol::ScoreBound, max: cinder_protocol::ScoreBound) -> ScoreInterval {
    ScoreInterval {
        min: ScoreBound {
            value: min.value,
            open: min.open,
        },
        max: ScoreBound {
            value: max.value,
            open: max.open,
        },
    }
}

fn lex_interval(min: cinder_protocol::LexBound, max: cinder_protocol::LexBound) -> LexInterval {
    LexInterval {
        min: convert_lex(min),
        max: convert_lex(max),
    }
}

fn convert_lex(bound: cinder_protocol::LexBound) -> LexBound {
    match bound {
        cinder_protocol::LexBound::NegInf => LexBound::NegInf,
        cinder_protocol::LexBound::PosInf => LexBound::PosInf,
        cinder_protocol::LexBound::Open(s) => LexBound::Open(s),
        cinder_protocol::LexBound::Closed(s) => LexBound::Closed(s),
    }
}
