//! Integration tests for ZUNIONSTORE / ZINTERSTORE, exercising the
//! two-phase gather/store transaction across shards.

use crate::helpers::TestServer;

#[tokio::test]
async fn zunionstore_weights_and_max() {
    let server = TestServer::start_with_shards(4).await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k1", "1", "a", "2", "b", "3", "c"]).await;
    c.cmd(&["ZADD", "k2", "10", "b", "20", "c", "30", "d"]).await;

    assert_eq!(
        c.get_int(&[
            "ZUNIONSTORE",
            "out",
            "2",
            "k1",
            "k2",
            "WEIGHTS",
            "1",
            "2",
            "AGGREGATE",
            "MAX",
        ])
        .await,
        4
    );
    assert_eq!(
        c.get_array(&["ZRANGE", "out", "0", "-1", "WITHSCORES"]).await,
        ["a", "1", "b", "20", "c", "40", "d", "60"]
    );
}

#[tokio::test]
async fn zunionstore_default_sum() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k1", "1", "a", "2", "b"]).await;
    c.cmd(&["ZADD", "k2", "10", "b", "20", "c"]).await;

    assert_eq!(c.get_int(&["ZUNIONSTORE", "out", "2", "k1", "k2"]).await, 3);
    assert_eq!(
        c.get_array(&["ZRANGE", "out", "0", "-1", "WITHSCORES"]).await,
        ["a", "1", "b", "12", "c", "20"]
    );
}

#[tokio::test]
async fn zinterstore_intersects_across_shards() {
    let server = TestServer::start_with_shards(4).await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k1", "1", "a", "2", "b", "3", "c"]).await;
    c.cmd(&["ZADD", "k2", "10", "b", "20", "c", "30", "d"]).await;

    assert_eq!(c.get_int(&["ZINTERSTORE", "out", "2", "k1", "k2"]).await, 2);
    assert_eq!(
        c.get_array(&["ZRANGE", "out", "0", "-1", "WITHSCORES"]).await,
        ["b", "12", "c", "23"]
    );
}

#[tokio::test]
async fn zinterstore_with_missing_input_clears_dest() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k1", "1", "a"]).await;
    c.cmd(&["ZADD", "out", "9", "stale"]).await;

    assert_eq!(
        c.get_int(&["ZINTERSTORE", "out", "2", "k1", "missing"]).await,
        0
    );
    assert_eq!(c.get_int(&["EXISTS", "out"]).await, 0);
}

#[tokio::test]
async fn zunionstore_of_missing_keys_writes_nothing() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    assert_eq!(
        c.get_int(&["ZUNIONSTORE", "out", "2", "nope1", "nope2"]).await,
        0
    );
    assert_eq!(c.get_int(&["EXISTS", "out"]).await, 0);
}

#[tokio::test]
async fn store_argument_errors() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    let msg = c.err(&["ZUNIONSTORE", "out", "0"]).await;
    assert!(msg.contains("at least 1 input key is needed for zunionstore"));

    let msg = c.err(&["ZINTERSTORE", "out", "0"]).await;
    assert!(msg.contains("at least 1 input key is needed for zinterstore"));

    let msg = c
        .err(&["ZUNIONSTORE", "out", "1", "k", "WEIGHTS", "abc"])
        .await;
    assert!(msg.contains("weight value is not a float"));

    let msg = c
        .err(&["ZUNIONSTORE", "out", "1", "k", "AGGREGATE", "AVG"])
        .await;
    assert!(msg.contains("syntax error"));
}

#[tokio::test]
async fn wrongtype_input_aborts_store() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["SET", "str", "v"]).await;
    c.cmd(&["ZADD", "dest", "1", "keep"]).await;

    let msg = c.err(&["ZUNIONSTORE", "dest", "2", "str", "dest"]).await;
    assert!(msg.starts_with("WRONGTYPE"));

    // the destination was not overwritten
    assert_eq!(c.get_int(&["ZCARD", "dest"]).await, 1);
}

#[tokio::test]
async fn union_source_can_be_destination() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b"]).await;
    assert_eq!(c.get_int(&["ZUNIONSTORE", "k", "1", "k", "WEIGHTS", "3"]).await, 2);
    assert_eq!(
        c.get_array(&["ZRANGE", "k", "0", "-1", "WITHSCORES"]).await,
        ["a", "3", "b", "6"]
    );
}

#[tokio::test]
async fn nan_producing_union_errors() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k1", "+inf", "m"]).await;
    c.cmd(&["ZADD", "k2", "-inf", "m"]).await;

    let msg = c.err(&["ZUNIONSTORE", "out", "2", "k1", "k2"]).await;
    assert!(msg.contains("not a number"));
    assert_eq!(c.get_int(&["EXISTS", "out"]).await, 0);
}
