//! Integration tests for strings, generic commands, and protocol basics.

use cinder_protocol::Frame;

use crate::helpers::TestServer;

#[tokio::test]
async fn ping_and_echo() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    assert_eq!(c.cmd(&["PING"]).await, Frame::Simple("PONG".into()));
    assert_eq!(c.get_bulk(&["PING", "hey"]).await, Some("hey".into()));
    assert_eq!(c.get_bulk(&["ECHO", "hello"]).await, Some("hello".into()));
}

#[tokio::test]
async fn set_get_del() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    assert_eq!(c.cmd(&["SET", "k", "v"]).await, Frame::Simple("OK".into()));
    assert_eq!(c.get_bulk(&["GET", "k"]).await, Some("v".into()));
    assert_eq!(c.get_int(&["DEL", "k"]).await, 1);
    assert_eq!(c.get_bulk(&["GET", "k"]).await, None);
}

#[tokio::test]
async fn exists_and_dbsize_across_shards() {
    let server = TestServer::start_with_shards(4).await;
    let mut c = server.connect().await;

    for key in ["a", "b", "c", "d", "e", "f"] {
        c.cmd(&["SET", key, "x"]).await;
    }
    assert_eq!(c.get_int(&["EXISTS", "a", "b", "nope"]).await, 2);
    assert_eq!(c.get_int(&["DBSIZE"]).await, 6);
}

#[tokio::test]
async fn type_command() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["SET", "s", "v"]).await;
    c.cmd(&["ZADD", "z", "1", "m"]).await;

    assert_eq!(c.cmd(&["TYPE", "s"]).await, Frame::Simple("string".into()));
    assert_eq!(c.cmd(&["TYPE", "z"]).await, Frame::Simple("zset".into()));
    assert_eq!(c.cmd(&["TYPE", "nope"]).await, Frame::Simple("none".into()));
}

#[tokio::test]
async fn unknown_command_errors() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    let msg = c.err(&["FROB", "x"]).await;
    assert!(msg.contains("unknown command"));
}

#[tokio::test]
async fn pipelined_commands() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    // several commands land in one write; replies come back in order
    c.cmd(&["SET", "p1", "1"]).await;
    c.cmd(&["SET", "p2", "2"]).await;
    assert_eq!(c.get_bulk(&["GET", "p1"]).await, Some("1".into()));
    assert_eq!(c.get_bulk(&["GET", "p2"]).await, Some("2".into()));
}
