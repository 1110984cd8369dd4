//! Integration tests for the sorted-set command family.

use cinder_protocol::Frame;

use crate::helpers::TestServer;

// --- basic add / score / rank ---

#[tokio::test]
async fn zadd_nx_keeps_first_score() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    assert_eq!(c.get_int(&["ZADD", "k", "NX", "1", "a"]).await, 1);
    assert_eq!(c.get_int(&["ZADD", "k", "NX", "2", "a"]).await, 0);
    assert_eq!(c.get_bulk(&["ZSCORE", "k", "a"]).await, Some("1".into()));
}

#[tokio::test]
async fn zrange_and_zrevrange_with_scores() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    assert_eq!(c.get_int(&["ZADD", "k", "1", "a", "2", "b", "3", "c"]).await, 3);
    assert_eq!(
        c.get_array(&["ZRANGE", "k", "0", "-1", "WITHSCORES"]).await,
        ["a", "1", "b", "2", "c", "3"]
    );
    assert_eq!(
        c.get_array(&["ZREVRANGE", "k", "0", "1", "WITHSCORES"]).await,
        ["c", "3", "b", "2"]
    );
}

#[tokio::test]
async fn zrangebyscore_bounds_and_limit() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b", "3", "c"]).await;
    assert_eq!(
        c.get_array(&["ZRANGEBYSCORE", "k", "(1", "+inf"]).await,
        ["b", "c"]
    );
    assert_eq!(
        c.get_array(&["ZRANGEBYSCORE", "k", "-inf", "2", "LIMIT", "0", "1"]).await,
        ["a"]
    );
}

#[tokio::test]
async fn zincrby_accumulates_and_nan_errors() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b"]).await;
    assert_eq!(
        c.get_bulk(&["ZINCRBY", "k", "3.5", "a"]).await,
        Some("4.5".into())
    );

    c.cmd(&["ZINCRBY", "k", "-inf", "a"]).await;
    let msg = c.err(&["ZINCRBY", "k", "+inf", "a"]).await;
    assert!(msg.contains("resulting score is not a number (NaN)"));
}

#[tokio::test]
async fn zrangebylex_and_zremrangebylex() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "0", "a", "0", "b", "0", "c", "0", "d"]).await;
    assert_eq!(c.get_array(&["ZRANGEBYLEX", "k", "[b", "(d"]).await, ["b", "c"]);
    assert_eq!(c.get_int(&["ZREMRANGEBYLEX", "k", "-", "[b"]).await, 2);
    assert_eq!(c.get_array(&["ZRANGE", "k", "0", "-1"]).await, ["c", "d"]);
}

// --- ranks, counts, removal ---

#[tokio::test]
async fn zrank_and_zrevrank() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b", "3", "c"]).await;
    assert_eq!(c.get_int(&["ZRANK", "k", "a"]).await, 0);
    assert_eq!(c.get_int(&["ZRANK", "k", "c"]).await, 2);
    assert_eq!(c.get_int(&["ZREVRANK", "k", "c"]).await, 0);
    assert!(c.cmd(&["ZRANK", "k", "nope"]).await.is_null());
    assert!(c.cmd(&["ZRANK", "missing", "a"]).await.is_null());
}

#[tokio::test]
async fn zcount_and_zlexcount() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b", "3", "c"]).await;
    assert_eq!(c.get_int(&["ZCOUNT", "k", "-inf", "+inf"]).await, 3);
    assert_eq!(c.get_int(&["ZCOUNT", "k", "(1", "3"]).await, 2);

    c.cmd(&["ZADD", "lex", "0", "a", "0", "b", "0", "c"]).await;
    assert_eq!(c.get_int(&["ZLEXCOUNT", "lex", "-", "+"]).await, 3);
    assert_eq!(c.get_int(&["ZLEXCOUNT", "lex", "[b", "+"]).await, 2);
}

#[tokio::test]
async fn zrem_and_empty_set_deletes_key() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b"]).await;
    assert_eq!(c.get_int(&["ZREM", "k", "a", "ghost"]).await, 1);
    assert_eq!(c.get_int(&["ZREM", "k", "b"]).await, 1);
    assert_eq!(c.get_int(&["EXISTS", "k"]).await, 0);
    assert_eq!(c.get_int(&["ZCARD", "k"]).await, 0);
}

#[tokio::test]
async fn zremrangebyrank_and_byscore() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b", "3", "c", "4", "d"]).await;
    assert_eq!(c.get_int(&["ZREMRANGEBYRANK", "k", "0", "1"]).await, 2);
    assert_eq!(c.get_array(&["ZRANGE", "k", "0", "-1"]).await, ["c", "d"]);

    assert_eq!(c.get_int(&["ZREMRANGEBYSCORE", "k", "(3", "+inf"]).await, 1);
    assert_eq!(c.get_array(&["ZRANGE", "k", "0", "-1"]).await, ["c"]);
}

#[tokio::test]
async fn zrevrangebyscore_takes_max_first() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b", "3", "c"]).await;
    assert_eq!(
        c.get_array(&["ZREVRANGEBYSCORE", "k", "3", "(1"]).await,
        ["c", "b"]
    );
    assert_eq!(
        c.get_array(&["ZREVRANGEBYSCORE", "k", "+inf", "-inf", "LIMIT", "1", "1"]).await,
        ["b"]
    );
}

// --- flag matrix errors ---

#[tokio::test]
async fn zadd_flag_conflicts() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    let msg = c.err(&["ZADD", "k", "NX", "XX", "1", "a"]).await;
    assert!(msg.contains("XX and NX options at the same time"));

    let msg = c.err(&["ZADD", "k", "GT", "LT", "1", "a"]).await;
    assert!(msg.contains("GT, LT, and/or NX"));

    let msg = c.err(&["ZADD", "k", "INCR", "1", "a", "2", "b"]).await;
    assert!(msg.contains("single increment-element pair"));
}

#[tokio::test]
async fn zadd_gt_with_xx_updates_only_upward() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "5", "m"]).await;
    assert_eq!(c.get_int(&["ZADD", "k", "XX", "GT", "CH", "3", "m"]).await, 0);
    assert_eq!(c.get_bulk(&["ZSCORE", "k", "m"]).await, Some("5".into()));
    assert_eq!(c.get_int(&["ZADD", "k", "XX", "GT", "CH", "9", "m"]).await, 1);
    assert_eq!(c.get_bulk(&["ZSCORE", "k", "m"]).await, Some("9".into()));
    // XX+GT never creates
    assert_eq!(c.get_int(&["ZADD", "k", "XX", "GT", "CH", "1", "new"]).await, 0);
}

#[tokio::test]
async fn zadd_incr_gated_returns_nil() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "5", "m"]).await;
    assert!(c.cmd(&["ZADD", "k", "NX", "INCR", "1", "m"]).await.is_null());
    assert!(c.cmd(&["ZADD", "k", "XX", "INCR", "1", "other"]).await.is_null());
    assert_eq!(
        c.get_bulk(&["ZADD", "k", "INCR", "1", "m"]).await,
        Some("6".into())
    );
}

#[tokio::test]
async fn bad_bounds_error() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    let msg = c.err(&["ZCOUNT", "k", "abc", "1"]).await;
    assert!(msg.contains("min or max is not a float"));

    let msg = c.err(&["ZRANGEBYLEX", "k", "b", "+"]).await;
    assert!(msg.contains("not valid string range item"));

    let msg = c.err(&["ZADD", "k", "notanumber", "m"]).await;
    assert!(msg.contains("not a valid float"));
}

#[tokio::test]
async fn wrongtype_against_string_key() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["SET", "s", "v"]).await;
    for cmd in [
        vec!["ZADD", "s", "1", "m"],
        vec!["ZSCORE", "s", "m"],
        vec!["ZCARD", "s"],
        vec!["ZRANGE", "s", "0", "-1"],
        vec!["ZREM", "s", "m"],
        vec!["ZSCAN", "s", "0"],
    ] {
        let msg = c.err(&cmd).await;
        assert!(msg.starts_with("WRONGTYPE"), "{cmd:?} → {msg}");
    }
}

// --- encoding transition ---

#[tokio::test]
async fn promotion_preserves_listing() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    // push far past the packed entry limit
    for i in 0..200 {
        let score = format!("{i}");
        let member = format!("m{i:03}");
        c.cmd(&["ZADD", "big", &score, &member]).await;
    }
    assert_eq!(c.get_int(&["ZCARD", "big"]).await, 200);
    assert_eq!(c.get_int(&["ZRANK", "big", "m199"]).await, 199);

    let listing = c.get_array(&["ZRANGE", "big", "0", "-1"]).await;
    assert_eq!(listing.len(), 200);
    assert_eq!(listing[0], "m000");
    assert_eq!(listing[199], "m199");
}

#[tokio::test]
async fn long_member_promotes() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    let long = "x".repeat(100);
    c.cmd(&["ZADD", "k", "1", "short"]).await;
    c.cmd(&["ZADD", "k", "2", &long]).await;
    assert_eq!(c.get_int(&["ZCARD", "k"]).await, 2);
    assert_eq!(c.get_bulk(&["ZSCORE", "k", &long]).await, Some("2".into()));
}

// --- zscan ---

#[tokio::test]
async fn zscan_small_set_one_shot() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "a", "2", "b"]).await;
    let reply = c.cmd(&["ZSCAN", "k", "0"]).await;
    let Frame::Array(parts) = reply else {
        panic!("expected Array");
    };
    assert_eq!(parts[0], Frame::Bulk("0".into()));
    let Frame::Array(items) = &parts[1] else {
        panic!("expected inner Array");
    };
    assert_eq!(items.len(), 4); // member/score pairs
}

#[tokio::test]
async fn zscan_large_set_pages_to_completion() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    for i in 0..150 {
        let score = format!("{i}");
        let member = format!("m{i:03}");
        c.cmd(&["ZADD", "big", &score, &member]).await;
    }

    let mut cursor = "0".to_string();
    let mut seen = 0;
    loop {
        let reply = c.cmd(&["ZSCAN", "big", &cursor]).await;
        let Frame::Array(parts) = reply else {
            panic!("expected Array");
        };
        let Frame::Bulk(next) = &parts[0] else {
            panic!("expected cursor");
        };
        let Frame::Array(items) = &parts[1] else {
            panic!("expected items");
        };
        seen += items.len() / 2;
        cursor = String::from_utf8_lossy(next).to_string();
        if cursor == "0" {
            break;
        }
    }
    assert_eq!(seen, 150);
}

#[tokio::test]
async fn zscan_rejects_options() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    let msg = c.err(&["ZSCAN", "k", "0", "COUNT", "10"]).await;
    assert!(msg.contains("not supported"));

    let msg = c.err(&["ZSCAN", "k", "notacursor"]).await;
    assert!(msg.contains("invalid cursor"));
}

// --- ordering properties ---

#[tokio::test]
async fn listing_is_sorted_after_arbitrary_updates() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    // inserts, overwrites, and removals in no particular order
    let ops: &[(&str, &str)] = &[
        ("5", "e"),
        ("3", "c"),
        ("9", "i"),
        ("3", "b"),
        ("1", "a"),
        ("7", "c"), // move c up
        ("2", "h"),
    ];
    for (score, member) in ops {
        c.cmd(&["ZADD", "k", score, member]).await;
    }
    c.cmd(&["ZREM", "k", "i"]).await;

    let with_scores = c.get_array(&["ZRANGE", "k", "0", "-1", "WITHSCORES"]).await;
    let scores: Vec<f64> = with_scores
        .chunks(2)
        .map(|pair| pair[1].parse().unwrap())
        .collect();
    let mut sorted = scores.clone();
    sorted.sort_by(f64::total_cmp);
    assert_eq!(scores, sorted);

    // forward and reverse listings mirror each other
    let forward = c.get_array(&["ZRANGE", "k", "0", "-1"]).await;
    let mut reverse = c.get_array(&["ZREVRANGE", "k", "0", "-1"]).await;
    reverse.reverse();
    assert_eq!(forward, reverse);
}

#[tokio::test]
async fn tie_scores_order_lexicographically() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.cmd(&["ZADD", "k", "1", "zebra", "1", "apple", "1", "mango"]).await;
    assert_eq!(
        c.get_array(&["ZRANGE", "k", "0", "-1"]).await,
        ["apple", "mango", "zebra"]
    );
}
