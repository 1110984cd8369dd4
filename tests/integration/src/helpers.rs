//! Test helpers for spawning an in-process server and sending commands.

use bytes::{Bytes, BytesMut};
use cinder_core::{Engine, EngineConfig};
use cinder_protocol::{parse_frame, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// An in-process server bound to a random port.
///
/// The accept loop runs on a background task that dies with the
/// runtime, so there is nothing to clean up.
pub struct TestServer {
    pub port: u16,
}

impl TestServer {
    /// Starts a server with two shards — small enough to stay cheap,
    /// large enough that multi-key commands actually cross shards.
    pub async fn start() -> Self {
        Self::start_with_shards(2).await
    }

    pub async fn start_with_shards(shards: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let port = listener.local_addr().expect("listener has an addr").port();

        let engine = Engine::with_config(shards, EngineConfig::default());
        tokio::spawn(async move {
            let _ = cinder_server::server::serve(listener, engine).await;
        });

        Self { port }
    }

    /// Connects a test client to this server.
    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.port).await
    }
}

/// A minimal RESP2 client for integration testing.
pub struct TestClient {
    stream: TcpStream,
    buf: BytesMut,
}

impl TestClient {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(format!("127.0.0.1:{port}"))
            .await
            .unwrap_or_else(|e| panic!("failed to connect to 127.0.0.1:{port}: {e}"));
        Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Sends a command and returns the parsed response frame.
    pub async fn cmd(&mut self, args: &[&str]) -> Frame {
        let parts: Vec<Frame> = args
            .iter()
            .map(|a| Frame::Bulk(Bytes::copy_from_slice(a.as_bytes())))
            .collect();
        let frame = Frame::Array(parts);

        let mut out = BytesMut::new();
        frame.serialize(&mut out);
        self.stream.write_all(&out).await.unwrap();

        loop {
            match parse_frame(&self.buf) {
                Ok(Some((frame, consumed))) => {
                    let _ = self.buf.split_to(consumed);
                    return frame;
                }
                Ok(None) => {
                    let n = self.stream.read_buf(&mut self.buf).await.unwrap();
                    if n == 0 {
                        panic!("server closed connection while waiting for response");
                    }
                }
                Err(e) => panic!("protocol error: {e}"),
            }
        }
    }

    /// Sends a command and extracts the bulk string value.
    pub async fn get_bulk(&mut self, args: &[&str]) -> Option<String> {
        match self.cmd(args).await {
            Frame::Bulk(data) => Some(String::from_utf8_lossy(&data).to_string()),
            Frame::Null => None,
            other => panic!("expected Bulk or Null, got {other:?}"),
        }
    }

    /// Sends a command and extracts the integer value.
    pub async fn get_int(&mut self, args: &[&str]) -> i64 {
        match self.cmd(args).await {
            Frame::Integer(n) => n,
            other => panic!("expected Integer, got {other:?}"),
        }
    }

    /// Sends a command and expects an error response. Returns the message.
    pub async fn err(&mut self, args: &[&str]) -> String {
        match self.cmd(args).await {
            Frame::Error(msg) => msg,
            other => panic!("expected Error, got {other:?}"),
        }
    }

    /// Sends a command and extracts a flat array of strings.
    pub async fn get_array(&mut self, args: &[&str]) -> Vec<String> {
        match self.cmd(args).await {
            Frame::Array(frames) => frames
                .into_iter()
                .map(|f| match f {
                    Frame::Bulk(data) => String::from_utf8_lossy(&data).to_string(),
                    other => panic!("expected Bulk element, got {other:?}"),
                })
                .collect(),
            other => panic!("expected Array, got {other:?}"),
        }
    }
}
