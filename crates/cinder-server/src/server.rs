//! TCP server that accepts client connections and spawns handler tasks.

use std::net::SocketAddr;

use cinder_core::{Engine, EngineConfig};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::connection;

/// Binds to `addr` and runs the accept loop.
///
/// Spawns a sharded engine with the given shard count and config, then
/// hands each incoming connection a cheap clone of the engine handle.
pub async fn run(
    addr: SocketAddr,
    shard_count: usize,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::with_config(shard_count, config);
    let listener = TcpListener::bind(addr).await?;

    info!("listening on {addr} with {} shards", engine.shard_count());

    serve(listener, engine).await
}

/// The accept loop, split out so tests can bind their own listener
/// (port 0) and drive the same code path.
pub async fn serve(
    listener: TcpListener,
    engine: Engine,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let engine = engine.clone();

        tokio::spawn(async move {
            if let Err(e) = connection::handle(stream, engine).await {
                error!("connection error from {peer}: {e}");
            }
        });
    }
}
