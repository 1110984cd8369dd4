use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

use cinder_server::{config, server};

/// A Redis-compatible sorted-set server, sharded across cores.
#[derive(Debug, Parser)]
#[command(name = "cinder-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 6379)]
    port: u16,

    /// Number of shards. Defaults to the number of CPU cores.
    #[arg(long)]
    shards: Option<usize>,

    /// Total memory limit, e.g. "512M" or "2G". Unlimited when absent.
    #[arg(long)]
    maxmemory: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinder=info".into()),
        )
        .init();

    let args = Args::parse();

    let shard_count = args.shards.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let max_memory = match args.maxmemory.as_deref() {
        Some(input) => Some(config::parse_byte_size(input)?),
        None => None,
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let engine_config = config::build_engine_config(max_memory, shard_count);

    info!("cinder server starting");
    server::run(addr, shard_count, engine_config).await
}
