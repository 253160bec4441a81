//! ShelfDB Server Binary
//!
//! Starts the TCP server for ShelfDB.

use std::sync::Arc;

use clap::Parser;
use shelfdb::network::Server;
use shelfdb::{Config, Engine, WalSyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// ShelfDB Server
#[derive(Parser, Debug)]
#[command(name = "shelfdb-server")]
#[command(about = "Collection-oriented key-value store")]
#[command(version)]
struct Args {
    /// Root directory for all databases
    #[arg(short, long, default_value = "./files")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    listen: String,

    /// Maximum queued connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Connection worker threads
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Bound the cache to this many entries (unbounded if omitted)
    #[arg(short, long)]
    cache_capacity: Option<usize>,

    /// Extra log entries tolerated before an index log is compacted
    #[arg(long, default_value = "10000")]
    compaction_threshold: usize,

    /// fsync index logs after every write
    #[arg(long)]
    sync_every_write: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shelfdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ShelfDB Server v{}", shelfdb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .compaction_threshold(args.compaction_threshold);
    if let Some(capacity) = args.cache_capacity {
        builder = builder.cache_capacity(capacity);
    }
    if args.sync_every_write {
        builder = builder.wal_sync_strategy(WalSyncStrategy::EveryWrite);
    }
    let config = builder.build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.shutdown() {
        tracing::error!("Failed to close databases: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
