//! PigCache Daemon - HTTP cache node

mod client;
mod db;
mod handler;
mod membership;
mod parser;
mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use pigcache::{GroupRegistry, PeerGetter, PeerPicker, PeerPool, DEFAULT_REPLICAS};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::client::HttpGetter;
use crate::db::SlowDb;
use crate::handler::{RequestHandler, DEFAULT_BASE_PATH, STATS_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, env = "PIGCACHE_BIND", default_value = "127.0.0.1:8001")]
    bind: String,

    /// This node's URL as listed in --peers [default: http://<bind>]
    #[arg(long, env = "PIGCACHE_SELF")]
    self_url: Option<String>,

    /// Peer base URLs, comma-separated (this node is added if missing)
    #[arg(short, long, env = "PIGCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Virtual replicas per peer on the hash ring
    #[arg(long, default_value_t = DEFAULT_REPLICAS)]
    replicas: usize,

    /// Cache capacity in bytes (0 = unbounded)
    #[arg(short, long, default_value_t = 2 << 10)]
    cache_bytes: usize,

    /// Path prefix for peer requests
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    /// Name of the demo group
    #[arg(short, long, default_value = "scores")]
    group: String,

    /// Deadline for each lookup in milliseconds (0 = none)
    #[arg(long, default_value_t = 0)]
    request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PIGCACHE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Health check mode (for Docker)
    #[arg(long)]
    health: bool,
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    // Health check
    if args.health {
        match TcpStream::connect(&args.bind).await {
            Ok(_) => {
                println!("OK");
                std::process::exit(0);
            }
            Err(_) => {
                eprintln!("FAILED");
                std::process::exit(1);
            }
        }
    }

    if !args.base_path.starts_with('/') || !args.base_path.ends_with('/') {
        anyhow::bail!("Invalid base path: {} (must start and end with '/')", args.base_path);
    }

    let aliases = membership::find_self_aliases(&args.bind, &args.peers).await;
    let (self_id, peers) =
        membership::self_membership(&args.bind, args.self_url.as_deref(), &args.peers, &aliases);

    info!("Starting PigCache Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Node: {}", self_id);
    info!("Peers: {:?}", peers);
    info!("Cache capacity: {} bytes", args.cache_bytes);

    let client = reqwest::Client::new();
    let base_path = args.base_path.clone();
    let pool = Arc::new(PeerPool::new(
        self_id.clone(),
        args.replicas,
        move |peer: &str| -> Arc<dyn PeerGetter> {
            Arc::new(HttpGetter::new(client.clone(), peer, &base_path))
        },
    ));
    pool.set_peers(&peers);

    let registry = Arc::new(GroupRegistry::with_peers(pool as Arc<dyn PeerPicker>));
    registry.new_group(args.group.clone(), args.cache_bytes, SlowDb::new());

    let request_timeout = match args.request_timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    let handler = Arc::new(
        RequestHandler::new(self_id.clone(), args.base_path.clone(), Arc::clone(&registry))
            .with_request_timeout(request_timeout),
    );

    let listener = TcpListener::bind(&args.bind).await?;
    info!("Server listening on {}", args.bind);

    println!("\nPigCache node ready");
    println!("   Node:    {}", self_id);
    println!("   Lookup:  {}{}{}/<key>", self_id, args.base_path, args.group);
    println!("   Stats:   {}{}", self_id, STATS_PATH);
    println!("\nPress Ctrl+C to stop\n");

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        on_signal.cancel();
    });

    server::serve(listener, handler, shutdown).await
}
