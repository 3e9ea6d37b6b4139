//! Hop-ledger node
//!
//! Runs one ledger node and serves its HTTP API.

use clap::Parser;
use hop_ledger::api::{create_router, ApiState};
use hop_ledger::network::{Node, NodeConfig};
use hop_ledger::storage::{Storage, StorageConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hop-node")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A proof-of-work ledger node for signed hop counts", long_about = None)]
struct Cli {
    /// Port to listen on; also names this node's data files
    #[arg(short, long, default_value = "5000")]
    port: u16,

    /// Data directory for ledger storage
    #[arg(short, long, default_value = "db")]
    data_dir: PathBuf,

    /// Peer to register at startup (host:port), repeatable
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Timeout for each call to a peer, in seconds
    #[arg(long, default_value = "5")]
    peer_timeout_secs: u64,

    /// Append-only file of hop counts ingested by POST /file-check
    #[arg(long)]
    hop_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let storage = Storage::new(StorageConfig {
            data_dir: cli.data_dir.clone(),
        })?;

        let config = NodeConfig {
            node_id: cli.port.to_string(),
            peer_timeout: Duration::from_secs(cli.peer_timeout_secs),
            hop_file: cli.hop_file.clone(),
        };
        let node = Arc::new(Node::with_http_peers(config, storage)?);

        for peer in &cli.peers {
            node.add_peer(peer).await;
        }

        println!(
            "📂 Node {} using data directory {}",
            node.node_id(),
            cli.data_dir.display()
        );
        if let Some(hop_file) = &cli.hop_file {
            println!("📈 Hop counts read from {}", hop_file.display());
        }
        println!(
            "⛓️  Chain height: {}, pending transactions: {}",
            node.chain_snapshot().await.len(),
            node.pool_snapshot().await.len()
        );
        match node.identity().await {
            Some(owner) => println!("🔑 Wallet loaded: {}", owner),
            None => println!("🔑 No wallet yet, create one with POST /wallet"),
        }
        let peers = node.peers().await;
        if !peers.is_empty() {
            println!("🌐 Peers: {:?}", peers);
        }

        let app = create_router(ApiState { node });

        let addr = format!("0.0.0.0:{}", cli.port);
        println!("🚀 Ledger node listening on http://localhost:{}", cli.port);

        tokio::spawn(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\n📴 Shutting down ledger node...");
                std::process::exit(0);
            }
        });

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
