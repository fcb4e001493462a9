//! bllvm-peer binary: sync a chain of headers from one peer

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bllvm_peer::config::{Network, NodeConfig};
use bllvm_peer::network::{bootstrap, transport, PeerSession, SessionError};
use bllvm_peer::node::SyncController;
use bllvm_peer::storage::SledBlockStore;

#[derive(Parser, Debug)]
#[command(name = "bllvm-peer", version, about = "Minimal Bitcoin-family network peer")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network to join (overrides the config file)
    #[arg(long)]
    network: Option<String>,

    /// Peer to sync from, bypassing seed bootstrap
    #[arg(long)]
    peer: Option<SocketAddr>,

    /// Data directory for the block database
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn parse_network(name: &str) -> Result<Network> {
    let network = match name {
        "bitcoin" => Network::Bitcoin,
        "bitcoin_testnet" => Network::BitcoinTestnet,
        "bitcoin_testnet3" => Network::BitcoinTestnet3,
        "namecoin" => Network::Namecoin,
        "litecoin" => Network::Litecoin,
        "litecoin_testnet" => Network::LitecoinTestnet,
        other => anyhow::bail!("unknown network: {other}"),
    };
    Ok(network)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(name) = &args.network {
        config.network = parse_network(name)?;
    }
    if let Some(peer) = args.peer {
        config.peer = Some(peer);
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    info!(network = %config.network, data_dir = %config.data_dir.display(), "starting bllvm-peer");

    let db_path = config.data_dir.join("blocks.db");
    let db = sled::open(&db_path)
        .with_context(|| format!("opening block database at {}", db_path.display()))?;
    let store = SledBlockStore::open(db, config.network)?;

    let peer_addr = match config.peer {
        Some(addr) => addr,
        None => {
            let mut book =
                bootstrap::bootstrap(config.network, &config.user_agent, &config.seed_hosts())
                    .await?;
            book.take_freshest()
                .context("bootstrap produced an empty address book")?
        }
    };

    info!(peer = %peer_addr, "connecting");
    let conn = transport::connect(peer_addr).await?;
    let mut session = PeerSession::new(conn, config.network, config.user_agent.clone())
        .with_peer_addr(peer_addr);
    let mut controller = SyncController::new(store, config.network);

    match session.run(&mut controller).await {
        Ok(()) => info!("session closed"),
        Err(SessionError::Disconnected) => warn!("peer disconnected"),
        Err(e) => return Err(e.into()),
    }

    let tip = bllvm_peer::storage::BlockStore::latest(controller.store())?;
    info!(height = tip.height, hash = %tip.hash_hex(), "chain tip at shutdown");
    Ok(())
}
