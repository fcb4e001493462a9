//! Configuration management for bllvm-peer
//!
//! Handles configuration loading and the table of supported networks.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Bitcoin DNS seeds (mainnet)
/// These are well-known DNS names that resolve to active node addresses
pub const MAINNET_DNS_SEEDS: &[&str] = &[
    "seed.bitcoin.sipa.be",
    "dnsseed.bluematt.me",
    "dnsseed.bitcoin.dashjr.org",
    "seed.bitcoinstats.com",
    "seed.bitcoin.jonasschnelli.ch",
    "seed.btc.petertodd.org",
    "seed.bitcoin.sprovoost.nl",
];

/// Testnet3 DNS seeds
pub const TESTNET3_DNS_SEEDS: &[&str] = &[
    "testnet-seed.bitcoin.jonasschnelli.ch",
    "seed.tbtc.petertodd.org",
    "seed.testnet.bitcoin.sprovoost.nl",
    "testnet-seed.bluematt.me",
];

/// The networks this peer can join, keyed by envelope magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Bitcoin,
    BitcoinTestnet,
    BitcoinTestnet3,
    Namecoin,
    Litecoin,
    LitecoinTestnet,
}

impl Network {
    /// The 4-byte magic value prefixing every envelope on this network
    pub fn magic(&self) -> u32 {
        match self {
            Self::Bitcoin => 0xD9B4BEF9,
            Self::BitcoinTestnet => 0xDAB5BFFA,
            Self::BitcoinTestnet3 => 0x0709110B,
            Self::Namecoin => 0xFEB4BEF9,
            Self::Litecoin => 0xDBB6C0FB,
            Self::LitecoinTestnet => 0xDCB7C1FC,
        }
    }

    /// Default TCP port for peer connections
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Bitcoin => 8333,
            Self::BitcoinTestnet | Self::BitcoinTestnet3 => 18333,
            Self::Namecoin => 8334,
            Self::Litecoin => 9333,
            Self::LitecoinTestnet => 19335,
        }
    }

    /// Whether the 20-minute difficulty exception applies
    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Self::BitcoinTestnet | Self::BitcoinTestnet3 | Self::LitecoinTestnet
        )
    }

    /// Built-in DNS seed hosts for bootstrap
    pub fn dns_seeds(&self) -> &'static [&'static str] {
        match self {
            Self::Bitcoin => MAINNET_DNS_SEEDS,
            Self::BitcoinTestnet3 => TESTNET3_DNS_SEEDS,
            _ => &[],
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bitcoin => "bitcoin",
            Self::BitcoinTestnet => "bitcoin_testnet",
            Self::BitcoinTestnet3 => "bitcoin_testnet3",
            Self::Namecoin => "namecoin",
            Self::Litecoin => "litecoin",
            Self::LitecoinTestnet => "litecoin_testnet",
        };
        f.write_str(name)
    }
}

/// Peer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network to join
    #[serde(default = "default_network")]
    pub network: Network,

    /// Explicit peer to sync from; bypasses seed bootstrap when set
    #[serde(default)]
    pub peer: Option<SocketAddr>,

    /// Extra DNS seed hosts, consulted before the built-in list
    #[serde(default)]
    pub dns_seeds: Vec<String>,

    /// Directory holding the block database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// User agent advertised in the version handshake
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_network() -> Network {
    Network::BitcoinTestnet3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_user_agent() -> String {
    format!("/bllvm-peer:{}/", env!("CARGO_PKG_VERSION"))
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            peer: None,
            dns_seeds: Vec::new(),
            data_dir: default_data_dir(),
            user_agent: default_user_agent(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Seed hosts to try during bootstrap: configured first, then built-in
    pub fn seed_hosts(&self) -> Vec<String> {
        let mut hosts = self.dns_seeds.clone();
        hosts.extend(self.network.dns_seeds().iter().map(|s| s.to_string()));
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_values() {
        assert_eq!(Network::Bitcoin.magic(), 0xD9B4BEF9);
        assert_eq!(Network::BitcoinTestnet3.magic(), 0x0709110B);
        assert_eq!(Network::Litecoin.magic(), 0xDBB6C0FB);
    }

    #[test]
    fn test_config_parse_with_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            network = "bitcoin_testnet3"
            peer = "127.0.0.1:18333"
            "#,
        )
        .unwrap();
        assert_eq!(config.network, Network::BitcoinTestnet3);
        assert_eq!(config.peer.unwrap().port(), 18333);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.user_agent.starts_with("/bllvm-peer:"));
    }

    #[test]
    fn test_seed_hosts_prefer_configured() {
        let config = NodeConfig {
            network: Network::Bitcoin,
            dns_seeds: vec!["seed.example.org".to_string()],
            ..NodeConfig::default()
        };
        let hosts = config.seed_hosts();
        assert_eq!(hosts[0], "seed.example.org");
        assert!(hosts.len() > 1);
    }
}
