//! Seed bootstrap for peer discovery
//!
//! Resolves DNS seeds and asks each resulting node for its address book:
//! connect, handshake, `getaddr`, collect one `addr` batch, disconnect. A
//! seed gets 40 seconds before the next one is tried after a short
//! cooldown. The whole exchange runs as a single task racing the session
//! against a timer.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::net::lookup_host;
use tracing::{info, warn};

use crate::codec::fields::TimestampedAddress;
use crate::codec::messages::{AddrMessage, ProtocolMessage};
use crate::config::Network;
use crate::network::peer::{MessageHandler, Outbox, PeerSession, SessionError};
use crate::network::transport;

/// Wall-clock budget for one seed node
pub const SEED_TIMEOUT: Duration = Duration::from_secs(40);

/// Pause before moving on to the next seed
pub const SEED_COOLDOWN: Duration = Duration::from_secs(10);

/// Addresses learned during bootstrap, owned by the caller
///
/// Append-only while bootstrap runs; the sync phase only reads from it.
#[derive(Debug, Default)]
pub struct AddressBook {
    addresses: Vec<TimestampedAddress>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addresses(&self) -> &[TimestampedAddress] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn extend(&mut self, addresses: impl IntoIterator<Item = TimestampedAddress>) {
        self.addresses.extend(addresses);
    }

    /// Remove and return the most recently seen address
    pub fn take_freshest(&mut self) -> Option<SocketAddr> {
        let (index, _) = self
            .addresses
            .iter()
            .enumerate()
            .max_by_key(|(_, a)| a.timestamp)?;
        Some(self.addresses.swap_remove(index).address.socket_addr())
    }
}

/// Session handler that requests addresses and stops on the first batch
#[derive(Default)]
struct SeedHandler {
    collected: Vec<TimestampedAddress>,
}

#[async_trait]
impl MessageHandler for SeedHandler {
    async fn on_handshake(&mut self, out: &mut Outbox) -> Result<()> {
        out.send(ProtocolMessage::GetAddr);
        Ok(())
    }

    async fn on_addr(&mut self, message: &AddrMessage, out: &mut Outbox) -> Result<()> {
        self.collected.extend(message.addresses.iter().copied());
        out.disconnect();
        Ok(())
    }
}

/// Populate an [`AddressBook`] from the given seed hosts
pub async fn bootstrap(
    network: Network,
    user_agent: &str,
    seeds: &[String],
) -> Result<AddressBook> {
    if seeds.is_empty() {
        bail!("no seed hosts configured for network {network}");
    }

    let mut seeds = seeds.to_vec();
    seeds.shuffle(&mut rand::thread_rng());

    let mut book = AddressBook::new();
    for (attempt, seed) in seeds.iter().enumerate() {
        if attempt > 0 {
            tokio::time::sleep(SEED_COOLDOWN).await;
        }
        match query_seed(network, user_agent, seed).await {
            Ok(addresses) if !addresses.is_empty() => {
                info!(seed = %seed, count = addresses.len(), "bootstrap complete");
                book.extend(addresses);
                return Ok(book);
            }
            Ok(_) => warn!(seed = %seed, "seed produced no addresses"),
            Err(e) => warn!(seed = %seed, error = %e, "seed bootstrap failed"),
        }
    }
    bail!("all seed hosts exhausted without addresses")
}

/// Run one bounded getaddr exchange against a seed host
async fn query_seed(
    network: Network,
    user_agent: &str,
    seed: &str,
) -> Result<Vec<TimestampedAddress>> {
    let port = network.default_port();
    let addr = lookup_host((seed.to_string(), port))
        .await
        .with_context(|| format!("resolving seed {seed}"))?
        .next()
        .with_context(|| format!("seed {seed} resolved to no addresses"))?;
    info!(seed = %seed, addr = %addr, "querying seed node");

    let conn = transport::connect(addr).await?;
    let mut session = PeerSession::new(conn, network, user_agent).with_peer_addr(addr);
    let mut handler = SeedHandler::default();

    match tokio::time::timeout(SEED_TIMEOUT, session.run(&mut handler)).await {
        // Orderly disconnect after the addr batch
        Ok(Ok(())) => {}
        // Keep whatever arrived before the peer hung up
        Ok(Err(SessionError::Disconnected)) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => warn!(seed = %seed, "seed timed out"),
    }
    Ok(handler.collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::fields::NetworkAddress;

    fn entry(timestamp: u32, last_octet: u8) -> TimestampedAddress {
        TimestampedAddress {
            timestamp,
            address: NetworkAddress::new(
                std::net::Ipv4Addr::new(10, 0, 0, last_octet),
                8333,
                1,
            ),
        }
    }

    #[test]
    fn test_take_freshest_prefers_recent() {
        let mut book = AddressBook::new();
        book.extend([entry(100, 1), entry(300, 3), entry(200, 2)]);

        let freshest = book.take_freshest().unwrap();
        assert_eq!(freshest.ip().to_string(), "10.0.0.3");
        assert_eq!(book.len(), 2);

        let next = book.take_freshest().unwrap();
        assert_eq!(next.ip().to_string(), "10.0.0.2");
    }

    #[test]
    fn test_take_freshest_empty() {
        let mut book = AddressBook::new();
        assert!(book.take_freshest().is_none());
    }
}
