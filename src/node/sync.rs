//! Block sync controller
//!
//! After the handshake, asks the peer for blocks with a locator built from
//! the local chain, converts `inv` announcements into `getdata` requests,
//! validates each arriving block against the tip and appends the accepted
//! ones. When the last announced block lands, the next `getblocks` round
//! starts from the new tip.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::codec::hashing::{hash_to_hex, Hash, ZERO_HASH};
use crate::codec::messages::{
    BlockMessage, GetBlocksMessage, GetDataMessage, InvMessage, NotFoundMessage, ProtocolMessage,
    PROTOCOL_VERSION,
};
use crate::config::Network;
use crate::network::peer::{MessageHandler, Outbox};
use crate::storage::BlockStore;
use crate::validation::{validate_block, Verdict};

/// Build the block locator for the current chain: the tip and the ten
/// blocks below it, then heights stepping down by doubling strides, ending
/// at or past the genesis.
pub fn block_locator(store: &impl BlockStore) -> Result<Vec<Hash>> {
    let top = i64::from(store.latest()?.height);
    let mut hashes = Vec::new();
    let mut height = top;
    let mut step = 1i64;
    while height >= 0 {
        hashes.push(store.by_height(height as u32)?.hash());
        if height <= top - 10 {
            step *= 2;
        }
        height -= step;
    }
    Ok(hashes)
}

/// Sync pipeline state for one peer session
pub struct SyncController<S> {
    store: S,
    network: Network,
    /// Hash of the last block the peer announced; its arrival triggers the
    /// next `getblocks`
    last_expected: Option<Hash>,
}

impl<S: BlockStore + Send> SyncController<S> {
    pub fn new(store: S, network: Network) -> Self {
        Self {
            store,
            network,
            last_expected: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the controller, handing the store back
    pub fn into_store(self) -> S {
        self.store
    }

    fn request_more_blocks(&self, out: &mut Outbox) -> Result<()> {
        let locator = block_locator(&self.store)?;
        debug!(locator_len = locator.len(), "requesting more blocks");
        out.send(ProtocolMessage::GetBlocks(GetBlocksMessage {
            version: PROTOCOL_VERSION as u32,
            block_locator_hashes: locator,
            hash_stop: ZERO_HASH,
        }));
        Ok(())
    }
}

#[async_trait]
impl<S: BlockStore + Send> MessageHandler for SyncController<S> {
    async fn on_handshake(&mut self, out: &mut Outbox) -> Result<()> {
        let tip = self.store.latest()?;
        info!(height = tip.height, "starting block sync");
        self.request_more_blocks(out)
    }

    async fn on_inv(&mut self, message: &InvMessage, out: &mut Outbox) -> Result<()> {
        // Request data for every inv; block handling sorts out strays
        let Some(last) = message.inventory.last() else {
            return Ok(());
        };
        self.last_expected = Some(last.hash);
        debug!(count = message.inventory.len(), "requesting announced inventory");
        out.send(ProtocolMessage::GetData(GetDataMessage {
            inventory: message.inventory.clone(),
        }));
        Ok(())
    }

    async fn on_block(&mut self, block: &BlockMessage, out: &mut Outbox) -> Result<()> {
        let prev = self.store.latest()?;
        match validate_block(&self.store, self.network, block, &prev)? {
            Verdict::Accept => {}
            Verdict::Reject(reason) => {
                warn!(height = prev.height + 1, %reason, "rejecting block");
                return Ok(());
            }
        }

        let stored = self.store.append(block, &prev)?;
        info!(height = stored.height, hash = %stored.hash_hex(), "accepted block");

        if self.last_expected == Some(block.block_hash()) {
            // Last of the announced batch; ask for the next stretch
            self.request_more_blocks(out)?;
        }
        Ok(())
    }

    async fn on_notfound(&mut self, message: &NotFoundMessage, _out: &mut Outbox) -> Result<()> {
        for item in &message.inventory {
            info!(hash = %hash_to_hex(&item.hash), "peer reported inventory not found");
        }
        Ok(())
    }
}
