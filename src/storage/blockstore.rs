//! Block storage
//!
//! Persists accepted block headers indexed by height. The chain is dense:
//! heights run from 0 (genesis) to the tip without gaps, and every row links
//! to its parent through `prev_block_hash`. Only the genesis block has no
//! parent.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sled::Db;
use tracing::info;

use crate::codec::fields::PayloadWriter;
use crate::codec::hashing::{double_sha256, hash_to_hex, Hash, ZERO_HASH};
use crate::codec::messages::BlockMessage;
use crate::config::Network;

/// A block header as persisted, with its chain height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub version: u32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub height: u32,
}

impl StoredBlock {
    /// Convert an accepted protocol block into its persisted form
    pub fn from_message(block: &BlockMessage, height: u32) -> Self {
        Self {
            version: block.version,
            prev_block_hash: block.prev_block_hash,
            merkle_root: block.merkle_root,
            timestamp: block.timestamp,
            bits: block.bits,
            nonce: block.nonce,
            height,
        }
    }

    /// Block identity: double SHA256 of the serialized header
    pub fn hash(&self) -> Hash {
        let mut w = PayloadWriter::new();
        w.put_u32_le(self.version);
        w.put_hash(&self.prev_block_hash);
        w.put_hash(&self.merkle_root);
        w.put_u32_le(self.timestamp);
        w.put_u32_le(self.bits);
        w.put_u32_le(self.nonce);
        double_sha256(&w.into_bytes())
    }

    /// Canonical hex form of the block hash
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash())
    }
}

/// The genesis block literal for networks this peer can sync from scratch
pub fn genesis_block(network: Network) -> Option<StoredBlock> {
    // Merkle root of the shared genesis coinbase, wire order
    // (canonical hex 4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b)
    const GENESIS_MERKLE_ROOT: Hash = [
        0x3b, 0xa3, 0xed, 0xfd, 0x7a, 0x7b, 0x12, 0xb2, 0x7a, 0xc7, 0x2c, 0x3e, 0x67, 0x76, 0x8f,
        0x61, 0x7f, 0xc8, 0x1b, 0xc3, 0x88, 0x8a, 0x51, 0x32, 0x3a, 0x9f, 0xb8, 0xaa, 0x4b, 0x1e,
        0x5e, 0x4a,
    ];

    match network {
        Network::Bitcoin => Some(StoredBlock {
            version: 1,
            prev_block_hash: ZERO_HASH,
            merkle_root: GENESIS_MERKLE_ROOT,
            timestamp: 1_231_006_505,
            bits: 486_604_799,
            nonce: 2_083_236_893,
            height: 0,
        }),
        Network::BitcoinTestnet3 => Some(StoredBlock {
            version: 1,
            prev_block_hash: ZERO_HASH,
            merkle_root: GENESIS_MERKLE_ROOT,
            timestamp: 1_296_688_602,
            bits: 486_604_799,
            nonce: 414_098_458,
            height: 0,
        }),
        _ => None,
    }
}

/// Abstract block repository used by the validator and sync controller
///
/// `append` must be serialized with respect to itself and with the `latest`
/// read the validator uses; this crate has a single writer (the sync
/// session), so no locking is layered on top.
pub trait BlockStore {
    /// The current tip; a store is never empty once the genesis is seeded
    fn latest(&self) -> Result<StoredBlock>;

    /// Block at the given height; error when missing
    fn by_height(&self, height: u32) -> Result<StoredBlock>;

    /// Persist an accepted block as the child of `parent`
    fn append(&self, block: &BlockMessage, parent: &StoredBlock) -> Result<StoredBlock>;
}

/// Sled-backed block store
///
/// Rows are bincode-encoded [`StoredBlock`] values keyed by big-endian
/// height, so the tree's key order is the chain order.
pub struct SledBlockStore {
    #[allow(dead_code)]
    db: Db,
    blocks: sled::Tree,
}

impl SledBlockStore {
    /// Open the store, seeding the genesis row on first use
    pub fn open(db: Db, network: Network) -> Result<Self> {
        let blocks = db.open_tree("blocks")?;
        let store = Self { db, blocks };

        if store.blocks.is_empty() {
            let genesis = genesis_block(network)
                .with_context(|| format!("no genesis literal for network {network}"))?;
            store.put(&genesis)?;
            info!(network = %network, hash = %genesis.hash_hex(), "seeded genesis block");
        }
        Ok(store)
    }

    fn put(&self, block: &StoredBlock) -> Result<()> {
        let row = bincode::serialize(block)?;
        self.blocks.insert(block.height.to_be_bytes(), row)?;
        Ok(())
    }
}

impl BlockStore for SledBlockStore {
    fn latest(&self) -> Result<StoredBlock> {
        match self.blocks.last()? {
            Some((_, row)) => Ok(bincode::deserialize(&row)?),
            None => bail!("block store is empty"),
        }
    }

    fn by_height(&self, height: u32) -> Result<StoredBlock> {
        match self.blocks.get(height.to_be_bytes())? {
            Some(row) => Ok(bincode::deserialize(&row)?),
            None => bail!("no block at height {height}"),
        }
    }

    fn append(&self, block: &BlockMessage, parent: &StoredBlock) -> Result<StoredBlock> {
        let stored = StoredBlock::from_message(block, parent.height + 1);
        self.put(&stored)?;
        Ok(stored)
    }
}

/// In-memory block store used by tests and offline tooling
pub struct MemoryBlockStore {
    blocks: std::sync::Mutex<Vec<StoredBlock>>,
}

impl MemoryBlockStore {
    /// Create a store seeded with the given genesis block
    pub fn new(genesis: StoredBlock) -> Self {
        Self {
            blocks: std::sync::Mutex::new(vec![genesis]),
        }
    }

    /// Create a store for a network with a known genesis literal
    pub fn for_network(network: Network) -> Result<Self> {
        let genesis = genesis_block(network)
            .with_context(|| format!("no genesis literal for network {network}"))?;
        Ok(Self::new(genesis))
    }

    /// Number of stored blocks (tip height + 1)
    pub fn len(&self) -> usize {
        self.blocks.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for MemoryBlockStore {
    fn latest(&self) -> Result<StoredBlock> {
        let blocks = self.blocks.lock().expect("store lock poisoned");
        blocks.last().cloned().context("block store is empty")
    }

    fn by_height(&self, height: u32) -> Result<StoredBlock> {
        let blocks = self.blocks.lock().expect("store lock poisoned");
        blocks
            .get(height as usize)
            .cloned()
            .with_context(|| format!("no block at height {height}"))
    }

    fn append(&self, block: &BlockMessage, parent: &StoredBlock) -> Result<StoredBlock> {
        let stored = StoredBlock::from_message(block, parent.height + 1);
        let mut blocks = self.blocks.lock().expect("store lock poisoned");
        blocks.push(stored.clone());
        Ok(stored)
    }
}
