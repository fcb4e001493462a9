//! Protocol message catalog
//!
//! One struct per message with an explicit field schema, plus the
//! [`ProtocolMessage`] enum used for command dispatch. Schemas are written
//! out field by field; there is no reflective serialization, so the wire
//! order is exactly what the code says it is.
//!
//! Trailing payload bytes beyond a message's schema are ignored: newer
//! protocol revisions append fields (e.g. `start_height`/`relay` on
//! `version`) that this peer does not consume.

use super::fields::{NetworkAddress, PayloadReader, PayloadWriter, TimestampedAddress};
use super::hashing::{double_sha256, hash_to_hex, Hash};
use super::DecodeError;

/// The protocol version advertised in `version` messages
pub const PROTOCOL_VERSION: i32 = 60002;

/// Service bit for a full network node
pub const NODE_NETWORK: u64 = 0x1;

/// Inventory type: error / unused entry
pub const INV_ERROR: u32 = 0;
/// Inventory type: transaction
pub const MSG_TX: u32 = 1;
/// Inventory type: block
pub const MSG_BLOCK: u32 = 2;

/// A 36-byte inventory entry advertising or requesting one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryItem {
    pub inv_type: u32,
    pub hash: Hash,
}

impl InventoryItem {
    pub fn block(hash: Hash) -> Self {
        Self {
            inv_type: MSG_BLOCK,
            hash,
        }
    }

    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            inv_type: r.read_u32_le()?,
            hash: r.read_hash()?,
        })
    }

    fn encode(&self, w: &mut PayloadWriter) {
        w.put_u32_le(self.inv_type);
        w.put_hash(&self.hash);
    }
}

/// Version handshake message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub addr_recv: NetworkAddress,
    pub addr_from: NetworkAddress,
    pub nonce: u64,
    pub user_agent: String,
}

impl VersionMessage {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: r.read_i32_le()?,
            services: r.read_u64_le()?,
            timestamp: r.read_i64_le()?,
            addr_recv: NetworkAddress::decode(r)?,
            addr_from: NetworkAddress::decode(r)?,
            nonce: r.read_u64_le()?,
            user_agent: r.read_var_string()?,
        })
    }

    fn encode(&self, w: &mut PayloadWriter) {
        w.put_i32_le(self.version);
        w.put_u64_le(self.services);
        w.put_i64_le(self.timestamp);
        self.addr_recv.encode(w);
        self.addr_from.encode(w);
        w.put_u64_le(self.nonce);
        w.put_var_string(&self.user_agent);
    }
}

/// Ping keep-alive; the pong must echo the nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingMessage {
    pub nonce: u64,
}

/// Pong reply to a ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongMessage {
    pub nonce: u64,
}

/// Inventory announcement (`inv`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvMessage {
    pub inventory: Vec<InventoryItem>,
}

/// Inventory request (`getdata`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDataMessage {
    pub inventory: Vec<InventoryItem>,
}

/// Negative reply to a `getdata` (`notfound`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundMessage {
    pub inventory: Vec<InventoryItem>,
}

/// Known-peer advertisement (`addr`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrMessage {
    pub addresses: Vec<TimestampedAddress>,
}

/// A transaction outpoint: funding transaction hash plus output index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            hash: r.read_hash()?,
            index: r.read_u32_le()?,
        })
    }

    fn encode(&self, w: &mut PayloadWriter) {
        w.put_hash(&self.hash);
        w.put_u32_le(self.index);
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            previous_output: OutPoint::decode(r)?,
            signature_script: r.read_var_bytes()?,
            sequence: r.read_u32_le()?,
        })
    }

    fn encode(&self, w: &mut PayloadWriter) {
        self.previous_output.encode(w);
        w.put_var_bytes(&self.signature_script);
        w.put_u32_le(self.sequence);
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub pk_script: Vec<u8>,
}

impl TxOut {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            value: r.read_i64_le()?,
            pk_script: r.read_var_bytes()?,
        })
    }

    fn encode(&self, w: &mut PayloadWriter) {
        w.put_i64_le(self.value);
        w.put_var_bytes(&self.pk_script);
    }
}

/// A full transaction (`tx` message body, also nested inside blocks)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let version = r.read_u32_le()?;
        let input_count = r.read_var_int()?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(TxIn::decode(r)?);
        }
        let output_count = r.read_var_int()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(TxOut::decode(r)?);
        }
        let lock_time = r.read_u32_le()?;
        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn encode(&self, w: &mut PayloadWriter) {
        w.put_u32_le(self.version);
        w.put_var_int(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(w);
        }
        w.put_var_int(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(w);
        }
        w.put_u32_le(self.lock_time);
    }

    /// Transaction hash: double SHA256 over the serialized transaction
    pub fn txid(&self) -> Hash {
        let mut w = PayloadWriter::new();
        self.encode(&mut w);
        double_sha256(&w.into_bytes())
    }
}

/// A block: 80-byte header plus its transactions
///
/// `headers` payloads carry the same shape with an empty transaction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMessage {
    pub version: u32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub transactions: Vec<Transaction>,
}

impl BlockMessage {
    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let version = r.read_u32_le()?;
        let prev_block_hash = r.read_hash()?;
        let merkle_root = r.read_hash()?;
        let timestamp = r.read_u32_le()?;
        let bits = r.read_u32_le()?;
        let nonce = r.read_u32_le()?;
        let txn_count = r.read_var_int()?;
        let mut transactions = Vec::new();
        for _ in 0..txn_count {
            transactions.push(Transaction::decode(r)?);
        }
        Ok(Self {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
            transactions,
        })
    }

    pub fn encode(&self, w: &mut PayloadWriter) {
        self.encode_header(w);
        w.put_var_int(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode(w);
        }
    }

    /// The six hashed header fields in wire order
    pub fn encode_header(&self, w: &mut PayloadWriter) {
        w.put_u32_le(self.version);
        w.put_hash(&self.prev_block_hash);
        w.put_hash(&self.merkle_root);
        w.put_u32_le(self.timestamp);
        w.put_u32_le(self.bits);
        w.put_u32_le(self.nonce);
    }

    /// Block identity: double SHA256 of the serialized header, wire order
    pub fn block_hash(&self) -> Hash {
        let mut w = PayloadWriter::new();
        self.encode_header(&mut w);
        double_sha256(&w.into_bytes())
    }

    /// Canonical hex form of the block hash
    pub fn block_hash_hex(&self) -> String {
        hash_to_hex(&self.block_hash())
    }
}

/// Header catch-up reply (`headers`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersMessage {
    pub headers: Vec<BlockMessage>,
}

/// Chain catch-up request (`getblocks`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBlocksMessage {
    pub version: u32,
    pub block_locator_hashes: Vec<Hash>,
    pub hash_stop: Hash,
}

impl GetBlocksMessage {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let version = r.read_u32_le()?;
        let count = r.read_var_int()?;
        let mut block_locator_hashes = Vec::new();
        for _ in 0..count {
            block_locator_hashes.push(r.read_hash()?);
        }
        let hash_stop = r.read_hash()?;
        Ok(Self {
            version,
            block_locator_hashes,
            hash_stop,
        })
    }

    fn encode(&self, w: &mut PayloadWriter) {
        w.put_u32_le(self.version);
        w.put_var_int(self.block_locator_hashes.len() as u64);
        for hash in &self.block_locator_hashes {
            w.put_hash(hash);
        }
        w.put_hash(&self.hash_stop);
    }
}

/// All protocol messages this peer speaks, keyed by command string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    Version(VersionMessage),
    Verack,
    Ping(PingMessage),
    Pong(PongMessage),
    Inv(InvMessage),
    GetData(GetDataMessage),
    NotFound(NotFoundMessage),
    Addr(AddrMessage),
    Tx(Transaction),
    Block(BlockMessage),
    Headers(HeadersMessage),
    GetBlocks(GetBlocksMessage),
    MemPool,
    GetAddr,
}

fn decode_inventory(r: &mut PayloadReader<'_>) -> Result<Vec<InventoryItem>, DecodeError> {
    let count = r.read_var_int()?;
    let mut inventory = Vec::new();
    for _ in 0..count {
        inventory.push(InventoryItem::decode(r)?);
    }
    Ok(inventory)
}

fn encode_inventory(w: &mut PayloadWriter, inventory: &[InventoryItem]) {
    w.put_var_int(inventory.len() as u64);
    for item in inventory {
        item.encode(w);
    }
}

impl ProtocolMessage {
    /// The 12-byte command string identifying this message on the wire
    pub fn command(&self) -> &'static str {
        match self {
            Self::Version(_) => "version",
            Self::Verack => "verack",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::Inv(_) => "inv",
            Self::GetData(_) => "getdata",
            Self::NotFound(_) => "notfound",
            Self::Addr(_) => "addr",
            Self::Tx(_) => "tx",
            Self::Block(_) => "block",
            Self::Headers(_) => "headers",
            Self::GetBlocks(_) => "getblocks",
            Self::MemPool => "mempool",
            Self::GetAddr => "getaddr",
        }
    }

    /// Serialize the message payload (without the envelope header)
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut w = PayloadWriter::new();
        match self {
            Self::Version(m) => m.encode(&mut w),
            Self::Verack | Self::MemPool | Self::GetAddr => {}
            Self::Ping(m) => w.put_u64_le(m.nonce),
            Self::Pong(m) => w.put_u64_le(m.nonce),
            Self::Inv(m) => encode_inventory(&mut w, &m.inventory),
            Self::GetData(m) => encode_inventory(&mut w, &m.inventory),
            Self::NotFound(m) => encode_inventory(&mut w, &m.inventory),
            Self::Addr(m) => {
                w.put_var_int(m.addresses.len() as u64);
                for addr in &m.addresses {
                    addr.encode(&mut w);
                }
            }
            Self::Tx(m) => m.encode(&mut w),
            Self::Block(m) => m.encode(&mut w),
            Self::Headers(m) => {
                w.put_var_int(m.headers.len() as u64);
                for header in &m.headers {
                    header.encode(&mut w);
                }
            }
            Self::GetBlocks(m) => m.encode(&mut w),
        }
        w.into_bytes()
    }

    /// Deserialize a payload by its command string
    pub fn decode_payload(command: &str, payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let message = match command {
            "version" => Self::Version(VersionMessage::decode(&mut r)?),
            "verack" => Self::Verack,
            "ping" => Self::Ping(PingMessage {
                nonce: r.read_u64_le()?,
            }),
            "pong" => Self::Pong(PongMessage {
                nonce: r.read_u64_le()?,
            }),
            "inv" => Self::Inv(InvMessage {
                inventory: decode_inventory(&mut r)?,
            }),
            "getdata" => Self::GetData(GetDataMessage {
                inventory: decode_inventory(&mut r)?,
            }),
            "notfound" => Self::NotFound(NotFoundMessage {
                inventory: decode_inventory(&mut r)?,
            }),
            "addr" => {
                let count = r.read_var_int()?;
                let mut addresses = Vec::new();
                for _ in 0..count {
                    addresses.push(TimestampedAddress::decode(&mut r)?);
                }
                Self::Addr(AddrMessage { addresses })
            }
            "tx" => Self::Tx(Transaction::decode(&mut r)?),
            "block" => Self::Block(BlockMessage::decode(&mut r)?),
            "headers" => {
                let count = r.read_var_int()?;
                let mut headers = Vec::new();
                for _ in 0..count {
                    headers.push(BlockMessage::decode(&mut r)?);
                }
                Self::Headers(HeadersMessage { headers })
            }
            "getblocks" => Self::GetBlocks(GetBlocksMessage::decode(&mut r)?),
            "mempool" => Self::MemPool,
            "getaddr" => Self::GetAddr,
            _ => return Err(DecodeError::UnknownCommand(command.to_string())),
        };
        Ok(message)
    }
}
