//! bllvm-peer - Minimal Bitcoin-family network peer
//!
//! This crate implements the narrow slice of a node needed to follow a
//! chain: it dials a peer, speaks the framed wire protocol, validates the
//! header chain it is served (proof of work, retargeting, the testnet
//! 20-minute rule) and persists accepted headers. A restricted stack
//! machine evaluates transaction unlocking scripts.
//!
//! ## Layering
//!
//! 1. `codec` - field primitives, message schemas, envelope framing
//! 2. `network` - transport, peer session state machine, seed bootstrap
//! 3. `storage` + `validation` - the persisted header chain and its rules
//! 4. `node` - the sync pipeline tying 1-3 together
//! 5. `script` - the transaction script interpreter
//!
//! Everything consensus-critical is deterministic and synchronous; only the
//! socket edges are async.

// Memory allocator optimization using mimalloc (faster than default allocator)
#[cfg(not(target_os = "windows"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod codec;
pub mod config;
pub mod network;
pub mod node;
pub mod script;
pub mod storage;
pub mod validation;

// Re-export the types most callers touch
pub use codec::messages::{BlockMessage, ProtocolMessage, Transaction};
pub use codec::{Hash, ZERO_HASH};
pub use config::{Network, NodeConfig};
pub use network::{MessageHandler, PeerSession};
pub use node::SyncController;
pub use script::{Script, SignatureVerifier};
pub use storage::{BlockStore, StoredBlock};
