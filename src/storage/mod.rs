//! Persistence layer
//!
//! The chain of accepted headers is the only durable state this peer keeps.

pub mod blockstore;

pub use blockstore::{genesis_block, BlockStore, MemoryBlockStore, SledBlockStore, StoredBlock};
