//! Node orchestration
//!
//! Drives chain synchronization against one peer at a time.

pub mod sync;

pub use sync::{block_locator, SyncController};
