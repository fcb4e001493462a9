//! Network layer
//!
//! Peer sessions over an abstract transport, plus the seed bootstrap that
//! discovers peers to sync from.

pub mod bootstrap;
pub mod peer;
pub mod transport;

pub use bootstrap::{bootstrap, AddressBook};
pub use peer::{MessageHandler, Outbox, PeerSession, SessionError, SessionState};
pub use transport::{connect, Connection, StreamConnection};
