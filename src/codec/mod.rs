//! Wire codec for the Bitcoin-family P2P protocol
//!
//! Three layers, innermost first: binary field primitives ([`fields`]), the
//! per-command message schemas ([`messages`]) and the framed envelope with
//! its checksum ([`envelope`]). Hashing helpers shared by the checksum,
//! block identity and the script interpreter live in [`hashing`].

pub mod envelope;
pub mod fields;
pub mod hashing;
pub mod messages;

pub use envelope::{encode_message, FrameBuffer, MessageHeader};
pub use hashing::{double_sha256, hash_from_hex, hash_to_hex, Hash, ZERO_HASH};
pub use messages::ProtocolMessage;

/// Field- and payload-level decoding failures
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload ended before a field was complete
    #[error("unexpected end of payload")]
    UnexpectedEof,

    /// The command string maps to no known message schema
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Frame-level outcomes from the envelope parser
///
/// `InvalidChecksum` and `UnknownCommand` are recoverable: the offending
/// frame has already been discarded and the session may keep reading.
/// `Malformed` and `Oversized` are protocol violations that close the
/// session.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload checksum mismatch: header says {expected:#010x}, computed {computed:#010x}")]
    InvalidChecksum { expected: u32, computed: u32 },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed payload: {0}")]
    Malformed(#[source] DecodeError),

    #[error("frame payload of {0} bytes exceeds the protocol limit")]
    Oversized(usize),
}

impl FrameError {
    /// True for the error kinds the session loop swallows
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidChecksum { .. } | Self::UnknownCommand(_))
    }
}
