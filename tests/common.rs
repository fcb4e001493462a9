//! Shared test fixtures: in-process session pairs, scripted raw peers and
//! synthetic chains with an easy proof-of-work target.

#![allow(dead_code)]

use std::cell::RefCell;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use bllvm_peer::codec::envelope::encode_message;
use bllvm_peer::codec::messages::{BlockMessage, ProtocolMessage};
use bllvm_peer::codec::{FrameBuffer, ZERO_HASH};
use bllvm_peer::config::Network;
use bllvm_peer::network::{PeerSession, StreamConnection};
use bllvm_peer::script::SignatureVerifier;
use bllvm_peer::storage::{BlockStore, MemoryBlockStore, StoredBlock};

/// A compact target so large that every hash satisfies it; lets tests build
/// accepted chains without mining
pub const EASY_BITS: u32 = 0x217FFFFF;

/// A target of 1; effectively nothing satisfies it
pub const IMPOSSIBLE_BITS: u32 = 0x03000001;

pub type DuplexSession = PeerSession<StreamConnection<DuplexStream>>;

/// Two fully-wired sessions talking to each other in process
pub fn session_pair(network: Network) -> (DuplexSession, DuplexSession) {
    let (a, b) = tokio::io::duplex(256 * 1024);
    (
        PeerSession::new(StreamConnection::new(a), network, "/test-a:0.1/"),
        PeerSession::new(StreamConnection::new(b), network, "/test-b:0.1/"),
    )
}

/// A session on one end and a hand-driven raw peer on the other
pub fn session_with_raw_peer(network: Network) -> (DuplexSession, RawPeer) {
    let (a, b) = tokio::io::duplex(256 * 1024);
    (
        PeerSession::new(StreamConnection::new(a), network, "/test:0.1/"),
        RawPeer::new(b, network),
    )
}

/// Scripted peer: writes raw frames and parses whatever the session sends
pub struct RawPeer {
    stream: DuplexStream,
    frames: FrameBuffer,
    magic: u32,
}

impl RawPeer {
    pub fn new(stream: DuplexStream, network: Network) -> Self {
        Self {
            stream,
            frames: FrameBuffer::new(),
            magic: network.magic(),
        }
    }

    pub fn frame_bytes(&self, message: &ProtocolMessage) -> Vec<u8> {
        encode_message(self.magic, message)
    }

    pub async fn send(&mut self, message: &ProtocolMessage) {
        let bytes = self.frame_bytes(message);
        self.stream.write_all(&bytes).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Read until the next complete frame arrives
    pub async fn recv(&mut self) -> ProtocolMessage {
        loop {
            if let Some(message) = self.frames.next_frame().unwrap() {
                return message;
            }
            let mut buf = [0u8; 8192];
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "session closed while a frame was expected");
            self.frames.extend(&buf[..n]);
        }
    }

    /// Read frames until one matches the command, failing on anything
    /// unexpected arriving first
    pub async fn recv_command(&mut self, command: &str) -> ProtocolMessage {
        let message = self.recv().await;
        assert_eq!(message.command(), command, "unexpected message order");
        message
    }
}

/// Genesis of a synthetic chain every block can build on without mining
pub fn easy_genesis() -> StoredBlock {
    StoredBlock {
        version: 1,
        prev_block_hash: ZERO_HASH,
        merkle_root: [0xEE; 32],
        timestamp: 1_300_000_000,
        bits: EASY_BITS,
        nonce: 0,
        height: 0,
    }
}

/// A minimal child block linking to `prev`
pub fn child_block(prev: &StoredBlock, nonce: u32) -> BlockMessage {
    BlockMessage {
        version: 1,
        prev_block_hash: prev.hash(),
        merkle_root: [nonce as u8; 32],
        timestamp: prev.timestamp + 600,
        bits: prev.bits,
        nonce,
        transactions: vec![],
    }
}

/// Extend a store by `count` trivially-valid blocks
pub fn grow_chain(store: &MemoryBlockStore, count: u32) {
    for _ in 0..count {
        let prev = store.latest().unwrap();
        let block = child_block(&prev, prev.height + 1);
        store.append(&block, &prev).unwrap();
    }
}

/// Signature verifier that approves everything
pub struct AcceptAllVerifier;

impl SignatureVerifier for AcceptAllVerifier {
    fn verify(&self, _signature: &[u8], _pubkey: &[u8], _subscript: &[u8]) -> bool {
        true
    }
}

/// Signature verifier that rejects everything
pub struct RejectAllVerifier;

impl SignatureVerifier for RejectAllVerifier {
    fn verify(&self, _signature: &[u8], _pubkey: &[u8], _subscript: &[u8]) -> bool {
        false
    }
}

/// Records every verification request and answers with a fixed result
#[derive(Default)]
pub struct RecordingVerifier {
    pub calls: RefCell<Vec<(Vec<u8>, Vec<u8>, Vec<u8>)>>,
    pub result: bool,
}

impl RecordingVerifier {
    pub fn accepting() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            result: true,
        }
    }
}

impl SignatureVerifier for RecordingVerifier {
    fn verify(&self, signature: &[u8], pubkey: &[u8], subscript: &[u8]) -> bool {
        self.calls
            .borrow_mut()
            .push((signature.to_vec(), pubkey.to_vec(), subscript.to_vec()));
        self.result
    }
}
