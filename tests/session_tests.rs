//! Peer session tests over an in-process transport

mod common;

use async_trait::async_trait;
use common::*;

use bllvm_peer::codec::messages::{
    InvMessage, InventoryItem, PingMessage, PongMessage, ProtocolMessage,
};
use bllvm_peer::config::Network;
use bllvm_peer::network::{MessageHandler, Outbox, SessionError, SessionState};

const NETWORK: Network = Network::BitcoinTestnet3;

/// Records the handshake and stops the session
#[derive(Default)]
struct HandshakeProbe {
    fired: bool,
}

#[async_trait]
impl MessageHandler for HandshakeProbe {
    async fn on_handshake(&mut self, out: &mut Outbox) -> anyhow::Result<()> {
        self.fired = true;
        out.disconnect();
        Ok(())
    }
}

/// Counts inv deliveries in order, stopping after the expected number
struct InvProbe {
    seen: Vec<Vec<InventoryItem>>,
    expected: usize,
}

#[async_trait]
impl MessageHandler for InvProbe {
    async fn on_inv(&mut self, message: &InvMessage, out: &mut Outbox) -> anyhow::Result<()> {
        self.seen.push(message.inventory.clone());
        if self.seen.len() == self.expected {
            out.disconnect();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_handshake_both_sides() {
    let (mut a, mut b) = session_pair(NETWORK);
    let mut probe_a = HandshakeProbe::default();
    let mut probe_b = HandshakeProbe::default();

    let (result_a, result_b) = tokio::join!(a.run(&mut probe_a), b.run(&mut probe_b));

    // Whichever side closes first leaves the other with a disconnect; both
    // outcomes are orderly
    for result in [result_a, result_b] {
        match result {
            Ok(()) | Err(SessionError::Disconnected) => {}
            Err(e) => panic!("unexpected session error: {e}"),
        }
    }
    assert!(probe_a.fired, "initiator handshake callback");
    assert!(probe_b.fired, "responder handshake callback");
    assert_eq!(a.state(), SessionState::Closed);
    assert_eq!(b.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_ping_gets_pong_with_same_nonce() {
    let (mut session, mut raw) = session_with_raw_peer(NETWORK);

    let driver = tokio::spawn(async move {
        let mut handler = HandshakeProbe::default();
        let _ = session.run(&mut handler).await;
    });

    // Complete the handshake from the raw side
    let version = raw.recv_command("version").await;
    assert!(matches!(version, ProtocolMessage::Version(_)));
    raw.send(&version).await;
    raw.recv_command("verack").await;

    raw.send(&ProtocolMessage::Ping(PingMessage { nonce: 0x1234 })).await;
    let reply = raw.recv_command("pong").await;
    assert_eq!(
        reply,
        ProtocolMessage::Pong(PongMessage { nonce: 0x1234 })
    );

    driver.abort();
}

#[tokio::test]
async fn test_two_frames_in_one_write_dispatch_in_order() {
    let (mut session, mut raw) = session_with_raw_peer(NETWORK);

    let driver = tokio::spawn(async move {
        let mut probe = InvProbe {
            seen: Vec::new(),
            expected: 2,
        };
        let _ = session.run(&mut probe).await;
        probe
    });

    let version = raw.recv_command("version").await;
    raw.send(&version).await;
    raw.send(&ProtocolMessage::Verack).await;
    raw.recv_command("verack").await;

    let first = ProtocolMessage::Inv(InvMessage {
        inventory: vec![InventoryItem::block([0x01; 32])],
    });
    let second = ProtocolMessage::Inv(InvMessage {
        inventory: vec![InventoryItem::block([0x02; 32])],
    });

    // One write carrying both frames back to back
    let mut bytes = raw.frame_bytes(&first);
    bytes.extend(raw.frame_bytes(&second));
    raw.send_raw(&bytes).await;

    let probe = driver.await.unwrap();
    assert_eq!(probe.seen.len(), 2);
    assert_eq!(probe.seen[0][0].hash, [0x01; 32]);
    assert_eq!(probe.seen[1][0].hash, [0x02; 32]);
}

#[tokio::test]
async fn test_corrupt_checksum_drops_frame_but_session_lives() {
    let (mut session, mut raw) = session_with_raw_peer(NETWORK);

    let driver = tokio::spawn(async move {
        let mut handler = HandshakeProbe::default();
        let _ = session.run(&mut handler).await;
    });

    let version = raw.recv_command("version").await;

    // Flip one payload bit in an otherwise valid version frame
    let mut corrupt = raw.frame_bytes(&version);
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0x01;
    raw.send_raw(&corrupt).await;

    // The session must still answer a valid ping afterwards
    raw.send(&ProtocolMessage::Ping(PingMessage { nonce: 7 })).await;
    let reply = raw.recv_command("pong").await;
    assert_eq!(reply, ProtocolMessage::Pong(PongMessage { nonce: 7 }));

    driver.abort();
}

#[tokio::test]
async fn test_unknown_command_is_skipped() {
    let (mut session, mut raw) = session_with_raw_peer(NETWORK);

    let driver = tokio::spawn(async move {
        let mut handler = HandshakeProbe::default();
        let _ = session.run(&mut handler).await;
    });

    raw.recv_command("version").await;

    // A well-formed frame whose command this peer does not know
    let mut frame = raw.frame_bytes(&ProtocolMessage::Verack);
    frame[4..16].copy_from_slice(b"feefilter\0\0\0");
    raw.send_raw(&frame).await;

    raw.send(&ProtocolMessage::Ping(PingMessage { nonce: 21 })).await;
    let reply = raw.recv_command("pong").await;
    assert_eq!(reply, ProtocolMessage::Pong(PongMessage { nonce: 21 }));

    driver.abort();
}

#[tokio::test]
async fn test_peer_eof_surfaces_as_disconnect() {
    let (mut session, mut raw) = session_with_raw_peer(NETWORK);

    let driver = tokio::spawn(async move {
        let mut handler = HandshakeProbe::default();
        let result = session.run(&mut handler).await;
        (result, handler.fired, session.state())
    });

    // Hang up as soon as the session has introduced itself
    raw.recv_command("version").await;
    drop(raw);

    let (result, fired, state) = driver.await.unwrap();
    assert!(matches!(result, Err(SessionError::Disconnected)));
    assert!(!fired);
    assert_eq!(state, SessionState::Closed);
}
