//! Peer session state machine
//!
//! Owns one connection: sends the opening `version`, answers the peer's
//! `version` with `verack`, echoes `ping` nonces, and feeds everything else
//! to a [`MessageHandler`]. Frames with bad checksums or unknown commands
//! are dropped and the session keeps going; malformed payloads and
//! transport errors close it.

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::codec::envelope::encode_message;
use crate::codec::fields::NetworkAddress;
use crate::codec::messages::{
    AddrMessage, BlockMessage, HeadersMessage, InvMessage, NotFoundMessage, PongMessage,
    ProtocolMessage, Transaction, VersionMessage, NODE_NETWORK, PROTOCOL_VERSION,
};
use crate::codec::{FrameBuffer, FrameError};
use crate::config::Network;
use crate::network::transport::Connection;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    VersionSent,
    Handshaked,
    Closed,
}

/// Why a session ended
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer closed the connection
    #[error("peer disconnected")]
    Disconnected,

    /// The peer violated the framing protocol
    #[error("protocol violation: {0}")]
    Protocol(#[from] FrameError),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A handler failed; the store and validator surface errors this way
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

/// Messages a handler wants sent, collected during one dispatch
///
/// Handlers run synchronously inside the receive loop; replies are flushed
/// in order once the handler returns.
#[derive(Default)]
pub struct Outbox {
    messages: Vec<ProtocolMessage>,
    disconnect: bool,
}

impl Outbox {
    /// Queue a message for the peer
    pub fn send(&mut self, message: ProtocolMessage) {
        self.messages.push(message);
    }

    /// Ask the session to close once queued replies are flushed
    pub fn disconnect(&mut self) {
        self.disconnect = true;
    }
}

/// Application callbacks invoked from the session receive loop
///
/// Every method has a no-op default: a message without a handler is simply
/// ignored, mirroring how unknown-but-valid traffic is treated.
#[async_trait]
pub trait MessageHandler: Send {
    /// The handshake completed (our `verack` counterpart arrived)
    async fn on_handshake(&mut self, out: &mut Outbox) -> anyhow::Result<()> {
        let _ = out;
        Ok(())
    }

    async fn on_addr(&mut self, message: &AddrMessage, out: &mut Outbox) -> anyhow::Result<()> {
        let _ = (message, out);
        Ok(())
    }

    async fn on_inv(&mut self, message: &InvMessage, out: &mut Outbox) -> anyhow::Result<()> {
        let _ = (message, out);
        Ok(())
    }

    async fn on_block(&mut self, block: &BlockMessage, out: &mut Outbox) -> anyhow::Result<()> {
        let _ = (block, out);
        Ok(())
    }

    async fn on_headers(
        &mut self,
        message: &HeadersMessage,
        out: &mut Outbox,
    ) -> anyhow::Result<()> {
        let _ = (message, out);
        Ok(())
    }

    async fn on_tx(&mut self, transaction: &Transaction, out: &mut Outbox) -> anyhow::Result<()> {
        let _ = (transaction, out);
        Ok(())
    }

    async fn on_notfound(
        &mut self,
        message: &NotFoundMessage,
        out: &mut Outbox,
    ) -> anyhow::Result<()> {
        let _ = (message, out);
        Ok(())
    }
}

/// One peer session: connection, frame buffer and handshake state
pub struct PeerSession<C> {
    conn: C,
    network: Network,
    user_agent: String,
    peer_addr: Option<SocketAddr>,
    frames: FrameBuffer,
    state: SessionState,
}

impl<C: Connection> PeerSession<C> {
    pub fn new(conn: C, network: Network, user_agent: impl Into<String>) -> Self {
        Self {
            conn,
            network,
            user_agent: user_agent.into(),
            peer_addr: None,
            frames: FrameBuffer::new(),
            state: SessionState::Connecting,
        }
    }

    /// Record the peer's address for the `addr_recv` field of our version
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serialize and write one message
    pub async fn send(&mut self, message: &ProtocolMessage) -> Result<(), SessionError> {
        let bytes = encode_message(self.network.magic(), message);
        self.conn.send(&bytes).await?;
        debug!(command = message.command(), bytes = bytes.len(), "sent message");
        Ok(())
    }

    fn version_message(&self) -> ProtocolMessage {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let addr_recv = self
            .peer_addr
            .map(|a| NetworkAddress::from_socket_addr(a, NODE_NETWORK))
            .unwrap_or_else(NetworkAddress::unspecified);
        ProtocolMessage::Version(VersionMessage {
            version: PROTOCOL_VERSION,
            services: NODE_NETWORK,
            timestamp,
            addr_recv,
            addr_from: NetworkAddress::unspecified(),
            nonce: rand::thread_rng().gen(),
            user_agent: self.user_agent.clone(),
        })
    }

    /// Drive the session: send our version, then read and dispatch frames
    /// until the peer disconnects, a handler asks to stop, or the protocol
    /// is violated.
    pub async fn run<H: MessageHandler>(&mut self, handler: &mut H) -> Result<(), SessionError> {
        let version = self.version_message();
        self.send(&version).await?;
        self.state = SessionState::VersionSent;

        loop {
            let data = match self.conn.recv().await {
                Ok(data) => data,
                Err(e) => {
                    self.state = SessionState::Closed;
                    return Err(e.into());
                }
            };
            if data.is_empty() {
                self.state = SessionState::Closed;
                info!("peer closed the connection");
                return Err(SessionError::Disconnected);
            }
            self.frames.extend(&data);

            // A single read often carries several frames; drain them all
            loop {
                match self.frames.next_frame() {
                    Ok(Some(message)) => {
                        if !self.dispatch(message, handler).await? {
                            self.state = SessionState::Closed;
                            return Ok(());
                        }
                    }
                    Ok(None) => break,
                    Err(e) if e.is_recoverable() => {
                        warn!(error = %e, "dropping frame");
                    }
                    Err(e) => {
                        self.state = SessionState::Closed;
                        return Err(e.into());
                    }
                }
            }
        }
    }

    /// Handle one message; returns false when the session should close
    async fn dispatch<H: MessageHandler>(
        &mut self,
        message: ProtocolMessage,
        handler: &mut H,
    ) -> Result<bool, SessionError> {
        debug!(command = message.command(), "received message");
        let mut out = Outbox::default();

        match &message {
            ProtocolMessage::Version(version) => {
                debug!(
                    peer_version = version.version,
                    user_agent = %version.user_agent,
                    "peer version"
                );
                if self.state != SessionState::Handshaked {
                    self.send(&ProtocolMessage::Verack).await?;
                }
            }
            ProtocolMessage::Verack => {
                if self.state != SessionState::Handshaked {
                    self.state = SessionState::Handshaked;
                    info!("handshake complete");
                    handler.on_handshake(&mut out).await?;
                }
            }
            ProtocolMessage::Ping(ping) => {
                self.send(&ProtocolMessage::Pong(PongMessage { nonce: ping.nonce }))
                    .await?;
            }
            ProtocolMessage::Pong(_) => {}
            ProtocolMessage::Addr(addr) => handler.on_addr(addr, &mut out).await?,
            ProtocolMessage::Inv(inv) => handler.on_inv(inv, &mut out).await?,
            ProtocolMessage::Block(block) => handler.on_block(block, &mut out).await?,
            ProtocolMessage::Headers(headers) => handler.on_headers(headers, &mut out).await?,
            ProtocolMessage::Tx(tx) => handler.on_tx(tx, &mut out).await?,
            ProtocolMessage::NotFound(notfound) => handler.on_notfound(notfound, &mut out).await?,
            // Requests this minimal peer does not serve
            ProtocolMessage::GetData(_)
            | ProtocolMessage::GetBlocks(_)
            | ProtocolMessage::MemPool
            | ProtocolMessage::GetAddr => {
                debug!(command = message.command(), "no handler for command");
            }
        }

        for reply in std::mem::take(&mut out.messages) {
            self.send(&reply).await?;
        }
        Ok(!out.disconnect)
    }
}
