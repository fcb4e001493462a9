//! Transport abstraction for peer connections
//!
//! The session layer talks to a [`Connection`]: an ordered byte stream with
//! no message boundaries. [`StreamConnection`] adapts any tokio stream, so
//! real peers ride a `TcpStream` while tests ride an in-process duplex pipe.

use std::net::SocketAddr;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Read buffer size for one transport read
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// An established bidirectional byte stream to one peer
#[async_trait]
pub trait Connection: Send {
    /// Write the whole buffer to the peer
    async fn send(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Read whatever bytes are available; an empty buffer means EOF
    async fn recv(&mut self) -> std::io::Result<Vec<u8>>;
}

/// [`Connection`] over any async byte stream
pub struct StreamConnection<S> {
    stream: S,
}

impl<S> StreamConnection<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(data).await
    }

    async fn recv(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let n = self.stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// Open a TCP connection to a peer
pub async fn connect(addr: SocketAddr) -> Result<StreamConnection<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    debug!(peer = %addr, "TCP connection established");
    Ok(StreamConnection::new(stream))
}
