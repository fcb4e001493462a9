//! Envelope framing
//!
//! Every message travels inside a 24-byte envelope: network magic, a
//! NUL-padded command string, the payload length and a double-SHA256
//! checksum over the payload. [`FrameBuffer`] accumulates raw socket reads
//! and peels off one complete frame at a time, because a single read
//! routinely carries several messages (or half of one).

use bytes::{Buf, BytesMut};

use super::hashing::double_sha256;
use super::messages::ProtocolMessage;
use super::{DecodeError, FrameError};

/// Fixed size of the envelope header
pub const HEADER_LEN: usize = 24;

/// Maximum accepted payload size (32MB), matching the reference limit
pub const MAX_PAYLOAD_LENGTH: usize = 32 * 1024 * 1024;

/// The framed envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u32,
    pub command: [u8; 12],
    pub length: u32,
    pub checksum: u32,
}

impl MessageHeader {
    /// Parse the fixed 24-byte header
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::UnexpectedEof);
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let mut command = [0u8; 12];
        command.copy_from_slice(&bytes[4..16]);
        let length = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let checksum = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
        Ok(Self {
            magic,
            command,
            length,
            checksum,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..16].copy_from_slice(&self.command);
        bytes[16..20].copy_from_slice(&self.length.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Command string with the NUL padding trimmed
    pub fn command_str(&self) -> String {
        String::from_utf8_lossy(&self.command)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// First 4 bytes of dsha256(payload), read little-endian
pub fn payload_checksum(payload: &[u8]) -> u32 {
    let digest = double_sha256(payload);
    u32::from_le_bytes(digest[0..4].try_into().unwrap())
}

/// Serialize a message into one wire-ready buffer: header plus payload
pub fn encode_message(magic: u32, message: &ProtocolMessage) -> Vec<u8> {
    let payload = message.encode_payload();

    let mut command = [0u8; 12];
    let name = message.command().as_bytes();
    command[..name.len()].copy_from_slice(name);

    let header = MessageHeader {
        magic,
        command,
        length: payload.len() as u32,
        checksum: payload_checksum(&payload),
    };

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&payload);
    out
}

/// Accumulating frame parser for one peer session
#[derive(Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes received from the transport
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Attempt to parse the next complete frame.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a full frame.
    /// [`FrameError::InvalidChecksum`] and [`FrameError::UnknownCommand`]
    /// consume the offending frame so the caller can skip it and keep
    /// reading; [`FrameError::Malformed`] and [`FrameError::Oversized`]
    /// indicate a protocol violation.
    pub fn next_frame(&mut self) -> Result<Option<ProtocolMessage>, FrameError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let header = MessageHeader::decode(&self.buf[..HEADER_LEN]).map_err(FrameError::Malformed)?;
        let payload_len = header.length as usize;
        if payload_len > MAX_PAYLOAD_LENGTH {
            return Err(FrameError::Oversized(payload_len));
        }
        if self.buf.len() < HEADER_LEN + payload_len {
            return Ok(None);
        }

        let payload = &self.buf[HEADER_LEN..HEADER_LEN + payload_len];
        let computed = payload_checksum(payload);
        if computed != header.checksum {
            let expected = header.checksum;
            self.buf.advance(HEADER_LEN + payload_len);
            return Err(FrameError::InvalidChecksum { expected, computed });
        }

        let command = header.command_str();
        let result = ProtocolMessage::decode_payload(&command, payload);
        self.buf.advance(HEADER_LEN + payload_len);
        match result {
            Ok(message) => Ok(Some(message)),
            Err(DecodeError::UnknownCommand(command)) => Err(FrameError::UnknownCommand(command)),
            Err(e) => Err(FrameError::Malformed(e)),
        }
    }
}
