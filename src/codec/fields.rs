//! Binary field primitives for the wire protocol
//!
//! Every protocol message is a fixed sequence of these primitives. All
//! integers are little-endian except the port number inside a network
//! address, which is big-endian.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::hashing::Hash;
use super::DecodeError;

/// Incremental reader over a message payload
///
/// Every `read_*` method either consumes the exact number of bytes it needs
/// or fails with [`DecodeError::UnexpectedEof`], leaving short reads
/// impossible to ignore.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u16_be(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Variable-length integer: `0xFD`/`0xFE`/`0xFF` prefixes select 2/4/8
    /// byte little-endian forms. Overlong encodings are accepted.
    pub fn read_var_int(&mut self) -> Result<u64, DecodeError> {
        match self.read_u8()? {
            n @ 0..=0xFC => Ok(n as u64),
            0xFD => Ok(self.read_u16_le()? as u64),
            0xFE => Ok(self.read_u32_le()? as u64),
            0xFF => self.read_u64_le(),
        }
    }

    /// VarInt length followed by that many raw bytes
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_var_int()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// VarBytes decoded as text, one char per byte (latin-1)
    pub fn read_var_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_var_bytes()?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// 32 raw bytes in wire (little-endian) order
    pub fn read_hash(&mut self) -> Result<Hash, DecodeError> {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(self.take(32)?);
        Ok(hash)
    }
}

/// Append-only writer mirroring [`PayloadReader`]
#[derive(Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16_le(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u16_be(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32_le(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64_le(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64_le(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Smallest VarInt form that fits the value
    pub fn put_var_int(&mut self, v: u64) {
        match v {
            0..=0xFC => self.put_u8(v as u8),
            0xFD..=0xFFFF => {
                self.put_u8(0xFD);
                self.put_u16_le(v as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.put_u8(0xFE);
                self.put_u32_le(v as u32);
            }
            _ => {
                self.put_u8(0xFF);
                self.put_u64_le(v);
            }
        }
    }

    pub fn put_var_bytes(&mut self, bytes: &[u8]) {
        self.put_var_int(bytes.len() as u64);
        self.put_bytes(bytes);
    }

    pub fn put_var_string(&mut self, s: &str) {
        let bytes: Vec<u8> = s.chars().map(|c| c as u8).collect();
        self.put_var_bytes(&bytes);
    }

    pub fn put_hash(&mut self, hash: &Hash) {
        self.put_bytes(hash);
    }
}

/// A peer network address: service bitmask, IPv6-mapped IPv4, big-endian port
///
/// 26 bytes on the wire. The 16 address bytes carry 10 zero bytes, two 0xFF
/// bytes and the 4 IPv4 octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    pub services: u64,
    pub ip: [u8; 16],
    pub port: u16,
}

impl NetworkAddress {
    pub fn new(ip: Ipv4Addr, port: u16, services: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[10] = 0xFF;
        bytes[11] = 0xFF;
        bytes[12..16].copy_from_slice(&ip.octets());
        Self {
            services,
            ip: bytes,
            port,
        }
    }

    /// The unroutable placeholder used in `addr_from`
    pub fn unspecified() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, 0, 0)
    }

    pub fn from_socket_addr(addr: SocketAddr, services: u64) -> Self {
        let ip = match addr.ip() {
            IpAddr::V4(v4) => v4,
            // Peers beyond the IPv6-mapped IPv4 space are not representable;
            // keep the port and fall back to the unspecified address.
            IpAddr::V6(v6) => v6.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
        };
        Self::new(ip, addr.port(), services)
    }

    pub fn ipv4(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.ip[12], self.ip[13], self.ip[14], self.ip[15])
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.ipv4()), self.port)
    }

    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let services = r.read_u64_le()?;
        let mut ip = [0u8; 16];
        ip.copy_from_slice(r.take(16)?);
        let port = r.read_u16_be()?;
        Ok(Self { services, ip, port })
    }

    pub fn encode(&self, w: &mut PayloadWriter) {
        w.put_u64_le(self.services);
        w.put_bytes(&self.ip);
        w.put_u16_be(self.port);
    }
}

impl std::fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ipv4(), self.port)
    }
}

/// A network address with the unix-seconds timestamp used by `addr` payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampedAddress {
    pub timestamp: u32,
    pub address: NetworkAddress,
}

impl TimestampedAddress {
    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let timestamp = r.read_u32_le()?;
        let address = NetworkAddress::decode(r)?;
        Ok(Self { timestamp, address })
    }

    pub fn encode(&self, w: &mut PayloadWriter) {
        w.put_u32_le(self.timestamp);
        self.address.encode(w);
    }
}
