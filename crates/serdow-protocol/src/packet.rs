//! Packet framing
//!
//! ```text
//! 0      4       8        12
//! +------+-------+--------+-------------------+
//! | magic| length| address| payload (length)  |
//! +------+-------+--------+-------------------+
//! ```
//!
//! `length == 0` never carries data, it announces the entry point in `address`.
use std::fmt::Display;

use bincode::Decode;
use derive_ctor::ctor;
use derive_more::IsVariant;

use crate::{Config, Result, err::Error};

/// Size of the packet header on the wire.
pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum PacketKind {
    /// Payload to be stored at `address`.
    Data,
    /// Start executing at `address`.
    Entry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode, ctor)]
#[repr(C)]
pub struct Header {
    pub magic: u32,
    pub length: u32,
    pub address: u32,
}

impl Header {
    /// Decode and validate the header at the start of `bytes`.
    pub fn parse(config: &Config, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::TruncatedHeader(bytes.len()));
        }

        let bincode_config = bincode::config::standard()
            .with_little_endian()
            .with_fixed_int_encoding();
        let (header, _): (Self, _) =
            bincode::decode_from_slice(&bytes[..HEADER_LEN], bincode_config)?;

        if header.magic != config.magic {
            Err(Error::InvalidMagic {
                expected: config.magic,
                got: header.magic,
            })
        } else if header.length as usize > config.max_packet_len {
            Err(Error::PacketTooLong(header.length, config.max_packet_len))
        } else {
            Ok(header)
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.length.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.address.to_le_bytes());
        bytes
    }

    pub fn kind(&self) -> PacketKind {
        if self.length == 0 {
            PacketKind::Entry
        } else {
            PacketKind::Data
        }
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            PacketKind::Data => write!(f, "Data @ 0x{:08x}, {} bytes", self.address, self.length),
            PacketKind::Entry => write!(f, "Entry @ 0x{:08x}", self.address),
        }
    }
}

/// Build the wire packet carrying `payload` to `address`.
///
/// The caller keeps `payload` within `config.max_packet_len`.
pub fn frame(config: &Config, address: u32, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= config.max_packet_len);

    let header = Header::new(config.magic, payload.len() as u32, address);
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(&header.to_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// Build the zero-length packet announcing the entry point.
pub fn entry(config: &Config, address: u32) -> Vec<u8> {
    frame(config, address, &[])
}
