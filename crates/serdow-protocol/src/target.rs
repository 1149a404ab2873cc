//! Model of the receiving bootloader
//!
//! Consumes host bytes the way the target firmware does and produces its acknowledgements:
//! - slide over the input until the last 4 bytes (LE) form the magic
//! - read length and address, then `length` payload bytes into memory
//! - reply with the CRC-32 over magic, length, address and payload (LE)
//! - expect the magic of the next packet right away, otherwise search for it again
//!
//! A zero-length packet ends the download and sets the entry point. When the program returns
//! the bootloader downloads again, see [`Target::program_returned`].
use std::collections::BTreeMap;

use crc32fast::Hasher;
use derive_more::IsVariant;

use crate::{Config, packet::Header};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
enum Phase {
    /// Scanning for the magic byte by byte.
    Search,
    /// Reading the 4 bytes that should be the next packet's magic.
    Resync { got: usize },
    Length { got: usize },
    Address { got: usize },
    Payload { got: u32 },
    /// Entry packet received, the program runs.
    Done,
}

pub struct Target {
    config: Config,
    phase: Phase,
    /// Last 4 bytes, newest in the top byte.
    window: u32,
    hasher: Hasher,
    length: u32,
    address: u32,
    memory: BTreeMap<u32, u8>,
    received: Vec<Header>,
    entry: Option<u32>,
}

impl Target {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Search,
            window: 0,
            hasher: Hasher::new(),
            length: 0,
            address: 0,
            memory: BTreeMap::new(),
            received: Vec::new(),
            entry: None,
        }
    }

    /// Feed bytes from the host, returning whatever the target sends back.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut reply = Vec::new();
        for &byte in bytes {
            if let Some(checksum) = self.step(byte) {
                reply.extend_from_slice(&checksum.to_le_bytes());
            }
        }

        reply
    }

    fn step(&mut self, byte: u8) -> Option<u32> {
        match self.phase {
            Phase::Search => {
                self.shift(byte);
                if self.window == self.config.magic {
                    self.start_packet();
                }
            }
            Phase::Resync { got } => {
                self.shift(byte);
                if got + 1 < 4 {
                    self.phase = Phase::Resync { got: got + 1 };
                } else if self.window == self.config.magic {
                    self.start_packet();
                } else {
                    /* Sync lost */
                    self.window = 0;
                    self.phase = Phase::Search;
                }
            }
            Phase::Length { got } => {
                self.hasher.update(&[byte]);
                self.length |= u32::from(byte) << (got * 8);
                self.phase = if got + 1 < 4 {
                    Phase::Length { got: got + 1 }
                } else {
                    Phase::Address { got: 0 }
                };
            }
            Phase::Address { got } => {
                self.hasher.update(&[byte]);
                self.address |= u32::from(byte) << (got * 8);
                if got + 1 < 4 {
                    self.phase = Phase::Address { got: got + 1 };
                } else if self.length == 0 {
                    return Some(self.finish_packet());
                } else {
                    self.phase = Phase::Payload { got: 0 };
                }
            }
            Phase::Payload { got } => {
                self.hasher.update(&[byte]);
                self.memory.insert(self.address.wrapping_add(got), byte);
                if got + 1 < self.length {
                    self.phase = Phase::Payload { got: got + 1 };
                } else {
                    return Some(self.finish_packet());
                }
            }
            Phase::Done => (),
        }

        None
    }

    fn shift(&mut self, byte: u8) {
        self.window = (self.window >> 8) | (u32::from(byte) << 24);
    }

    fn start_packet(&mut self) {
        self.hasher = Hasher::new();
        self.hasher.update(&self.config.magic.to_le_bytes());
        self.length = 0;
        self.address = 0;
        self.phase = Phase::Length { got: 0 };
    }

    fn finish_packet(&mut self) -> u32 {
        let header = Header::new(self.config.magic, self.length, self.address);
        self.received.push(header);

        if header.kind().is_entry() {
            self.entry = Some(header.address);
            self.phase = Phase::Done;
        } else {
            self.phase = Phase::Resync { got: 0 };
        }

        self.hasher.clone().finalize()
    }

    /// The started program returned: wait for the next download, keeping memory as it is.
    pub fn program_returned(&mut self) {
        self.window = 0;
        self.entry = None;
        self.phase = Phase::Search;
    }

    /// Headers of every packet received so far, resends included.
    pub fn received(&self) -> &[Header] {
        &self.received
    }

    /// Entry point, once the entry packet arrived.
    pub fn entry(&self) -> Option<u32> {
        self.entry
    }

    pub fn is_done(&self) -> bool {
        self.phase.is_done()
    }

    /// Contents of `len` bytes at `address`, if all of them were written.
    pub fn read(&self, address: u32, len: usize) -> Option<Vec<u8>> {
        (0..len)
            .map(|i| self.memory.get(&address.wrapping_add(i as u32)).copied())
            .collect()
    }

    /// Number of distinct bytes written.
    pub fn written(&self) -> usize {
        self.memory.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{entry, frame};

    #[test]
    fn acknowledges_with_crc_of_whole_packet() {
        let config = Config::default();
        let packet = frame(&config, 0x1000, b"payload");

        let mut target = Target::new(config);
        assert_eq!(target.feed(&packet), crc32fast::hash(&packet).to_le_bytes());
        assert_eq!(target.read(0x1000, 7).unwrap(), b"payload");
    }

    #[test]
    fn skips_garbage_before_magic() {
        let config = Config::default();
        let packet = frame(&config, 0x2000, &[1, 2, 3]);
        let mut noisy = vec![0x00, 0xAA, 0x55, 0x13, 0x37];
        noisy.extend_from_slice(&packet);

        let mut target = Target::new(config);
        assert_eq!(target.feed(&noisy), crc32fast::hash(&packet).to_le_bytes());
        assert_eq!(target.received().len(), 1);
    }

    #[test]
    fn resynchronises_after_lost_magic() {
        let config = Config::default();
        let first = frame(&config, 0x2000, &[1]);
        let second = frame(&config, 0x3000, &[2]);

        let mut target = Target::new(config);
        target.feed(&first);
        assert!(target.feed(b"junk").is_empty());
        assert_eq!(target.feed(&second), crc32fast::hash(&second).to_le_bytes());
        assert_eq!(target.read(0x3000, 1).unwrap(), [2]);
    }

    #[test]
    fn entry_packet_ends_download() {
        let config = Config::default();
        let packet = entry(&config, 0x08000100);

        let mut target = Target::new(config);
        assert_eq!(target.feed(&packet), crc32fast::hash(&packet).to_le_bytes());
        assert!(target.is_done());
        assert_eq!(target.entry(), Some(0x08000100));

        assert!(target.feed(&frame(&config, 0x1000, &[1])).is_empty());
        assert_eq!(target.written(), 0);
    }

    #[test]
    fn downloads_again_after_program_returns() {
        let config = Config::default();
        let mut target = Target::new(config);
        target.feed(&frame(&config, 0x1000, &[1]));
        target.feed(&entry(&config, 0x1000));
        assert!(target.is_done());

        target.program_returned();
        assert!(!target.is_done());
        assert_eq!(target.entry(), None);

        let packet = frame(&config, 0x2000, &[2]);
        assert_eq!(target.feed(&packet), crc32fast::hash(&packet).to_le_bytes());
        target.feed(&entry(&config, 0x2000));
        assert_eq!(target.entry(), Some(0x2000));
        assert_eq!(target.read(0x1000, 1).unwrap(), [1]);
        assert_eq!(target.read(0x2000, 1).unwrap(), [2]);
        assert_eq!(target.received().len(), 4);
    }

    #[test]
    fn unwritten_memory_reads_as_none() {
        let target = Target::new(Config::default());
        assert_eq!(target.read(0, 1), None);
        assert_eq!(target.read(0, 0), Some(vec![]));
    }
}
