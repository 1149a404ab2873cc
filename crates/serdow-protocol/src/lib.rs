//! Serial download protocol
//!
//! The host pushes an executable to the target one packet at a time:
//! - magic - u32
//! - payload length - u32, `0` marks the entry packet
//! - address - u32
//! - payload
//!
//! All integers are little endian. The target answers every packet with the CRC-32 of the
//! whole packet, the host resends the packet until the reply matches or it runs out of tries.
//! Once the entry packet is acknowledged the target starts the program and the host switches
//! to relaying its text output.

use derive_ctor::ctor;

use crate::err::Error;

pub mod chunk;
pub mod err;
pub mod loader;
pub mod packet;
pub mod relay;
pub mod target;
pub mod transmit;

pub type Result<T> = core::result::Result<T, Error>;

pub use chunk::{Chunk, Chunker, Progress, Segment, SkipReason};
pub use loader::{Loader, Summary};
pub use packet::{Header, PacketKind};
pub use relay::{Relay, RelayHandle};
pub use target::Target;
pub use transmit::{Delivery, Mismatch, Transmitter};

/// Frame start marker.
pub const MAGIC: u32 = 0x55AA55AA;
/// Largest payload of a single data packet.
pub const MAX_PACKET_LEN: usize = 1024;
/// Attempts per packet before the transfer is abandoned.
pub const MAX_SEND_TRIES: usize = 10;

/// Protocol parameters shared by the framer, transmitter and chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ctor)]
pub struct Config {
    pub magic: u32,
    pub max_packet_len: usize,
    pub max_send_tries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            max_packet_len: MAX_PACKET_LEN,
            max_send_tries: MAX_SEND_TRIES,
        }
    }
}

impl Config {
    /// Reject parameters the wire format or the transmitter can't work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_packet_len == 0 || u32::try_from(self.max_packet_len).is_err() {
            Err(Error::InvalidConfig("maximum packet length must be between 1 and 2^32 - 1"))
        } else if self.max_send_tries == 0 {
            Err(Error::InvalidConfig("at least one send attempt is required"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config, Config::new(0x55AA55AA, 1024, 10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn degenerate_configs_are_rejected() {
        assert!(Config::new(MAGIC, 0, 10).validate().is_err());
        assert!(Config::new(MAGIC, 1024, 0).validate().is_err());
    }
}
