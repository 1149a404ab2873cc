use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    /// The target never acknowledged a packet with the right checksum
    #[error("Target failed to reply with the correct checksum {tries} times")]
    RetriesExhausted { tries: usize },

    /// Protocol parameters out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Packet header shorter than 12 bytes
    #[error("Packet header truncated: {0} bytes")]
    TruncatedHeader(usize),
    /// Packet header doesn't start with the configured magic
    #[error("Invalid magic! Expected {expected:#010x}, got {got:#010x}")]
    InvalidMagic { expected: u32, got: u32 },
    /// Data packet longer than the configured limit
    #[error("Packet length {0} exceeds the maximum of {1} bytes")]
    PacketTooLong(u32, usize),
    /// Segment claims more file-backed bytes than the image provides
    #[error("Segment @{address:08X} needs {file_size} bytes, image has {available}")]
    SegmentTruncated {
        address: u32,
        file_size: u32,
        available: usize,
    },
    /// Chunk address doesn't fit into the 32-bit address field
    #[error("Address overflow: {0:#x} + {1:#x}")]
    AddressOverflow(u32, usize),

    /// serdow-port error
    #[error("Port error: {0}")]
    Port(#[from] serdow_port::err::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// bincode crate error
    #[error("Bincode decode error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Any other error
    #[error("{0}")]
    Custom(#[from] Box<dyn std::error::Error + Send + Sync>),
}
