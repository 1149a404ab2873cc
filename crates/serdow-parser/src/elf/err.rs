use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    #[error("Invalid magic: {0:02x?}, expected [7f, 45, 4c, 46]")]
    InvalidMagic([u8; 4]),
    #[error("Unsupported class: {0}")]
    UnsupportedClass(u8),
    #[error("Unsupported data encoding: {0}")]
    UnsupportedEncoding(u8),
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid program header size: {0}, expected {1}")]
    InvalidProgramHeaderSize(u16, usize),
    #[error("Program header table at {offset:#x} ({count} x {size} bytes) exceeds the file")]
    ProgramHeadersOutOfBounds { offset: u64, count: u16, size: u16 },
    #[error("Segment {index} data at {offset:#x} ({size} bytes) exceeds the file")]
    SegmentOutOfBounds { index: usize, offset: u64, size: u64 },
    #[error("{0} {1:#x} doesn't fit into 32 bits")]
    OutOfRange(&'static str, u64),
}
