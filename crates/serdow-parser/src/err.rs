use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    /// ELF parsing error
    #[error("ELF parsing error: {0}")]
    Elf(#[from] crate::elf::err::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// bincode crate error
    #[error("Bincode decode error: {0}")]
    Bincode(#[from] bincode::error::DecodeError),

    /// Any other error
    #[error("{0}")]
    Custom(#[from] Box<dyn std::error::Error + Send + Sync>),
}
