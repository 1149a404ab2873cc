use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    /// serdow-parser error
    #[error("Parser error: {0}")]
    Parser(#[from] serdow_parser::err::Error),

    /// serdow-protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] serdow_protocol::err::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// serialport crate error
    #[error("serialport error: {0}")]
    SerialPort(#[from] serialport::Error),
    /// Any other error
    #[error("{0}")]
    Custom(#[from] Box<dyn std::error::Error>),
}
