//! Timeout-bounded byte channel used by the downloader.
//!
//! Every read on a [`Channel`] is bounded by the timeout the channel was
//! opened with, so a read may come back short. Callers decide what a short
//! read means.

use std::{
    io::{ErrorKind, Read},
    time::{Duration, Instant},
};

#[cfg(feature = "serialport")]
use std::io::Write;

#[cfg(feature = "serialport")]
use serialport::{ClearBuffer, SerialPort};

use crate::err::Error;

pub mod err;

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(feature = "serialport")]
pub type Port = Box<dyn SerialPort>;

/// Longest line [`Channel::read_line`] returns before handing back a partial one.
pub const MAX_LINE_LEN: usize = 256;

pub trait FromBytes<const N: usize> {
    fn from_be(bytes: [u8; N]) -> Self;
    fn from_le(bytes: [u8; N]) -> Self;
}

/// Outcome of a fixed-size read that may run into the read timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<T> {
    /// All bytes arrived.
    Complete(T),
    /// The timeout elapsed after this many bytes.
    Short(usize),
}

pub trait Channel {
    /// Write the whole `buf`.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Read into `buf` until it is full or the read timeout elapses.
    ///
    /// Returns the number of bytes actually read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Drop whatever is waiting on the inbound side.
    fn reset_input_buffer(&mut self) -> Result<()>;

    /// Read bytes up to and including `\n`.
    ///
    /// A timeout or [`MAX_LINE_LEN`] bytes end the line early, so the result may be partial or
    /// empty.
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        while line.len() < MAX_LINE_LEN {
            let Reply::Complete(byte) = self.try_read_le::<u8, 1>()? else {
                break;
            };
            line.push(byte);
            if byte == b'\n' {
                break;
            }
        }

        Ok(line)
    }

    fn try_read_le<T: FromBytes<N>, const N: usize>(&mut self) -> Result<Reply<T>> {
        let mut bytes = [0; N];
        let n = self.read(&mut bytes)?;
        if n == N {
            Ok(Reply::Complete(T::from_le(bytes)))
        } else {
            Ok(Reply::Short(n))
        }
    }

    fn try_read_be<T: FromBytes<N>, const N: usize>(&mut self) -> Result<Reply<T>> {
        let mut bytes = [0; N];
        let n = self.read(&mut bytes)?;
        if n == N {
            Ok(Reply::Complete(T::from_be(bytes)))
        } else {
            Ok(Reply::Short(n))
        }
    }

    fn try_read_u32_le(&mut self) -> Result<Reply<u32>> {
        self.try_read_le()
    }
}

/// Reader whose per-call timeout can be changed.
pub trait Timed: Read {
    fn timeout(&self) -> Duration;
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;
}

/// Fill `buf` until it is full or the reader's timeout has elapsed in total.
///
/// Each underlying read only gets what is left of the timeout; the original timeout is
/// restored before returning.
pub fn read_timed<R: Timed + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let timeout = reader.timeout();
    let deadline = Instant::now() + timeout;

    let mut n = 0;
    let filled = loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if n == buf.len() || left.is_zero() {
            break Ok(n);
        }
        if let Err(e) = reader.set_timeout(left) {
            break Err(e);
        }
        match reader.read(&mut buf[n..]) {
            Ok(0) => break Ok(n),
            Ok(read) => n += read,
            Err(e) if e.kind() == ErrorKind::TimedOut => break Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => break Err(e.into()),
        }
    };

    reader.set_timeout(timeout)?;
    filled
}

impl FromBytes<1> for u8 {
    fn from_be(bytes: [u8; 1]) -> Self {
        Self::from_be_bytes(bytes)
    }

    fn from_le(bytes: [u8; 1]) -> Self {
        Self::from_le_bytes(bytes)
    }
}

impl FromBytes<4> for u32 {
    fn from_be(bytes: [u8; 4]) -> Self {
        Self::from_be_bytes(bytes)
    }

    fn from_le(bytes: [u8; 4]) -> Self {
        Self::from_le_bytes(bytes)
    }
}

#[cfg(feature = "serialport")]
impl Channel for Port {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf)?;
        self.flush().map_err(|e| e.into())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        read_timed(self, buf)
    }

    fn reset_input_buffer(&mut self) -> Result<()> {
        self.clear(ClearBuffer::Input).map_err(|e| e.into())
    }
}

#[cfg(feature = "serialport")]
impl Timed for Port {
    fn timeout(&self) -> Duration {
        SerialPort::timeout(&**self)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        SerialPort::set_timeout(&mut **self, timeout).map_err(|e| e.into())
    }
}
