use bincode::Decode;
use derive_more::IsVariant;

use crate::err::Error;

pub mod elf;
pub mod err;

pub type Result<T> = core::result::Result<T, Error>;

pub use elf::hl::{Elf, Segment};

/// Byte order of the structure being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Endianness {
    Little,
    Big,
}

pub trait LLParser: Decode<()> + Sized {
    type Error;

    fn parse(data: &[u8], endianness: Endianness) -> Result<Self> {
        let config = bincode::config::standard().with_fixed_int_encoding();
        match endianness {
            Endianness::Little => bincode::decode_from_slice(data, config.with_little_endian()),
            Endianness::Big => bincode::decode_from_slice(data, config.with_big_endian()),
        }
        .map(|r| r.0)
        .map_err(|e| e.into())
    }
    fn validate(&self) -> core::result::Result<(), Self::Error>;
}

pub trait HLParser<'a, T: LLParser>: Sized {
    fn parse(data: &'a [u8], position: usize, ll: T) -> Result<Self>;
}

pub fn parse_elf(data: &[u8]) -> Result<Elf<'_>> {
    Elf::parse(
        data,
        size_of::<elf::ll::Ident>(),
        elf::ll::Ident::parse(data, Endianness::Little)?,
    )
}
