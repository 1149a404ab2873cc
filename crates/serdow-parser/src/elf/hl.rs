//! High-level representation of an ELF image
//!
//! Intended for end use. Only what a loader needs is kept: the entry point and the program
//! headers together with the bytes backing them.
use std::{borrow::Cow, fmt::Display};

use getset::{CopyGetters, Getters};
use strum::{Display as StrumDisplay, FromRepr};

use crate::{
    Endianness, HLParser, LLParser, Result,
    elf::{
        err::Error,
        ll::{self, CLASS_32},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
enum FileType {
    #[strum(serialize = "NONE")]
    NoType = 0,
    Rel = 1,
    Exec = 2,
    Dyn = 3,
    Core = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
enum Machine {
    #[strum(serialize = "NONE")]
    NoMachine = 0,
    Sparc = 2,
    #[strum(serialize = "386")]
    I386 = 3,
    #[strum(serialize = "68K")]
    M68k = 4,
    Mips = 8,
    Ppc = 20,
    Arm = 40,
    Sh = 42,
    #[strum(serialize = "X86_64")]
    Amd64 = 62,
    Avr = 83,
    Openrisc = 92,
    Xtensa = 94,
    Msp430 = 105,
    Aarch64 = 183,
    Microblaze = 189,
    Riscv = 243,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
enum SegmentType {
    Null = 0,
    Load = 1,
    Dynamic = 2,
    Interp = 3,
    Note = 4,
    Shlib = 5,
    Phdr = 6,
    Tls = 7,
    GnuEhFrame = 0x6474e550,
    GnuStack = 0x6474e551,
    GnuRelro = 0x6474e552,
    GnuProperty = 0x6474e553,
}

const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

#[derive(Debug, Getters, CopyGetters)]
pub struct Elf<'a> {
    /// Word size in bits, 32 or 64
    #[getset(get_copy = "pub")]
    bits: u8,

    #[getset(get_copy = "pub")]
    endianness: Endianness,

    /// Object file type (`e_type`)
    #[getset(get_copy = "pub")]
    kind: u16,

    /// Target architecture (`e_machine`)
    #[getset(get_copy = "pub")]
    machine: u16,

    /// Entry point
    #[getset(get_copy = "pub")]
    entry: u32,

    /// Program headers in file order
    #[getset(get = "pub")]
    segments: Vec<Segment<'a>>,
}

impl<'a> HLParser<'a, ll::Ident> for Elf<'a> {
    fn parse(data: &'a [u8], position: usize, ll: ll::Ident) -> Result<Self> {
        ll.validate()?;
        let endianness = ll.endianness();
        let header_data = &data[position.min(data.len())..];

        let header: ll::Header = if ll.class == CLASS_32 {
            let header = ll::Header32::parse(header_data, endianness)?;
            header.validate()?;
            header.into()
        } else {
            let header = ll::Header64::parse(header_data, endianness)?;
            header.validate()?;
            header.into()
        };

        let table = u64::from(header.phnum) * u64::from(header.phentsize);
        if header.phoff.saturating_add(table) > data.len() as u64 {
            return Err(Error::ProgramHeadersOutOfBounds {
                offset: header.phoff,
                count: header.phnum,
                size: header.phentsize,
            }
            .into());
        }

        let segments = (0..usize::from(header.phnum))
            .map(|index| {
                let start = header.phoff as usize + index * usize::from(header.phentsize);
                let ph: ll::ProgramHeader = if ll.class == CLASS_32 {
                    ll::ProgramHeader32::parse(&data[start..], endianness)?.into()
                } else {
                    ll::ProgramHeader64::parse(&data[start..], endianness)?.into()
                };
                Segment::parse(data, index, ph)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bits: if ll.class == CLASS_32 { 32 } else { 64 },
            endianness,
            kind: header.ty,
            machine: header.machine,
            entry: narrow("Entry point", header.entry)?,
            segments,
        })
    }
}

impl Elf<'_> {
    /// `e_type` name, e.g. `ET_EXEC`
    pub fn kind_name(&self) -> String {
        FileType::from_repr(self.kind)
            .map(|t| format!("ET_{t}"))
            .unwrap_or_else(|| format!("{:#x}", self.kind))
    }

    /// `e_machine` name, e.g. `EM_RISCV`
    pub fn machine_name(&self) -> String {
        Machine::from_repr(self.machine)
            .map(|m| format!("EM_{m}"))
            .unwrap_or_else(|| format!("{:#x}", self.machine))
    }
}

impl Display for Elf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ELF object is {} for machine {}, {} bits, {} endian",
            self.kind_name(),
            self.machine_name(),
            self.bits,
            if self.endianness.is_little() {
                "little"
            } else {
                "big"
            }
        )
    }
}

#[derive(Debug, Getters, CopyGetters)]
pub struct Segment<'a> {
    /// Segment type (`p_type`)
    #[getset(get_copy = "pub")]
    kind: u32,

    flags: u32,
    /// Offset of the backing bytes in the file
    offset: u64,
    virtual_address: u64,

    #[getset(get_copy = "pub")]
    physical_address: u32,

    #[getset(get_copy = "pub")]
    file_size: u32,

    #[getset(get_copy = "pub")]
    memory_size: u32,

    /// File-backed bytes, `file_size` long
    #[getset(get = "pub")]
    data: Cow<'a, [u8]>,
}

impl<'a> Segment<'a> {
    fn parse(data: &'a [u8], index: usize, ph: ll::ProgramHeader) -> Result<Self> {
        let bytes = ph
            .offset
            .checked_add(ph.filesz)
            .filter(|end| *end <= data.len() as u64)
            .map(|end| &data[ph.offset as usize..end as usize])
            .ok_or(Error::SegmentOutOfBounds {
                index,
                offset: ph.offset,
                size: ph.filesz,
            })?;

        Ok(Self {
            kind: ph.ty,
            flags: ph.flags,
            offset: ph.offset,
            virtual_address: ph.vaddr,
            physical_address: narrow("Physical address", ph.paddr)?,
            file_size: narrow("File size", ph.filesz)?,
            memory_size: narrow("Memory size", ph.memsz)?,
            data: Cow::Borrowed(bytes),
        })
    }

    /// `p_type` name, e.g. `PT_LOAD`
    pub fn kind_name(&self) -> String {
        SegmentType::from_repr(self.kind)
            .map(|t| format!("PT_{t}"))
            .unwrap_or_else(|| format!("{:#x}", self.kind))
    }

    /// `p_flags` as `rwx`, e.g. `r-x`
    fn permissions(&self) -> String {
        [(PF_R, 'r'), (PF_W, 'w'), (PF_X, 'x')]
            .iter()
            .map(|&(bit, c)| if self.flags & bit != 0 { c } else { '-' })
            .collect()
    }
}

impl Display for Segment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @{:08X} (virtual {:#x}, file offset {:#x}, {}): {} bytes in file, {} in memory",
            self.kind_name(),
            self.physical_address,
            self.virtual_address,
            self.offset,
            self.permissions(),
            self.file_size,
            self.memory_size
        )
    }
}

fn narrow(what: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::OutOfRange(what, value).into())
}
