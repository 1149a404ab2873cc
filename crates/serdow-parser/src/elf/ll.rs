//! Low-level representation of the ELF structures
//!
//! This matches how they are laid out in the file. The identification is byte-sized and read
//! as is, everything after it is decoded in the file's byte order.
use bincode::Decode;

use crate::{Endianness, LLParser, elf::err::Error};

pub(crate) const CLASS_32: u8 = 1;
pub(crate) const CLASS_64: u8 = 2;

#[derive(Debug, Decode)]
#[repr(C)]
pub(crate) struct Ident {
    magic: [u8; 4],
    pub class: u8,
    pub data: u8,
    pub version: u8,
    os_abi: u8,
    abi_version: u8,
    padding: [u8; 7],
}

impl LLParser for Ident {
    type Error = Error;

    fn validate(&self) -> core::result::Result<(), Self::Error> {
        if &self.magic != b"\x7fELF" {
            Err(Error::InvalidMagic(self.magic))
        } else if self.class != CLASS_32 && self.class != CLASS_64 {
            Err(Error::UnsupportedClass(self.class))
        } else if self.data != 1 && self.data != 2 {
            Err(Error::UnsupportedEncoding(self.data))
        } else if self.version != 1 {
            Err(Error::UnsupportedVersion(self.version.into()))
        } else {
            Ok(())
        }
    }
}

impl Ident {
    pub fn endianness(&self) -> Endianness {
        if self.data == 2 {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// File header of 32-bit objects, identification excluded.
#[derive(Debug, Decode)]
#[repr(C)]
pub(crate) struct Header32 {
    ty: u16,
    machine: u16,
    version: u32,
    entry: u32,
    phoff: u32,
    shoff: u32,
    flags: u32,
    ehsize: u16,
    phentsize: u16,
    phnum: u16,
    shentsize: u16,
    shnum: u16,
    shstrndx: u16,
}

/// File header of 64-bit objects, identification excluded.
#[derive(Debug, Decode)]
#[repr(C)]
pub(crate) struct Header64 {
    ty: u16,
    machine: u16,
    version: u32,
    entry: u64,
    phoff: u64,
    shoff: u64,
    flags: u32,
    ehsize: u16,
    phentsize: u16,
    phnum: u16,
    shentsize: u16,
    shnum: u16,
    shstrndx: u16,
}

/// Class-independent view of the file header.
#[derive(Debug)]
pub(crate) struct Header {
    pub ty: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u64,
    pub phoff: u64,
    pub phentsize: u16,
    pub phnum: u16,
}

impl From<Header32> for Header {
    fn from(h: Header32) -> Self {
        Self {
            ty: h.ty,
            machine: h.machine,
            version: h.version,
            entry: h.entry.into(),
            phoff: h.phoff.into(),
            phentsize: h.phentsize,
            phnum: h.phnum,
        }
    }
}

impl From<Header64> for Header {
    fn from(h: Header64) -> Self {
        Self {
            ty: h.ty,
            machine: h.machine,
            version: h.version,
            entry: h.entry,
            phoff: h.phoff,
            phentsize: h.phentsize,
            phnum: h.phnum,
        }
    }
}

impl LLParser for Header32 {
    type Error = Error;

    fn validate(&self) -> core::result::Result<(), Self::Error> {
        validate_header(self.version, self.phnum, self.phentsize, size_of::<ProgramHeader32>())
    }
}

impl LLParser for Header64 {
    type Error = Error;

    fn validate(&self) -> core::result::Result<(), Self::Error> {
        validate_header(self.version, self.phnum, self.phentsize, size_of::<ProgramHeader64>())
    }
}

fn validate_header(
    version: u32,
    phnum: u16,
    phentsize: u16,
    expected: usize,
) -> core::result::Result<(), Error> {
    if version != 1 {
        Err(Error::UnsupportedVersion(version))
    } else if phnum != 0 && usize::from(phentsize) != expected {
        Err(Error::InvalidProgramHeaderSize(phentsize, expected))
    } else {
        Ok(())
    }
}

#[derive(Debug, Decode)]
#[repr(C)]
pub(crate) struct ProgramHeader32 {
    ty: u32,
    offset: u32,
    vaddr: u32,
    paddr: u32,
    filesz: u32,
    memsz: u32,
    flags: u32,
    align: u32,
}

#[derive(Debug, Decode)]
#[repr(C)]
pub(crate) struct ProgramHeader64 {
    ty: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    paddr: u64,
    filesz: u64,
    memsz: u64,
    align: u64,
}

/// Class-independent view of a program header.
#[derive(Debug)]
pub(crate) struct ProgramHeader {
    pub ty: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
}

impl From<ProgramHeader32> for ProgramHeader {
    fn from(p: ProgramHeader32) -> Self {
        Self {
            ty: p.ty,
            flags: p.flags,
            offset: p.offset.into(),
            vaddr: p.vaddr.into(),
            paddr: p.paddr.into(),
            filesz: p.filesz.into(),
            memsz: p.memsz.into(),
        }
    }
}

impl From<ProgramHeader64> for ProgramHeader {
    fn from(p: ProgramHeader64) -> Self {
        Self {
            ty: p.ty,
            flags: p.flags,
            offset: p.offset,
            vaddr: p.vaddr,
            paddr: p.paddr,
            filesz: p.filesz,
            memsz: p.memsz,
        }
    }
}

impl LLParser for ProgramHeader32 {
    type Error = Error;

    fn validate(&self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

impl LLParser for ProgramHeader64 {
    type Error = Error;

    fn validate(&self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}
