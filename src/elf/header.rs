//! The ELF header at the start of every ELF file.
use super::{Offset, Reader, Stream};
use crate::errors::Result;

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;
pub const ET_CORE: u16 = 4;

pub struct ElfHeader {
    // Elf64_Ehdr, see https://refspecs.linuxbase.org/elf/gabi4+/ch4.eheader.html
    // e_ident was checked by Reader.
    /// Core, executable, shared object, etc.
    pub etype: u16,

    /// CPU architecture.
    pub machine: u16,

    /// Offset to the program header table.
    pub ph_offset: Offset,

    /// Offset to the section header table.
    pub section_offset: Offset,

    pub ph_entry_size: u16,
    pub num_ph_entries: u16,
    pub section_entry_size: u16,
    pub num_section_entries: u16,
}

impl ElfHeader {
    pub const SIZE: u64 = 64;

    pub fn new(reader: &Reader) -> Result<Self> {
        let bytes = reader.slice(Offset(0), ElfHeader::SIZE, "ELF header")?;
        let mut s = Stream::new(bytes, 16);
        let etype = s.read_half()?;
        let machine = s.read_half()?;
        let _version = s.read_word()?;
        let _entry = s.read_xword()?;
        let ph_offset = Offset(s.read_xword()?);
        let section_offset = Offset(s.read_xword()?);
        let _flags = s.read_word()?;
        let _header_size = s.read_half()?;
        Ok(ElfHeader {
            etype,
            machine,
            ph_offset,
            section_offset,
            ph_entry_size: s.read_half()?,
            num_ph_entries: s.read_half()?,
            section_entry_size: s.read_half()?,
            num_section_entries: s.read_half()?,
        })
    }

    pub fn is_core(&self) -> bool {
        self.etype == ET_CORE
    }

    pub fn stype(&self) -> &'static str {
        match self.etype {
            1 => "relocatable",
            ET_EXEC => "executable",
            ET_DYN => "shared object",
            ET_CORE => "core",
            _ => "unknown",
        }
    }

    pub fn machine(&self) -> &'static str {
        match self.machine {
            // see https://llvm.org/doxygen/BinaryFormat_2ELF_8h_source.html
            0x3e => "x86-64",
            0xb7 => "AArch64",
            0xf3 => "RISC-V",
            0x15 => "PowerPC64",
            0x16 => "S390",
            _ => "unknown machine",
        }
    }
}
