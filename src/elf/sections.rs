//! Used by the linker and debugger. Also see segments. Core files don't have sections
//! but the executables and shared objects a process loaded usually do.
use super::{Bytes, Offset, Reader, Stream, VirtualAddr};
use crate::errors::{CoreError, Result};

/// Describes a section.
#[derive(Clone, Debug)]
pub struct SectionHeader {
    // Elf64_Shdr, see https://gist.github.com/x0nu11byt3/bcb35c3de461e5fb66173071a2379779
    // Name, flags, link, info, alignment, and entry size are not needed to read symbols.
    /// Type of the section.
    pub stype: SectionType,

    /// Addressing for the bytes in the section using offsets from the start of the ELF file.
    pub obytes: Bytes<Offset>,

    /// Addressing for the bytes in the section using link-time virtual addresses.
    pub vbytes: Bytes<VirtualAddr>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionType {
    /// Dynamic linking information.
    Dynamic,

    /// Dynamic linker symbol table.
    DynamicSymbolTable,

    /// Uninitialized data.
    NoBits,

    /// Arbitrary metadata.
    Note,

    /// Not to be used.
    Null,

    /// CPU instructions or constant data.
    ProgBits,

    /// Strings for use by the linker and debugger.
    StringTable,

    /// Full symbol table, usually stripped from release builds.
    SymbolTable,

    /// Relocations, hash tables, version info, etc.
    Other(u32),
}

impl SectionType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x0 => SectionType::Null,
            0x1 => SectionType::ProgBits,
            0x2 => SectionType::SymbolTable,
            0x3 => SectionType::StringTable,
            0x6 => SectionType::Dynamic,
            0x7 => SectionType::Note,
            0x8 => SectionType::NoBits,
            0xb => SectionType::DynamicSymbolTable,
            _ => SectionType::Other(value),
        }
    }
}

impl SectionHeader {
    pub const SIZE: u64 = 64;

    pub fn new(reader: &Reader, offset: Offset) -> Result<Self> {
        let bytes = reader.slice(offset, SectionHeader::SIZE, "section header")?;
        let mut s = Stream::new(bytes, 4); // skip sh_name
        let stype = SectionType::from_u32(s.read_word()?);
        let _flags = s.read_xword()?;
        let vaddr = s.read_xword()?;
        let offset = s.read_xword()?;
        let size = s.read_xword()?;

        // NOBITS sections (e.g. .bss) occupy no bytes in the file.
        let file_size = if stype == SectionType::NoBits { 0 } else { size };
        Ok(SectionHeader {
            stype,
            obytes: Bytes::new(Offset(offset), file_size),
            vbytes: Bytes::new(VirtualAddr(vaddr), size),
        })
    }

    pub fn read_table(
        reader: &Reader,
        offset: Offset,
        count: u64,
        entry_size: u64,
    ) -> Result<Vec<Self>> {
        if count > 0 && entry_size < SectionHeader::SIZE {
            return Err(CoreError::malformed(format!(
                "section header entry size {entry_size} is smaller than {}",
                SectionHeader::SIZE
            )));
        }
        let mut sections = Vec::new();
        for i in 0..count {
            let at = offset.0.checked_add(i * entry_size).ok_or_else(|| {
                CoreError::malformed("section header table runs past the end of the address space")
            })?;
            sections.push(SectionHeader::new(reader, Offset(at))?);
        }
        Ok(sections)
    }
}
