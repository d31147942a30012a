//! Used by the run-time loader. Also see sections.
use super::{Bytes, Offset, Reader, Stream, VirtualAddr};
use crate::errors::{CoreError, Result, find_unique};

const EXECUTE_FLAG: u32 = 0x1;
const WRITE_FLAG: u32 = 0x2;
const READ_FLAG: u32 = 0x4;

/// Describes a segment.
#[derive(Clone, Debug)]
pub struct ProgramHeader {
    // Elf64_Phdr, see https://llvm.org/doxygen/BinaryFormat_2ELF_8h_source.html
    pub stype: SegmentType,

    /// Read/Write/Execute flags.
    pub flags: u32,

    /// Offset to the first byte of the segment.
    pub offset: Offset,

    /// Virtual address of the first byte in the segment.
    pub vaddr: VirtualAddr,

    /// Number of bytes in the segment in the file. Zero for memory that wasn't dumped.
    pub file_size: u64,

    /// Number of bytes in the segment in memory.
    pub mem_size: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegmentType {
    /// Not to be used.
    Null,

    /// A loadable segment, described by p_filesz and p_memsz.
    Load,

    /// Specifies dynamic linking information.
    Dynamic,

    /// Location and size of a null-terminated path name to invoke as an interpreter.
    Interpreter,

    /// The location and size of auxiliary information.
    Note,

    /// Reserved but has unspecified semantics.
    Shlib,

    /// The location and size of the program header table itself.
    Phdr,

    /// The Thread-Local Storage template.
    Tls,

    /// OS, processor, or otherwise unrecognized types, e.g. GNU_STACK.
    Other(u32),
}

impl SegmentType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => SegmentType::Null,
            1 => SegmentType::Load,
            2 => SegmentType::Dynamic,
            3 => SegmentType::Interpreter,
            4 => SegmentType::Note,
            5 => SegmentType::Shlib,
            6 => SegmentType::Phdr,
            7 => SegmentType::Tls,
            _ => SegmentType::Other(value),
        }
    }

    pub fn name(&self) -> String {
        match self {
            SegmentType::Null => "NULL".to_string(),
            SegmentType::Load => "LOAD".to_string(),
            SegmentType::Dynamic => "DYNAMIC".to_string(),
            SegmentType::Interpreter => "INTERP".to_string(),
            SegmentType::Note => "NOTE".to_string(),
            SegmentType::Shlib => "SHLIB".to_string(),
            SegmentType::Phdr => "PHDR".to_string(),
            SegmentType::Tls => "TLS".to_string(),
            SegmentType::Other(0x6474e550) => "GNU_EH_FRAME".to_string(),
            SegmentType::Other(0x6474e551) => "GNU_STACK".to_string(),
            SegmentType::Other(0x6474e552) => "GNU_RELRO".to_string(),
            SegmentType::Other(0x6474e553) => "GNU_PROPERTY".to_string(),
            SegmentType::Other(value) => format!("0x{value:x}"),
        }
    }
}

impl ProgramHeader {
    pub const SIZE: u64 = 56;

    pub fn new(reader: &Reader, offset: Offset) -> Result<Self> {
        let bytes = reader.slice(offset, ProgramHeader::SIZE, "program header")?;
        let mut s = Stream::new(bytes, 0);
        let stype = SegmentType::from_u32(s.read_word()?);
        let flags = s.read_word()?;
        let offset = Offset(s.read_xword()?);
        let vaddr = VirtualAddr(s.read_xword()?);
        let _paddr = s.read_xword()?;
        Ok(ProgramHeader {
            stype,
            flags,
            offset,
            vaddr,
            file_size: s.read_xword()?,
            mem_size: s.read_xword()?,
        })
    }

    /// Decodes count headers laid out entry_size bytes apart.
    pub fn read_table(
        reader: &Reader,
        offset: Offset,
        count: u64,
        entry_size: u64,
    ) -> Result<Vec<Self>> {
        if count > 0 && entry_size < ProgramHeader::SIZE {
            return Err(CoreError::malformed(format!(
                "program header entry size {entry_size} is smaller than {}",
                ProgramHeader::SIZE
            )));
        }
        let mut headers = Vec::new();
        for i in 0..count {
            let at = offset.0.checked_add(i * entry_size).ok_or_else(|| {
                CoreError::malformed("program header table runs past the end of the address space")
            })?;
            headers.push(ProgramHeader::new(reader, Offset(at))?);
        }
        Ok(headers)
    }

    /// The single header of type stype.
    pub fn find(headers: &[ProgramHeader], stype: SegmentType) -> Result<&ProgramHeader> {
        let predicate = format!("type == {}", stype.name());
        find_unique(headers, "program header", &predicate, |ph| ph.stype == stype)
    }

    /// Just the bytes actually present in the file.
    pub fn obytes_in_file(&self) -> Bytes<Offset> {
        Bytes::new(self.offset, self.file_size)
    }

    /// Addressing for the bytes in the segment using virtual addresses as in the cored process.
    pub fn vbytes(&self) -> Bytes<VirtualAddr> {
        Bytes::new(self.vaddr, self.mem_size)
    }

    pub fn is_load(&self) -> bool {
        self.stype == SegmentType::Load
    }

    pub fn flags(&self) -> String {
        let mut result = String::new();
        result.push(if self.flags & READ_FLAG != 0 { 'r' } else { '-' });
        result.push(if self.flags & WRITE_FLAG != 0 { 'w' } else { '-' });
        result.push(if self.flags & EXECUTE_FLAG != 0 { 'x' } else { '-' });
        result
    }
}
