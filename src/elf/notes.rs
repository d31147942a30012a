//! The various notes in an ELF file. These provide information about the process and
//! not all may be present.
use super::{Bytes, Offset, Reader, Stream};
use crate::errors::{CoreError, Result};
use crate::utils;

pub const NT_PRSTATUS: u32 = 1;
pub const NT_PRFPREG: u32 = 2;
pub const NT_PRPSINFO: u32 = 3;
pub const NT_AUXV: u32 = 6;
pub const NT_SIGINFO: u32 = 0x53494749;
pub const NT_FILE: u32 = 0x46494c45;

/// Namespace used by the kernel for process notes.
pub const CORE_NOTE_NAME: &str = "CORE";

#[derive(Debug, Eq, PartialEq)]
pub enum NoteType {
    /// The auxiliary vector the kernel handed the process at startup.
    AuxV,

    /// Memory-mapped files, see fill_files_note in
    /// https://android.googlesource.com/kernel/common/+/6e7bfa046de8/fs/binfmt_elf.c
    File,

    /// Signal info, pid, registers. See elf_prstatus in
    /// https://docs.huihoo.com/doxygen/linux/kernel/3.7/uapi_2linux_2elfcore_8h_source.html
    PrStatus,

    /// Floating point register values.
    PrFPReg,

    /// Process state info and the command line.
    PrPsInfo,

    /// siginfo_t for the signal that killed the process.
    SigInfo,

    Other(u32),
}

impl NoteType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            NT_PRSTATUS => NoteType::PrStatus,
            NT_PRFPREG => NoteType::PrFPReg,
            NT_PRPSINFO => NoteType::PrPsInfo,
            NT_AUXV => NoteType::AuxV,
            NT_SIGINFO => NoteType::SigInfo,
            NT_FILE => NoteType::File,
            _ => NoteType::Other(value),
        }
    }
}

#[derive(Debug)]
pub struct Note {
    pub name: String,
    pub ntype: u32,

    /// Where the descriptor lives in the file.
    pub contents: Bytes<Offset>,
}

impl Note {
    pub fn kind(&self) -> NoteType {
        NoteType::from_u32(self.ntype)
    }

    pub fn is(&self, name: &str, ntype: u32) -> bool {
        self.name == name && self.ntype == ntype
    }

    /// Decodes every note in span. The notes must account for the span exactly.
    pub fn read_all(reader: &Reader, span: Bytes<Offset>) -> Result<Vec<Note>> {
        let bytes = reader.slice(span.start, span.size, "note segment")?;
        let mut notes = Vec::new();
        let mut s = Stream::new(bytes, 0);
        while s.offset < bytes.len() {
            notes.push(read_note(&mut s, span.start)?);
        }
        Ok(notes)
    }
}

fn read_note(s: &mut Stream, base: Offset) -> Result<Note> {
    let start = s.offset;
    let n_namesz = s.read_word()? as usize;
    let n_descsz = s.read_word()? as usize;
    let n_type = s.read_word()?;

    let name_bytes = s.slice_ahead(n_namesz).ok_or_else(|| truncated(s, base, n_namesz))?;
    let name = String::from_utf8_lossy(name_bytes)
        .trim_end_matches('\0')
        .to_string();
    s.offset += utils::align_to_word(n_namesz); // align desc to 4-byte boundary

    let desc_offset = s.offset;
    if s.slice_ahead(n_descsz).is_none() {
        return Err(truncated(s, base, n_descsz));
    }

    // The padding after the last descriptor is sometimes left off.
    s.offset = (s.offset + utils::align_to_word(n_descsz)).min(s.len());
    debug_assert!(s.offset > start);

    Ok(Note {
        name,
        ntype: n_type,
        contents: Bytes::new(base + desc_offset as u64, n_descsz as u64),
    })
}

fn truncated(s: &Stream, base: Offset, needed: usize) -> CoreError {
    CoreError::Truncated {
        what: "note",
        offset: base.0 + s.offset as u64,
        needed: needed as u64,
        available: s.len().saturating_sub(s.offset) as u64,
    }
}
