//! Data within a core file or one of the executables/shared objects it references.
use super::{ElfHeader, Note, ProgramHeader, Reader, SectionHeader, SectionType, SegmentType};
use crate::errors::{CoreError, Result, find_unique};
use memmap2::Mmap;
use std::fs::File;
use std::path::PathBuf;

pub struct ElfFile {
    pub header: ElfHeader,
    pub path: PathBuf,
    pub reader: Reader,
    pub segments: Vec<ProgramHeader>,
    pub sections: Vec<SectionHeader>, // not present in core files
}

impl ElfFile {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = File::open(&path).map_err(|source| CoreError::Io {
            path: path.clone(),
            source,
        })?;

        // This is unsafe because it has undefined behavior if the underlying file is
        // modified while the memory map is in use.
        let bytes = unsafe { Mmap::map(&file) }.map_err(|source| CoreError::Io {
            path: path.clone(),
            source,
        })?;
        ElfFile::with_reader(path, Reader::from_mmap(bytes)?)
    }

    #[cfg(test)]
    pub fn from_bytes(path: PathBuf, bytes: Vec<u8>) -> Result<Self> {
        ElfFile::with_reader(path, Reader::from_vec(bytes)?)
    }

    fn with_reader(path: PathBuf, reader: Reader) -> Result<Self> {
        let header = ElfHeader::new(&reader)?;
        let segments = ProgramHeader::read_table(
            &reader,
            header.ph_offset,
            header.num_ph_entries as u64,
            header.ph_entry_size as u64,
        )?;
        check_segments(&reader, &segments)?;
        let sections = if header.section_offset.0 == 0 {
            Vec::new()
        } else {
            SectionHeader::read_table(
                &reader,
                header.section_offset,
                header.num_section_entries as u64,
                header.section_entry_size as u64,
            )?
        };
        Ok(ElfFile {
            header,
            path,
            reader,
            segments,
            sections,
        })
    }

    pub fn find_segment(&self, stype: SegmentType) -> Result<&ProgramHeader> {
        ProgramHeader::find(&self.segments, stype)
    }

    pub fn find_section(&self, stype: SectionType) -> Result<&SectionHeader> {
        let predicate = format!("type == {stype:?}");
        find_unique(&self.sections, "section header", &predicate, |sh| {
            sh.stype == stype
        })
    }

    /// PT_LOAD segments with their index in the program header table.
    pub fn loads(&self) -> impl Iterator<Item = (usize, &ProgramHeader)> + '_ {
        self.segments.iter().enumerate().filter(|(_, ph)| ph.is_load())
    }

    /// The notes in the file's single PT_NOTE segment.
    pub fn notes(&self) -> Result<Vec<Note>> {
        let segment = self.find_segment(SegmentType::Note)?;
        Note::read_all(&self.reader, segment.obytes_in_file())
    }

    pub fn find_note<'a>(notes: &'a [Note], name: &str, ntype: u32) -> Result<&'a Note> {
        let predicate = format!("name == {name:?} and type == {ntype}");
        find_unique(notes, "note", &predicate, |n| n.is(name, ntype))
    }

    /// The file name without directories, used to match images to loaded modules.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Cores written by a process that ran out of disk space claim more bytes than the
/// file holds.
fn check_segments(reader: &Reader, segments: &[ProgramHeader]) -> Result<()> {
    let len = reader.len() as u64;
    for ph in segments.iter().filter(|ph| ph.file_size > 0) {
        let end = ph.offset.0.checked_add(ph.file_size);
        if end.is_none_or(|end| end > len) {
            return Err(CoreError::Truncated {
                what: "segment",
                offset: ph.offset.0,
                needed: ph.file_size,
                available: len.saturating_sub(ph.offset.0),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::notes::{NT_AUXV, NT_PRSTATUS};
    use crate::test_support::{CoreBuilder, note};

    #[test]
    fn finds_auxv_note() {
        let mut b = CoreBuilder::new();
        let mut notes = note("CORE", NT_PRSTATUS, &[0; 8]);
        notes.extend(note("CORE", NT_AUXV, &[0; 16]));
        b.note_segment(&notes);
        b.map(0x400000, &[0; 0x20]);
        let file = ElfFile::from_bytes(PathBuf::from("/tmp/app.core"), b.build()).unwrap();

        assert_eq!(file.loads().count(), 1);
        assert_eq!(file.file_name(), "app.core");
        let notes = file.notes().unwrap();
        let auxv = ElfFile::find_note(&notes, "CORE", NT_AUXV).unwrap();
        assert_eq!(auxv.contents.size, 16);
        assert!(ElfFile::find_note(&notes, "LINUX", NT_AUXV).is_err());
    }

    #[test]
    fn two_note_segments_is_not_found() {
        let mut b = CoreBuilder::new();
        b.note_segment(&note("CORE", NT_AUXV, &[0; 16]));
        b.note_segment(&note("CORE", NT_AUXV, &[0; 16]));
        let file = ElfFile::from_bytes(PathBuf::from("app.core"), b.build()).unwrap();
        let err = file.notes().unwrap_err();
        assert!(matches!(err, CoreError::NotFound { count: 2, .. }));
    }

    #[test]
    fn segment_past_end_of_file_is_truncated() {
        let mut b = CoreBuilder::new();
        let offset = b.append(&[0; 0x40]);
        b.load(offset, 0x400000, 0x10000);
        let err = ElfFile::from_bytes(PathBuf::from("app.core"), b.build()).err().unwrap();
        assert!(matches!(
            err,
            CoreError::Truncated {
                what: "segment",
                offset: 64,
                needed: 0x10000,
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ElfFile::new(PathBuf::from("/nonexistent/app.core")).err().unwrap();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
