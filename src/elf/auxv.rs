//! The auxiliary vector: (type, value) pairs the kernel passes to a new process. Core
//! files keep a copy in the CORE/NT_AUXV note.
use super::{Bytes, Offset, Reader, Stream};
use crate::errors::{CoreError, Result, find_unique};

pub const AT_NULL: u64 = 0;
pub const AT_PHDR: u64 = 3;
pub const AT_PHENT: u64 = 4;
pub const AT_PHNUM: u64 = 5;
pub const AT_PAGESZ: u64 = 6;
pub const AT_BASE: u64 = 7;
pub const AT_ENTRY: u64 = 9;
pub const AT_SYSINFO_EHDR: u64 = 33;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AuxvEntry {
    pub atype: u64,
    pub value: u64,
}

impl AuxvEntry {
    pub const SIZE: u64 = 16;

    /// Decodes entries until AT_NULL, which is not included. Running out of span before
    /// AT_NULL is an error.
    pub fn read_all(reader: &Reader, span: Bytes<Offset>) -> Result<Vec<AuxvEntry>> {
        let bytes = reader.slice(span.start, span.size, "auxiliary vector")?;
        let mut s = Stream::new(bytes, 0);
        let mut entries = Vec::new();
        while s.offset + AuxvEntry::SIZE as usize <= bytes.len() {
            let atype = s.read_xword()?;
            let value = s.read_xword()?;
            if atype == AT_NULL {
                return Ok(entries);
            }
            entries.push(AuxvEntry { atype, value });
        }
        Err(CoreError::Truncated {
            what: "auxiliary vector (no AT_NULL entry)",
            offset: span.start.0,
            needed: (entries.len() as u64 + 1) * AuxvEntry::SIZE,
            available: span.size,
        })
    }

    /// The value of the one entry with atype.
    pub fn find(entries: &[AuxvEntry], atype: u64) -> Result<u64> {
        let predicate = format!("type == {}", name(atype));
        find_unique(entries, "auxv entry", &predicate, |e| e.atype == atype).map(|e| e.value)
    }

    /// Like find but absence is fine, e.g. AT_BASE is missing for static executables.
    pub fn find_optional(entries: &[AuxvEntry], atype: u64) -> Result<Option<u64>> {
        if entries.iter().any(|e| e.atype == atype) {
            AuxvEntry::find(entries, atype).map(Some)
        } else {
            Ok(None)
        }
    }
}

pub fn name(atype: u64) -> String {
    match atype {
        AT_NULL => "AT_NULL".to_string(),
        AT_PHDR => "AT_PHDR".to_string(),
        AT_PHENT => "AT_PHENT".to_string(),
        AT_PHNUM => "AT_PHNUM".to_string(),
        AT_PAGESZ => "AT_PAGESZ".to_string(),
        AT_BASE => "AT_BASE".to_string(),
        AT_ENTRY => "AT_ENTRY".to_string(),
        AT_SYSINFO_EHDR => "AT_SYSINFO_EHDR".to_string(),
        _ => format!("{atype}"),
    }
}
