//! The dynamic section: (tag, value) pairs describing how a module is linked.
use super::{Bytes, Offset, Reader, Stream};
use crate::errors::{CoreError, Result, find_unique};

pub const DT_NULL: i64 = 0;
pub const DT_NEEDED: i64 = 1;
pub const DT_HASH: i64 = 4;
pub const DT_STRTAB: i64 = 5;
pub const DT_SYMTAB: i64 = 6;
pub const DT_STRSZ: i64 = 10;
pub const DT_SYMENT: i64 = 11;
pub const DT_DEBUG: i64 = 21;
pub const DT_GNU_HASH: i64 = 0x6ffffef5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DynamicEntry {
    pub tag: i64,

    /// Either d_val or d_ptr, they share storage.
    pub value: u64,
}

impl DynamicEntry {
    pub const SIZE: u64 = 16;

    /// Decodes entries until DT_NULL, which is not included. Running out of span before
    /// DT_NULL is an error.
    pub fn read_all(reader: &Reader, span: Bytes<Offset>) -> Result<Vec<DynamicEntry>> {
        let bytes = reader.clamped(span.start, span.size);
        let mut s = Stream::new(bytes, 0);
        let mut entries = Vec::new();
        while s.offset + DynamicEntry::SIZE as usize <= bytes.len() {
            let tag = s.read_sxword()?;
            let value = s.read_xword()?;
            if tag == DT_NULL {
                return Ok(entries);
            }
            entries.push(DynamicEntry { tag, value });
        }
        Err(CoreError::Truncated {
            what: "dynamic section (no DT_NULL entry)",
            offset: span.start.0,
            needed: (entries.len() as u64 + 1) * DynamicEntry::SIZE,
            available: bytes.len() as u64,
        })
    }

    pub fn find(entries: &[DynamicEntry], tag: i64) -> Result<u64> {
        let predicate = format!("tag == {}", name(tag));
        find_unique(entries, "dynamic entry", &predicate, |e| e.tag == tag).map(|e| e.value)
    }
}

pub fn name(tag: i64) -> String {
    match tag {
        DT_NULL => "DT_NULL".to_string(),
        DT_NEEDED => "DT_NEEDED".to_string(),
        DT_HASH => "DT_HASH".to_string(),
        DT_STRTAB => "DT_STRTAB".to_string(),
        DT_SYMTAB => "DT_SYMTAB".to_string(),
        DT_STRSZ => "DT_STRSZ".to_string(),
        DT_SYMENT => "DT_SYMENT".to_string(),
        DT_DEBUG => "DT_DEBUG".to_string(),
        DT_GNU_HASH => "DT_GNU_HASH".to_string(),
        _ => format!("0x{tag:x}"),
    }
}
