//! Searches the memory in a core for a pointer value. Every byte position is checked, so
//! misaligned and overlapping occurrences are found too. When a hit is preceded by a
//! vtable pointer the hit is probably a field of that object.
pub mod findings;

pub use findings::*;

use crate::debug::VtableIndex;
use crate::elf::{ElfFile, Offset, ProgramHeader, VirtualAddr};
use crate::utils;
use memchr::memmem::Finder;

/// Number of words before a hit checked for a vtable pointer.
pub const WINDOW_WORDS: u64 = 16;

pub struct Scanner<'a> {
    core: &'a ElfFile,
    vtables: &'a VtableIndex,
    finder: Finder<'static>,

    /// PT_LOAD segments with bytes in the file, with their program header index.
    loads: Vec<(usize, &'a ProgramHeader)>,
}

impl<'a> Scanner<'a> {
    pub fn new(core: &'a ElfFile, target: u64, vtables: &'a VtableIndex) -> Self {
        let pattern = target.to_le_bytes();
        Scanner {
            core,
            vtables,
            finder: Finder::new(&pattern).into_owned(),
            loads: core.loads().filter(|(_, ph)| ph.file_size > 0).collect(),
        }
    }

    pub fn describe(&self) {
        for (index, ph) in self.loads.iter() {
            utils::note(&format!(
                "will scan LOAD[{index}] {} at 0x{:x}, 0x{:x} bytes",
                ph.flags(),
                ph.vaddr,
                ph.mem_size
            ));
        }
    }

    /// Lazily finds every hit, in segment order. Each call starts a new scan.
    pub fn hits(&self) -> Hits<'_> {
        Hits {
            scanner: self,
            segment: 0,
            pos: 0,
        }
    }

    /// Bytes searched for a segment: its memory size, less whatever the file is missing.
    fn haystack(&self, ph: &ProgramHeader) -> &'a [u8] {
        self.core.reader.clamped(ph.offset, ph.mem_size)
    }

    fn hit(&self, index: usize, ph: &ProgramHeader, delta: u64) -> ScanHit {
        let addr = ph.vaddr + delta;
        ScanHit {
            offset: ph.offset + delta,
            addr,
            segment: index,
            segment_type: ph.stype,
            fields: self.fields(ph, addr),
        }
    }

    /// Vtable pointers in the aligned words before addr. Words outside the hit's segment
    /// are ignored.
    fn fields(&self, ph: &ProgramHeader, addr: VirtualAddr) -> Vec<FieldMatch> {
        let mut fields = Vec::new();
        if self.vtables.is_empty() {
            return fields;
        }

        let aligned = addr.0 & !7;
        for k in 1..=WINDOW_WORDS {
            let Some(word) = aligned.checked_sub(8 * k) else {
                break;
            };
            if word < ph.vaddr.0 {
                break;
            }
            let Some(value) = self.read_word(ph, word) else {
                continue;
            };
            if let Some(label) = self.vtables.lookup(value) {
                fields.push(FieldMatch {
                    parent: VirtualAddr(word),
                    label,
                    slot: value,
                    field_offset: addr.0 - word,
                });
            }
        }
        fields
    }

    fn read_word(&self, ph: &ProgramHeader, addr: u64) -> Option<u64> {
        let offset = ph.offset + (addr - ph.vaddr.0);
        self.core.reader.read_xword(offset).ok()
    }
}

pub struct Hits<'a> {
    scanner: &'a Scanner<'a>,
    segment: usize, // index into scanner.loads
    pos: usize,     // where to resume within that segment
}

impl<'a> Iterator for Hits<'a> {
    type Item = ScanHit;

    fn next(&mut self) -> Option<ScanHit> {
        while let Some(&(index, ph)) = self.scanner.loads.get(self.segment) {
            let haystack = self.scanner.haystack(ph);
            let found = haystack
                .get(self.pos..)
                .and_then(|rest| self.scanner.finder.find(rest));
            if let Some(found) = found {
                let delta = self.pos + found;
                self.pos = delta + 1; // overlapping matches are reported too
                return Some(self.scanner.hit(index, ph, delta as u64));
            }
            self.segment += 1;
            self.pos = 0;
        }
        None
    }
}
