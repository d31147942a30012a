//! Virtual address to file offset translation. Core files are translated with their
//! program headers; standalone executables and shared objects with their section
//! headers. The caller picks the translator that matches the image it is decoding.
use super::{Bytes, Offset, ProgramHeader, SectionHeader, SectionType, VirtualAddr};
use crate::errors::{CoreError, Result};

pub trait AddressTranslator {
    /// The file bytes backing vaddr: the offset of vaddr and the number of bytes from
    /// there to the end of the containing entry's file data.
    fn locate(&self, vaddr: VirtualAddr) -> Result<Bytes<Offset>>;

    /// The offset of vaddr. All size bytes starting there must be in the file.
    fn offset_of(&self, vaddr: VirtualAddr, size: u64, what: &'static str) -> Result<Offset> {
        let span = self.locate(vaddr)?;
        if size > span.size {
            return Err(CoreError::Truncated {
                what,
                offset: span.start.0,
                needed: size,
                available: span.size,
            });
        }
        Ok(span.start)
    }
}

/// One (virtual range, file offset) pair from either table.
struct Mapping {
    vbytes: Bytes<VirtualAddr>,
    offset: Offset,

    /// Bytes actually present in the file, may be less than vbytes.size.
    file_size: u64,
}

fn locate(
    mappings: &[Mapping],
    vaddr: VirtualAddr,
    table: &'static str,
) -> Result<Bytes<Offset>> {
    let Some(m) = mappings.iter().find(|m| m.vbytes.contains(vaddr)) else {
        return Err(CoreError::UnmappedAddress {
            addr: vaddr.0,
            table,
        });
    };
    let delta = vaddr - m.vbytes.start;
    if delta >= m.file_size {
        // The memory is there in the process but wasn't written to the file.
        return Err(CoreError::Truncated {
            what: "memory that wasn't dumped",
            offset: (m.offset + delta).0,
            needed: 1,
            available: 0,
        });
    }
    Ok(Bytes::new(m.offset + delta, m.file_size - delta))
}

fn check_overlaps(mappings: &[Mapping], table: &str) -> Result<()> {
    let mut sorted: Vec<&Mapping> = mappings.iter().filter(|m| !m.vbytes.is_empty()).collect();
    sorted.sort_by_key(|m| m.vbytes.start);
    for pair in sorted.windows(2) {
        if pair[0].vbytes.overlaps(&pair[1].vbytes) {
            return Err(CoreError::malformed(format!(
                "{table} at 0x{:x} overlaps {table} at 0x{:x}",
                pair[0].vbytes.start, pair[1].vbytes.start
            )));
        }
    }
    Ok(())
}

/// Translates using p_vaddr/p_memsz/p_offset.
pub struct SegmentTranslator {
    mappings: Vec<Mapping>,
}

impl SegmentTranslator {
    pub fn new(segments: &[ProgramHeader]) -> Result<Self> {
        let mappings: Vec<Mapping> = segments
            .iter()
            .map(|ph| Mapping {
                vbytes: ph.vbytes(),
                offset: ph.offset,
                file_size: ph.file_size.min(ph.mem_size),
            })
            .collect();
        check_overlaps(&mappings, "segment")?;
        Ok(SegmentTranslator { mappings })
    }
}

impl AddressTranslator for SegmentTranslator {
    fn locate(&self, vaddr: VirtualAddr) -> Result<Bytes<Offset>> {
        locate(&self.mappings, vaddr, "segment")
    }
}

/// Translates using sh_addr/sh_size/sh_offset. Sections that aren't allocated (address
/// zero) or have no file bytes (NOBITS) are skipped.
pub struct SectionTranslator {
    mappings: Vec<Mapping>,
}

impl SectionTranslator {
    pub fn new(sections: &[SectionHeader]) -> Result<Self> {
        let mappings: Vec<Mapping> = sections
            .iter()
            .filter(|sh| sh.vbytes.start.0 != 0 && sh.stype != SectionType::NoBits)
            .map(|sh| Mapping {
                vbytes: sh.vbytes,
                offset: sh.obytes.start,
                file_size: sh.obytes.size,
            })
            .collect();
        check_overlaps(&mappings, "section")?;
        Ok(SectionTranslator { mappings })
    }
}

impl AddressTranslator for SectionTranslator {
    fn locate(&self, vaddr: VirtualAddr) -> Result<Bytes<Offset>> {
        locate(&self.mappings, vaddr, "section")
    }
}
